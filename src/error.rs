//! Error types for humangate

use thiserror::Error;

/// Crate-level errors (parsing, recordings, configuration)
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Failed to parse payload: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid recording: {0}")]
    InvalidRecording(String),

    #[error("Invalid feature vector: {0}")]
    InvalidFeatureVector(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),
}

/// Failures while wiring the capture subsystem to an event host
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("Event host refused subscription: {0}")]
    SubscriptionRefused(String),

    #[error("Event host is closed")]
    HostClosed,
}

/// Relay client failures. Every variant is a `RelayFailure` for the outcome handler.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Relay answered with status {0}")]
    Status(u16),

    #[error("Undecodable relay response: {0}")]
    Decode(String),

    #[error("Unexpected verdict: {0}")]
    UnexpectedVerdict(serde_json::Value),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_error_converts_into_gate_error() {
        let err: GateError = CaptureError::HostClosed.into();
        assert!(matches!(err, GateError::Capture(CaptureError::HostClosed)));
        assert_eq!(err.to_string(), "Capture error: Event host is closed");
    }

    #[test]
    fn test_unexpected_verdict_message_includes_value() {
        let err = RelayError::UnexpectedVerdict(serde_json::json!(7));
        assert_eq!(err.to_string(), "Unexpected verdict: 7");
    }
}
