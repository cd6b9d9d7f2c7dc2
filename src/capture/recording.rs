//! Recorded interaction sessions
//!
//! A recording is a captured form session (mount time, delivered events,
//! environment probes, entered credentials and the submit instant). Replaying
//! it drives the same host/session path a live form uses.

use crate::capture::session::{CaptureSession, LocalHost};
use crate::capture::state::CaptureState;
use crate::capture::types::{CaptureEvent, Millis};
use crate::error::GateError;
use crate::features::{EnvironmentProbes, FeatureVector, FeatureVectorBuilder};
use crate::form::FormState;
use serde::{Deserialize, Serialize};

/// A recorded form session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    /// Form mount time (epoch ms)
    pub session_start: Millis,
    /// Submit time (epoch ms)
    pub submitted_at: Millis,
    /// Environment probes observed at submit
    #[serde(default)]
    pub probes: EnvironmentProbes,
    /// Credentials as entered
    #[serde(default)]
    pub form: FormState,
    /// Events in host delivery order
    #[serde(default)]
    pub events: Vec<CaptureEvent>,
}

/// Parse and check a recording
pub fn parse_recording(json: &str) -> Result<Recording, GateError> {
    let recording: Recording = serde_json::from_str(json)
        .map_err(|e| GateError::ParseError(format!("Failed to parse recording: {}", e)))?;
    recording.check()?;
    Ok(recording)
}

impl Recording {
    fn check(&self) -> Result<(), GateError> {
        if self.submitted_at < self.session_start {
            return Err(GateError::InvalidRecording(
                "submitted_at is before session_start".to_string(),
            ));
        }

        // Delivery order is kept as recorded; only the session window is enforced
        if let Some((index, event)) = self
            .events
            .iter()
            .enumerate()
            .find(|(_, e)| e.at < self.session_start || e.at > self.submitted_at)
        {
            return Err(GateError::InvalidRecording(format!(
                "event {} at {} lies outside the session window",
                index, event.at
            )));
        }

        Ok(())
    }

    /// Replay every event through a capture session and return the final state
    pub fn replay(&self) -> Result<CaptureState, GateError> {
        let host = LocalHost::new();
        let mut session = CaptureSession::mount(&host, self.session_start)?;
        for event in &self.events {
            host.emit(event.clone());
            session.pump();
        }
        Ok(session.unmount())
    }

    /// Replay and build the fingerprint at the recorded submit instant
    pub fn feature_vector(&self) -> Result<FeatureVector, GateError> {
        let capture = self.replay()?;
        Ok(FeatureVectorBuilder::build(
            &capture,
            &self.form,
            &self.probes,
            self.submitted_at,
        ))
    }
}
