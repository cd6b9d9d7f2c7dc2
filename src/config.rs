//! Configuration module

use crate::error::GateError;
use std::env;
use std::time::Duration;

pub const DEFAULT_RELAY_PORT: u16 = 5001;
pub const DEFAULT_CLASSIFIER_URL: &str = "http://localhost:5002";
pub const DEFAULT_RELAY_URL: &str = "http://localhost:5001";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Relay server configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Listening port
    pub port: u16,

    /// Base URL of the classification service (`/predict` is appended)
    pub classifier_url: String,

    /// Upper bound on one classifier call
    pub classifier_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_RELAY_PORT,
            classifier_url: DEFAULT_CLASSIFIER_URL.to_string(),
            classifier_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl RelayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            port: env::var("HUMANGATE_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_RELAY_PORT),

            classifier_url: env::var("HUMANGATE_CLASSIFIER_URL")
                .unwrap_or_else(|_| DEFAULT_CLASSIFIER_URL.to_string()),

            classifier_timeout_secs: env::var("HUMANGATE_CLASSIFIER_TIMEOUT_SECS")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn classifier_timeout(&self) -> Duration {
        Duration::from_secs(self.classifier_timeout_secs)
    }

    /// Full URL of the classifier's predict endpoint
    pub fn predict_url(&self) -> String {
        format!("{}/predict", self.classifier_url.trim_end_matches('/'))
    }

    pub fn validate(&self) -> Result<(), GateError> {
        check_http_url("classifier_url", &self.classifier_url)?;
        if self.classifier_timeout_secs == 0 {
            return Err(GateError::ConfigError(
                "classifier_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Relay client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the relay server
    pub relay_url: String,

    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self {
            relay_url: env::var("HUMANGATE_RELAY_URL")
                .unwrap_or_else(|_| DEFAULT_RELAY_URL.to_string()),

            timeout_secs: env::var("HUMANGATE_RELAY_TIMEOUT_SECS")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Full URL of the relay's check endpoint
    pub fn check_url(&self) -> String {
        format!("{}/api/check-human", self.relay_url.trim_end_matches('/'))
    }

    pub fn validate(&self) -> Result<(), GateError> {
        check_http_url("relay_url", &self.relay_url)
    }
}

fn check_http_url(name: &str, url: &str) -> Result<(), GateError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(GateError::ConfigError(format!(
            "{} must be an http(s) URL, got {:?}",
            name, url
        )))
    }
}
