//! Relay wire types
//!
//! Bodies exchanged between the form, the relay server and the classifier.

use crate::features::FeatureVector;
use serde::{Deserialize, Serialize};

/// `POST /api/check-human` request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckHumanRequest {
    pub features: FeatureVector,
}

/// `POST /api/check-human` success body; `result` is the classifier's prediction verbatim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckHumanResponse {
    pub result: serde_json::Value,
}

/// `POST <classifier>/predict` request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    pub features: FeatureVector,
}

/// `POST <classifier>/predict` response body (extra fields are ignored)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction: serde_json::Value,
}

/// Error body returned by the relay server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Relay health body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: i64,
}

/// The classifier's binary verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Human,
    Bot,
}

impl Verdict {
    /// Decode a wire verdict: `0` is human, `1` is bot, anything else is rejected
    pub fn from_wire(value: &serde_json::Value) -> Option<Self> {
        match value.as_f64() {
            Some(v) if v == 0.0 => Some(Verdict::Human),
            Some(v) if v == 1.0 => Some(Verdict::Bot),
            _ => None,
        }
    }

    pub fn as_wire(self) -> u8 {
        match self {
            Verdict::Human => 0,
            Verdict::Bot => 1,
        }
    }
}
