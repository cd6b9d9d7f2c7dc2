//! Classifier relay
//!
//! The client half sends a feature vector from the form to the relay server;
//! the server half forwards it to the classification service and returns the
//! verdict. Neither side retries.
//!
//! Pipeline: FeatureVector → RelayClient → relay server → classifier → Verdict

pub mod client;
pub mod server;
pub mod types;

pub use client::{Relay, RelayClient, SimulatedRelay};
pub use server::{router, serve, RelayState};
pub use types::{
    CheckHumanRequest, CheckHumanResponse, ErrorBody, PredictRequest, PredictResponse, Verdict,
};
