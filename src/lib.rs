//! humangate - Passive behavioral bot detection for login forms
//!
//! humangate observes how a user interacts with a login form and turns that
//! into a fixed 20-slot behavioral fingerprint, then relays it to a remote
//! classifier and acts on the verdict:
//! device events → capture state → feature vector → relay → classifier → outcome.
//!
//! ## Modules
//!
//! - **Capture**: Scoped event subscription and running interaction aggregates
//! - **Features**: Deterministic projection into the classifier's feature vector
//! - **Form**: Credential validation, independent of capture
//! - **Relay**: HTTP client and stateless forwarding server
//! - **Submit**: One serialized submit attempt from validation to outcome

pub mod capture;
pub mod config;
pub mod error;
pub mod features;
pub mod form;
pub mod relay;
pub mod submit;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use capture::{parse_recording, CaptureEvent, CaptureSession, CaptureState, Recording};
pub use config::{ClientConfig, RelayConfig};
pub use error::{CaptureError, GateError, RelayError};
pub use features::{EnvironmentProbes, Feature, FeatureVector, FeatureVectorBuilder, FEATURE_COUNT};
pub use form::{FormState, Validation};
pub use relay::{Relay, RelayClient, SimulatedRelay, Verdict};
pub use submit::{SubmitOutcome, Submitter};

/// humangate version reported by the relay and the CLI
pub const GATE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name used in CLI reports
pub const PRODUCER_NAME: &str = "humangate";
