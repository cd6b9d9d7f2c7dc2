//! Submission flow
//!
//! One submit attempt: validate the form, build a fresh feature vector, ask
//! the relay for a verdict and map it to an outcome for the UI. Only one
//! attempt may be outstanding at a time.

use crate::capture::state::CaptureState;
use crate::capture::types::Millis;
use crate::features::{EnvironmentProbes, FeatureVectorBuilder};
use crate::form::{FormState, Validation, ValidationErrors};
use crate::relay::client::Relay;
use crate::relay::types::Verdict;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

/// Where a human is sent after a successful login
pub const DEFAULT_NAVIGATE_TO: &str = "/home";

pub const LOGIN_SUCCESS_MESSAGE: &str = "Login successful! Welcome back.";
pub const BOT_DETECTED_MESSAGE: &str = "Bot detected! Access denied.";
pub const SERVER_ERROR_MESSAGE: &str = "Server error. Please try again.";

/// What the UI should do after a submit attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Validation failed; nothing was sent
    Invalid { errors: ValidationErrors },
    /// Another attempt is still waiting for its verdict
    Busy,
    /// Verdict was human
    Allowed { message: String, navigate_to: String },
    /// Verdict was bot
    Denied { message: String },
    /// The relay could not produce a verdict
    Failed { message: String },
}

impl SubmitOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, SubmitOutcome::Allowed { .. })
    }
}

/// Drives submit attempts against a relay
pub struct Submitter<R> {
    relay: R,
    in_flight: AtomicBool,
    navigate_to: String,
}

/// Clears the in-flight flag when the attempt ends, including when its future is dropped
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<R: Relay> Submitter<R> {
    pub fn new(relay: R) -> Self {
        Self {
            relay,
            in_flight: AtomicBool::new(false),
            navigate_to: DEFAULT_NAVIGATE_TO.to_string(),
        }
    }

    pub fn navigate_to(mut self, path: impl Into<String>) -> Self {
        self.navigate_to = path.into();
        self
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn relay(&self) -> &R {
        &self.relay
    }

    /// Run one submit attempt at `now`.
    ///
    /// Capture state is only read. On any failure the form input is left as
    /// entered so the user can resubmit.
    pub async fn submit(
        &self,
        form: &mut FormState,
        capture: &CaptureState,
        probes: &EnvironmentProbes,
        now: Millis,
    ) -> SubmitOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("submit ignored, previous attempt still outstanding");
            return SubmitOutcome::Busy;
        }
        let _guard = InFlight(&self.in_flight);

        if let Validation::Invalid(errors) = form.validate() {
            tracing::debug!(fields = errors.len(), "submit blocked by validation");
            return SubmitOutcome::Invalid { errors };
        }

        let features = FeatureVectorBuilder::build(capture, form, probes, now);

        match self.relay.check(&features).await {
            Ok(Verdict::Human) => {
                tracing::info!("verdict: human");
                SubmitOutcome::Allowed {
                    message: LOGIN_SUCCESS_MESSAGE.to_string(),
                    navigate_to: self.navigate_to.clone(),
                }
            }
            Ok(Verdict::Bot) => {
                tracing::info!("verdict: bot");
                SubmitOutcome::Denied {
                    message: BOT_DETECTED_MESSAGE.to_string(),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "relay failure");
                SubmitOutcome::Failed {
                    message: SERVER_ERROR_MESSAGE.to_string(),
                }
            }
        }
    }
}
