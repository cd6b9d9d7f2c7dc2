//! Feature vector derivation
//!
//! Projects capture state and environment probes into the fixed 20-slot
//! behavioral fingerprint consumed by the remote classifier. The classifier is
//! trained on positions, not names: slot order and vector length are part of
//! the wire contract and must never change.

use crate::capture::state::CaptureState;
use crate::capture::types::Millis;
use crate::error::GateError;
use crate::form::FormState;
use serde::{Deserialize, Serialize};

/// Number of slots in a feature vector
pub const FEATURE_COUNT: usize = 20;

/// Path-deviation slot value (not derived from pointer data yet)
pub const PATH_DEVIATION_PLACEHOLDER: f64 = 0.05;

/// Hover-time slot value in milliseconds (not measured yet)
pub const HOVER_TIME_PLACEHOLDER_MS: f64 = 500.0;

/// Click-offset slot value (not measured yet)
pub const CLICK_OFFSET_PLACEHOLDER: f64 = 0.0;

/// Missing-headers slot value (server-side signal, never wired in)
pub const MISSING_HEADERS_PLACEHOLDER: f64 = 0.0;

/// Unnatural-field-sequence slot value (not derived yet)
pub const UNNATURAL_SEQUENCE_PLACEHOLDER: f64 = 0.0;

/// Geo/IP-mismatch slot value (not derived yet)
pub const GEO_IP_MISMATCH_PLACEHOLDER: f64 = 0.0;

/// More than this many pointer-speed samples counts as "moved before submit"
pub const MOVED_BEFORE_SUBMIT_MIN_SAMPLES: u64 = 3;

/// Screens narrower than this many pixels raise the resolution-mismatch probe
pub const MIN_SCREEN_WIDTH_PX: u32 = 800;

/// Submissions faster than this many milliseconds after mount are "too fast"
pub const REQUEST_TOO_FAST_MS: u64 = 300;

/// Slots of the feature vector, in wire order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    MouseAvgSpeed,
    MousePathDeviation,
    HoverTimeMs,
    ClickOffset,
    MovedBeforeSubmit,
    AvgKeystrokeDelayMs,
    BackspaceCount,
    TabCount,
    PasteDetected,
    FocusSwitchDelayAvgMs,
    IdleTimeMs,
    TimeToSubmitMs,
    IsWebdriver,
    HasPlugins,
    ScreenResMismatch,
    MissingHeadersScore,
    HoneypotFilled,
    UnnaturalFieldSequence,
    GeoIpMismatch,
    RequestTooFast,
}

impl Feature {
    /// Every slot in wire order
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::MouseAvgSpeed,
        Feature::MousePathDeviation,
        Feature::HoverTimeMs,
        Feature::ClickOffset,
        Feature::MovedBeforeSubmit,
        Feature::AvgKeystrokeDelayMs,
        Feature::BackspaceCount,
        Feature::TabCount,
        Feature::PasteDetected,
        Feature::FocusSwitchDelayAvgMs,
        Feature::IdleTimeMs,
        Feature::TimeToSubmitMs,
        Feature::IsWebdriver,
        Feature::HasPlugins,
        Feature::ScreenResMismatch,
        Feature::MissingHeadersScore,
        Feature::HoneypotFilled,
        Feature::UnnaturalFieldSequence,
        Feature::GeoIpMismatch,
        Feature::RequestTooFast,
    ];

    /// Zero-based position in the vector
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Feature::MouseAvgSpeed => "mouse_avg_speed",
            Feature::MousePathDeviation => "mouse_path_deviation",
            Feature::HoverTimeMs => "hover_time_ms",
            Feature::ClickOffset => "click_offset",
            Feature::MovedBeforeSubmit => "moved_before_submit",
            Feature::AvgKeystrokeDelayMs => "avg_keystroke_delay_ms",
            Feature::BackspaceCount => "backspace_count",
            Feature::TabCount => "tab_count",
            Feature::PasteDetected => "paste_detected",
            Feature::FocusSwitchDelayAvgMs => "focus_switch_delay_avg_ms",
            Feature::IdleTimeMs => "idle_time_ms",
            Feature::TimeToSubmitMs => "time_to_submit_ms",
            Feature::IsWebdriver => "is_webdriver",
            Feature::HasPlugins => "has_plugins",
            Feature::ScreenResMismatch => "screen_res_mismatch",
            Feature::MissingHeadersScore => "missing_headers_score",
            Feature::HoneypotFilled => "honeypot_filled",
            Feature::UnnaturalFieldSequence => "unnatural_field_sequence",
            Feature::GeoIpMismatch => "geo_ip_mismatch",
            Feature::RequestTooFast => "request_too_fast",
        }
    }

    /// Fixed value of slots that are not computed from real signals
    pub fn placeholder_value(self) -> Option<f64> {
        match self {
            Feature::MousePathDeviation => Some(PATH_DEVIATION_PLACEHOLDER),
            Feature::HoverTimeMs => Some(HOVER_TIME_PLACEHOLDER_MS),
            Feature::ClickOffset => Some(CLICK_OFFSET_PLACEHOLDER),
            Feature::MissingHeadersScore => Some(MISSING_HEADERS_PLACEHOLDER),
            Feature::UnnaturalFieldSequence => Some(UNNATURAL_SEQUENCE_PLACEHOLDER),
            Feature::GeoIpMismatch => Some(GEO_IP_MISMATCH_PLACEHOLDER),
            _ => None,
        }
    }
}

/// Static environment signals probed from the host at submission time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentProbes {
    /// Host reports it is controlled by automation (e.g. `navigator.webdriver`)
    #[serde(default)]
    pub automation_controlled: bool,
    /// Number of installed browser plugins
    #[serde(default)]
    pub plugin_count: u32,
    /// Screen width in pixels
    #[serde(default = "default_screen_width")]
    pub screen_width: u32,
}

fn default_screen_width() -> u32 {
    MIN_SCREEN_WIDTH_PX
}

/// Behavioral fingerprint: exactly [`FEATURE_COUNT`] numbers in wire order.
///
/// Serializes as a plain JSON array; deserialization rejects any other length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    /// Wrap computed slots, mapping NaN to 0 and clamping infinities to the finite range
    fn saturating(mut slots: [f64; FEATURE_COUNT]) -> Self {
        for slot in slots.iter_mut() {
            *slot = if slot.is_nan() {
                0.0
            } else {
                slot.clamp(-f64::MAX, f64::MAX)
            };
        }
        Self(slots)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.0[feature.index()]
    }

    /// Slot names paired with their values, in wire order
    pub fn named(&self) -> Vec<(&'static str, f64)> {
        Feature::ALL
            .iter()
            .map(|f| (f.name(), self.get(*f)))
            .collect()
    }
}

impl TryFrom<Vec<f64>> for FeatureVector {
    type Error = GateError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        let len = values.len();
        let slots: [f64; FEATURE_COUNT] = values.try_into().map_err(|_| {
            GateError::InvalidFeatureVector(format!(
                "expected {} values, got {}",
                FEATURE_COUNT, len
            ))
        })?;
        if let Some(position) = slots.iter().position(|v| !v.is_finite()) {
            return Err(GateError::InvalidFeatureVector(format!(
                "value at position {} is not finite",
                position
            )));
        }
        Ok(Self(slots))
    }
}

impl From<FeatureVector> for Vec<f64> {
    fn from(vector: FeatureVector) -> Self {
        vector.0.to_vec()
    }
}

/// Builder for feature vectors
pub struct FeatureVectorBuilder;

impl FeatureVectorBuilder {
    /// Build the fingerprint for a submission at `now`.
    ///
    /// Pure: inputs are only read, and identical inputs give identical vectors.
    /// No slot reads the form yet; it is part of the signature so the
    /// field-sequence slot can be derived without changing call sites.
    pub fn build(
        capture: &CaptureState,
        _form: &FormState,
        probes: &EnvironmentProbes,
        now: Millis,
    ) -> FeatureVector {
        let time_to_submit = now.saturating_sub(capture.session_start());
        let moved_before_submit =
            capture.pointer_speeds().count() > MOVED_BEFORE_SUBMIT_MIN_SAMPLES;

        FeatureVector::saturating([
            capture.pointer_speeds().mean(),
            PATH_DEVIATION_PLACEHOLDER,
            HOVER_TIME_PLACEHOLDER_MS,
            CLICK_OFFSET_PLACEHOLDER,
            flag(moved_before_submit),
            capture.key_delays().mean(),
            capture.backspace_count() as f64,
            capture.tab_count() as f64,
            flag(capture.paste_detected()),
            capture.focus_timestamps().first_switch_delay(),
            capture.idle_ms() as f64,
            time_to_submit as f64,
            flag(probes.automation_controlled),
            flag(probes.plugin_count > 0),
            flag(probes.screen_width < MIN_SCREEN_WIDTH_PX),
            MISSING_HEADERS_PLACEHOLDER,
            flag(capture.honeypot_filled()),
            UNNATURAL_SEQUENCE_PLACEHOLDER,
            GEO_IP_MISMATCH_PLACEHOLDER,
            flag(time_to_submit < REQUEST_TOO_FAST_MS),
        ])
    }
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}
