//! Capture state
//!
//! Running aggregates of one form session's interaction events. The state is
//! owned by a single capture session and only changes through the handlers
//! below; sequences are kept as fixed-size accumulators so long-lived sessions
//! use constant memory while exporting the same means and counts.

use crate::capture::types::{CaptureEvent, CaptureEventKind, KeyKind, Millis, PointerSample};
use serde::{Deserialize, Serialize};

/// Blur-to-focus gaps must exceed this many milliseconds to count as idle
pub const IDLE_THRESHOLD_MS: u64 = 1000;

/// Count and sum of an append-only sequence of samples
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningMean {
    count: u64,
    sum: f64,
}

impl RunningMean {
    /// Record a sample. NaN counts as 0 and the sum saturates at the largest finite value.
    pub fn push(&mut self, value: f64) {
        let value = if value.is_nan() { 0.0 } else { value };
        self.count = self.count.saturating_add(1);
        self.sum = (self.sum + value).clamp(-f64::MAX, f64::MAX);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Arithmetic mean, or 0 when no samples were recorded
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum / self.count as f64
    }
}

/// Window focus-regain timestamps; only the first two are ever read
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FocusLog {
    first: Option<Millis>,
    second: Option<Millis>,
    count: u64,
}

impl FocusLog {
    pub fn push(&mut self, at: Millis) {
        if self.first.is_none() {
            self.first = Some(at);
        } else if self.second.is_none() {
            self.second = Some(at);
        }
        self.count = self.count.saturating_add(1);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Delay between the first two focus regains, or 0 with fewer than two
    pub fn first_switch_delay(&self) -> f64 {
        match (self.first, self.second) {
            (Some(first), Some(second)) => second.saturating_sub(first) as f64,
            _ => 0.0,
        }
    }
}

/// Session-scoped aggregate of raw interaction events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureState {
    /// Last observed pointer position/time
    last_pointer_sample: Option<PointerSample>,
    /// Instantaneous pointer speeds (px/ms)
    pointer_speeds: RunningMean,
    /// Previous key-down time
    last_key_at: Option<Millis>,
    /// Inter-keystroke intervals (ms)
    key_delays: RunningMean,
    backspace_count: u32,
    tab_count: u32,
    paste_detected: bool,
    focus_timestamps: FocusLog,
    /// Start of the currently open blur interval
    blurred_at: Option<Millis>,
    /// Accumulated idle time (ms)
    idle_ms: u64,
    honeypot_filled: bool,
    session_start: Millis,
}

impl CaptureState {
    /// Create an empty state for a form mounted at `session_start`
    pub fn new(session_start: Millis) -> Self {
        Self {
            last_pointer_sample: None,
            pointer_speeds: RunningMean::default(),
            last_key_at: None,
            key_delays: RunningMean::default(),
            backspace_count: 0,
            tab_count: 0,
            paste_detected: false,
            focus_timestamps: FocusLog::default(),
            blurred_at: None,
            idle_ms: 0,
            honeypot_filled: false,
            session_start,
        }
    }

    /// Dispatch an event to its handler
    pub fn apply(&mut self, event: &CaptureEvent) {
        match &event.kind {
            CaptureEventKind::PointerMove { x, y } => self.on_pointer_move(*x, *y, event.at),
            CaptureEventKind::KeyDown { key } => self.on_key_down(key, event.at),
            CaptureEventKind::Paste => self.on_paste(),
            CaptureEventKind::Focus => self.on_focus(event.at),
            CaptureEventKind::Blur => self.on_blur(event.at),
            CaptureEventKind::HoneypotInput => self.on_honeypot_input(),
        }
    }

    pub fn on_pointer_move(&mut self, x: f64, y: f64, at: Millis) {
        let sample = PointerSample { x, y, at };
        if let Some(previous) = self.last_pointer_sample {
            let elapsed = at.saturating_sub(previous.at);
            let speed = if elapsed == 0 {
                0.0
            } else {
                previous.distance_to(&sample) / elapsed as f64
            };
            self.pointer_speeds.push(speed);
        }
        self.last_pointer_sample = Some(sample);
    }

    pub fn on_key_down(&mut self, key: &str, at: Millis) {
        if let Some(previous) = self.last_key_at {
            self.key_delays.push(at.saturating_sub(previous) as f64);
        }
        self.last_key_at = Some(at);

        match KeyKind::from_key_name(key) {
            KeyKind::Erase => self.backspace_count = self.backspace_count.saturating_add(1),
            KeyKind::FocusAdvance => self.tab_count = self.tab_count.saturating_add(1),
            KeyKind::Other => {}
        }
    }

    pub fn on_paste(&mut self) {
        self.paste_detected = true;
    }

    pub fn on_focus(&mut self, at: Millis) {
        self.focus_timestamps.push(at);

        if let Some(blurred_at) = self.blurred_at.take() {
            let gap = at.saturating_sub(blurred_at);
            if gap > IDLE_THRESHOLD_MS {
                self.idle_ms = self.idle_ms.saturating_add(gap);
            }
        }
    }

    pub fn on_blur(&mut self, at: Millis) {
        // A second blur without an intervening focus keeps the earlier start
        if self.blurred_at.is_none() {
            self.blurred_at = Some(at);
        }
    }

    pub fn on_honeypot_input(&mut self) {
        self.honeypot_filled = true;
    }

    pub fn session_start(&self) -> Millis {
        self.session_start
    }

    pub fn last_pointer_sample(&self) -> Option<PointerSample> {
        self.last_pointer_sample
    }

    pub fn pointer_speeds(&self) -> &RunningMean {
        &self.pointer_speeds
    }

    pub fn key_delays(&self) -> &RunningMean {
        &self.key_delays
    }

    pub fn backspace_count(&self) -> u32 {
        self.backspace_count
    }

    pub fn tab_count(&self) -> u32 {
        self.tab_count
    }

    pub fn paste_detected(&self) -> bool {
        self.paste_detected
    }

    pub fn focus_timestamps(&self) -> &FocusLog {
        &self.focus_timestamps
    }

    pub fn idle_ms(&self) -> u64 {
        self.idle_ms
    }

    pub fn honeypot_filled(&self) -> bool {
        self.honeypot_filled
    }

    /// Whether the window is currently blurred
    pub fn is_blurred(&self) -> bool {
        self.blurred_at.is_some()
    }
}
