//! Capture event types
//!
//! This module defines the raw device events a host delivers to the capture
//! subsystem. Timestamps are host-clock epoch milliseconds.

use serde::{Deserialize, Serialize};

/// Host clock timestamp in epoch milliseconds
pub type Millis = u64;

/// Key name reported for the erase key
pub const ERASE_KEY: &str = "Backspace";

/// Key name reported for the focus-advance key
pub const FOCUS_ADVANCE_KEY: &str = "Tab";

/// Payload of a captured device event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CaptureEventKind {
    /// Pointer moved to client coordinates `(x, y)`
    PointerMove { x: f64, y: f64 },
    /// A key was pressed
    KeyDown { key: String },
    /// Clipboard content was pasted anywhere in the window
    Paste,
    /// The window regained focus
    Focus,
    /// The window lost focus
    Blur,
    /// The decoy input received a change event
    HoneypotInput,
}

impl CaptureEventKind {
    /// The subscription filter this payload belongs to
    pub fn kind(&self) -> EventKind {
        match self {
            CaptureEventKind::PointerMove { .. } => EventKind::PointerMove,
            CaptureEventKind::KeyDown { .. } => EventKind::KeyDown,
            CaptureEventKind::Paste => EventKind::Paste,
            CaptureEventKind::Focus => EventKind::Focus,
            CaptureEventKind::Blur => EventKind::Blur,
            CaptureEventKind::HoneypotInput => EventKind::HoneypotInput,
        }
    }
}

/// A device event with the host timestamp at which it was observed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureEvent {
    /// Host timestamp (epoch ms)
    pub at: Millis,
    /// Event payload
    #[serde(flatten)]
    pub kind: CaptureEventKind,
}

impl CaptureEvent {
    pub fn new(at: Millis, kind: CaptureEventKind) -> Self {
        Self { at, kind }
    }

    pub fn pointer_move(at: Millis, x: f64, y: f64) -> Self {
        Self::new(at, CaptureEventKind::PointerMove { x, y })
    }

    pub fn key_down(at: Millis, key: impl Into<String>) -> Self {
        Self::new(at, CaptureEventKind::KeyDown { key: key.into() })
    }
}

/// Event categories a capture session subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PointerMove,
    KeyDown,
    Paste,
    Focus,
    Blur,
    HoneypotInput,
}

impl EventKind {
    /// Every event kind the capture subsystem listens for
    pub const ALL: [EventKind; 6] = [
        EventKind::PointerMove,
        EventKind::KeyDown,
        EventKind::Paste,
        EventKind::Focus,
        EventKind::Blur,
        EventKind::HoneypotInput,
    ];
}

/// Classification of a pressed key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Erase,
    FocusAdvance,
    Other,
}

impl KeyKind {
    pub fn from_key_name(key: &str) -> Self {
        match key {
            ERASE_KEY => KeyKind::Erase,
            FOCUS_ADVANCE_KEY => KeyKind::FocusAdvance,
            _ => KeyKind::Other,
        }
    }
}

/// Last observed pointer position and time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerSample {
    pub x: f64,
    pub y: f64,
    pub at: Millis,
}

impl PointerSample {
    /// Euclidean distance to another sample
    pub fn distance_to(&self, other: &PointerSample) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}
