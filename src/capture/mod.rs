//! Event capture subsystem
//!
//! Turns raw input-device events into running aggregates for the lifetime of
//! a form. Nothing here has UI side effects.
//!
//! Host events → [`CaptureSession`] (scoped subscription) → [`CaptureState`]

pub mod recording;
pub mod session;
pub mod state;
pub mod types;

pub use recording::{parse_recording, Recording};
pub use session::{CaptureSession, EventHost, EventSink, ListenerId, LocalHost};
pub use state::{CaptureState, FocusLog, RunningMean, IDLE_THRESHOLD_MS};
pub use types::{CaptureEvent, CaptureEventKind, EventKind, KeyKind, Millis, PointerSample};
