//! Capture sessions
//!
//! A [`CaptureSession`] subscribes to an [`EventHost`] when the form is mounted
//! and releases the subscription when it is dropped, whichever way the form
//! goes away. Events arrive through a channel in host delivery order and are
//! applied one at a time on the session's own thread of control.

use crate::capture::state::CaptureState;
use crate::capture::types::{CaptureEvent, EventKind, Millis};
use crate::error::CaptureError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Channel end a host pushes captured events into
pub type EventSink = mpsc::UnboundedSender<CaptureEvent>;

/// Handle for one registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Source of device events (a window, a webview bridge, a replayed recording)
pub trait EventHost {
    /// Register a listener for `kinds`; matching events are pushed into `sink`
    fn subscribe(&self, kinds: &[EventKind], sink: EventSink) -> Result<ListenerId, CaptureError>;

    /// Remove a listener. Unknown ids are ignored.
    fn unsubscribe(&self, id: ListenerId);
}

/// Capture state bound to a live host subscription
pub struct CaptureSession<'h, H: EventHost + ?Sized> {
    host: &'h H,
    listener: Option<ListenerId>,
    events: mpsc::UnboundedReceiver<CaptureEvent>,
    state: CaptureState,
}

impl<'h, H: EventHost + ?Sized> CaptureSession<'h, H> {
    /// Subscribe to every capture event kind on `host`
    pub fn mount(host: &'h H, session_start: Millis) -> Result<Self, CaptureError> {
        let (sink, events) = mpsc::unbounded_channel();
        let listener = host.subscribe(&EventKind::ALL, sink)?;
        tracing::debug!(listener = listener.0, session_start, "capture session mounted");

        Ok(Self {
            host,
            listener: Some(listener),
            events,
            state: CaptureState::new(session_start),
        })
    }

    /// Apply every event delivered so far, in delivery order. Returns how many were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events.try_recv() {
            tracing::trace!(at = event.at, kind = ?event.kind.kind(), "capture event");
            self.state.apply(&event);
            applied += 1;
        }
        applied
    }

    /// Current aggregates (events not yet pumped are not included)
    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn is_mounted(&self) -> bool {
        self.listener.is_some()
    }

    /// Tear the subscription down, apply what was already delivered, and return the final state
    pub fn unmount(mut self) -> CaptureState {
        self.release();
        self.pump();
        let start = self.state.session_start();
        std::mem::replace(&mut self.state, CaptureState::new(start))
    }

    fn release(&mut self) {
        if let Some(listener) = self.listener.take() {
            self.host.unsubscribe(listener);
            tracing::debug!(listener = listener.0, "capture session unmounted");
        }
    }
}

impl<H: EventHost + ?Sized> Drop for CaptureSession<'_, H> {
    fn drop(&mut self) {
        self.release();
    }
}

struct Listener {
    id: ListenerId,
    kinds: Vec<EventKind>,
    sink: EventSink,
}

/// In-process event host with an explicit `emit`
#[derive(Default)]
pub struct LocalHost {
    listeners: Mutex<Vec<Listener>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl LocalHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to every listener subscribed to its kind. Returns the number reached.
    pub fn emit(&self, event: CaptureEvent) -> usize {
        let kind = event.kind.kind();
        let mut listeners = self.listeners.lock();
        // Receivers that went away without unsubscribing are pruned here
        listeners.retain(|l| !l.sink.is_closed());

        let mut delivered = 0;
        for listener in listeners.iter().filter(|l| l.kinds.contains(&kind)) {
            if listener.sink.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Stop accepting subscriptions and drop every listener
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.listeners.lock().clear();
    }
}

impl EventHost for LocalHost {
    fn subscribe(&self, kinds: &[EventKind], sink: EventSink) -> Result<ListenerId, CaptureError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CaptureError::HostClosed);
        }
        if kinds.is_empty() {
            return Err(CaptureError::SubscriptionRefused(
                "no event kinds requested".to_string(),
            ));
        }

        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners.lock().push(Listener {
            id,
            kinds: kinds.to_vec(),
            sink,
        });
        Ok(id)
    }

    fn unsubscribe(&self, id: ListenerId) {
        self.listeners.lock().retain(|l| l.id != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::types::CaptureEventKind;

    #[test]
    fn test_mount_subscribes_once_and_drop_releases() {
        let host = LocalHost::new();
        {
            let session = CaptureSession::mount(&host, 0).unwrap();
            assert!(session.is_mounted());
            assert_eq!(host.listener_count(), 1);
        }
        assert_eq!(host.listener_count(), 0);
    }

    #[test]
    fn test_release_on_unwind() {
        let host = LocalHost::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _session = CaptureSession::mount(&host, 0).unwrap();
            panic!("form crashed");
        }));

        assert!(result.is_err());
        assert_eq!(host.listener_count(), 0);
    }

    #[test]
    fn test_pump_applies_in_delivery_order() {
        let host = LocalHost::new();
        let mut session = CaptureSession::mount(&host, 0).unwrap();

        host.emit(CaptureEvent::key_down(100, "a"));
        host.emit(CaptureEvent::key_down(250, "b"));
        host.emit(CaptureEvent::key_down(300, "Backspace"));
        assert_eq!(session.state().key_delays().count(), 0);

        assert_eq!(session.pump(), 3);
        assert_eq!(session.state().key_delays().count(), 2);
        assert!((session.state().key_delays().mean() - 100.0).abs() < 1e-9);
        assert_eq!(session.state().backspace_count(), 1);
    }

    #[test]
    fn test_unmount_returns_state_and_stops_delivery() {
        let host = LocalHost::new();
        let session = CaptureSession::mount(&host, 10).unwrap();
        host.emit(CaptureEvent::new(20, CaptureEventKind::Paste));

        let state = session.unmount();
        assert!(state.paste_detected());
        assert_eq!(state.session_start(), 10);
        assert_eq!(host.listener_count(), 0);
        assert_eq!(host.emit(CaptureEvent::new(30, CaptureEventKind::Paste)), 0);
    }

    #[test]
    fn test_closed_host_refuses_mount() {
        let host = LocalHost::new();
        host.close();
        let err = CaptureSession::mount(&host, 0).err().unwrap();
        assert!(matches!(err, CaptureError::HostClosed));
    }

    #[test]
    fn test_empty_subscription_refused() {
        let host = LocalHost::new();
        let (sink, _events) = mpsc::unbounded_channel();
        assert!(host.subscribe(&[], sink).is_err());
    }

    #[test]
    fn test_emit_filters_by_kind() {
        let host = LocalHost::new();
        let (sink, mut events) = mpsc::unbounded_channel();
        host.subscribe(&[EventKind::Paste], sink).unwrap();

        assert_eq!(host.emit(CaptureEvent::key_down(1, "a")), 0);
        assert_eq!(host.emit(CaptureEvent::new(2, CaptureEventKind::Paste)), 1);
        assert_eq!(events.try_recv().unwrap().at, 2);
    }

    #[test]
    fn test_two_sessions_are_independent() {
        let host = LocalHost::new();
        let mut first = CaptureSession::mount(&host, 0).unwrap();
        let mut second = CaptureSession::mount(&host, 0).unwrap();
        host.emit(CaptureEvent::new(5, CaptureEventKind::HoneypotInput));
        first.pump();
        second.pump();

        assert!(first.state().honeypot_filled());
        assert!(second.state().honeypot_filled());
        drop(first);
        assert_eq!(host.listener_count(), 1);
    }
}
