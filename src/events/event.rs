//! # Diagnostic events emitted by the watcher.
//!
//! The [`EventKind`] enum classifies what the watcher observed or decided:
//! - **Subscription events**: topic subscribed, subscription failed, unsubscribed
//! - **Notification events**: transport errors, lookup failures, skipped applications
//! - **Listener events**: creation, restart requests, start timeouts
//! - **Shutdown events**: status reports consumed or ignored, all listeners exited
//! - **Subscriber events**: overflow and panics inside diagnostic sinks
//!
//! Every recovered error in the watcher is reported here instead of being written
//! to the console, so callers (and tests) decide where diagnostics go.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use appwatch::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::LookupFailed)
//!     .with_app("app1")
//!     .with_op("get_application")
//!     .with_reason("application \"app1\" not found");
//!
//! assert_eq!(ev.kind, EventKind::LookupFailed);
//! assert_eq!(ev.app.as_deref(), Some("app1"));
//! assert_eq!(ev.op, Some("get_application"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of watcher events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `app`: subscriber name
    /// - `reason`: panic info
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `app`: subscriber name
    /// - `reason`: "full" or "closed"
    SubscriberOverflow,

    // === Subscription events ===
    /// Subscribed to the notification topic.
    ///
    /// Sets:
    /// - `reason`: topic
    Subscribed,

    /// Subscribing to the notification topic failed; `watch` returns an error.
    ///
    /// Sets:
    /// - `reason`: topic and store error
    SubscriptionFailed,

    /// Stop was signaled to the subscription after shutdown completed.
    ///
    /// Sets:
    /// - `reason`: topic
    Unsubscribed,

    // === Notification events ===
    /// A notification carried an error instead of an application name.
    ///
    /// Sets:
    /// - `reason`: transport error message
    NotificationFailed,

    /// Fetching the application record or its stream identifiers failed, or the
    /// factory built a listener that does not carry the application's name.
    ///
    /// Sets:
    /// - `app`: application name
    /// - `op`: `get_application`, `list_stream_identifiers`, `list_application_names`
    ///   or `create_listener` (factory returned a listener under another name)
    /// - `reason`: store error message
    LookupFailed,

    /// The application has no stream identifiers; no listener was created.
    ///
    /// Sets:
    /// - `app`: application name
    EmptyStreamSet,

    // === Listener events ===
    /// A new listener was created and registered.
    ///
    /// Sets:
    /// - `app`: application name
    /// - `reason`: number of stream identifiers, e.g. "identifiers=2"
    ListenerCreated,

    /// A listener is being instructed to (re)start.
    ///
    /// Sets:
    /// - `app`: application name
    ListenerRestarting,

    /// A listener's `start` did not return within the configured timeout.
    ///
    /// Sets:
    /// - `app`: application name
    /// - `reason`: timeout, e.g. "500ms"
    StartTimedOut,

    // === Shutdown events ===
    /// A status report was consumed and decremented the outstanding count.
    ///
    /// Sets:
    /// - `app`: reporting listener
    /// - `status`: reported status code
    /// - `outstanding`: awaited listeners still to report
    StatusReceived,

    /// A status report did not decrement (unknown or already reported listener).
    ///
    /// Sets:
    /// - `app`: reporting listener
    /// - `status`: reported status code
    /// - `reason`: "unknown_listener" or "already_reported"
    StatusIgnored,

    /// Every awaited listener reported; the watcher is about to return.
    AllListenersExited,
}

/// Watcher event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Application (or subscriber) name, if applicable.
    pub app: Option<Arc<str>>,
    /// Store operation that failed.
    pub op: Option<&'static str>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Reported listener status code.
    pub status: Option<i32>,
    /// Outstanding listener count after this event.
    pub outstanding: Option<usize>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            app: None,
            op: None,
            reason: None,
            status: None,
            outstanding: None,
        }
    }

    /// Attaches an application name.
    #[inline]
    pub fn with_app(mut self, app: impl Into<Arc<str>>) -> Self {
        self.app = Some(app.into());
        self
    }

    /// Attaches the failing store operation.
    #[inline]
    pub fn with_op(mut self, op: &'static str) -> Self {
        self.op = Some(op);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a listener status code.
    #[inline]
    pub fn with_status(mut self, code: i32) -> Self {
        self.status = Some(code);
        self
    }

    /// Attaches the outstanding count.
    #[inline]
    pub fn with_outstanding(mut self, n: usize) -> Self {
        self.outstanding = Some(n);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_app(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_app(subscriber)
            .with_reason(info)
    }

    /// True for events describing a recovered failure.
    pub fn is_failure(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriptionFailed
                | EventKind::NotificationFailed
                | EventKind::LookupFailed
                | EventKind::StartTimedOut
                | EventKind::SubscriberPanicked
                | EventKind::SubscriberOverflow
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::Subscribed);
        let b = Event::new(EventKind::Unsubscribed);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_empty_stream_set_is_not_a_failure() {
        assert!(!Event::new(EventKind::EmptyStreamSet).is_failure());
        assert!(Event::new(EventKind::LookupFailed).is_failure());
    }
}
