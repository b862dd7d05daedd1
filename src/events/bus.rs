//! # Diagnostic bus.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`]. The notification loop, the shutdown
//! coordinator and the subscriber workers all publish onto one bus; the watcher
//! forwards it to its [`SubscriberSet`](crate::SubscriberSet), and tests subscribe
//! to it directly.
//!
//! ```text
//!   NotificationLoop ──┐
//!   Coordinator ───────┼──► Bus ──► forwarder (in AppWatcher) ──► SubscriberSet
//!   SubscriberSet ─────┘       └──► test receivers
//! ```
//!
//! ## Rules
//! - `publish()` never blocks and never fails, even with no receivers.
//! - A receiver only observes events sent after it subscribed.
//! - Receivers that fall more than `capacity` events behind see `RecvError::Lagged(n)`.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for watcher events. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus; capacity is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all current receivers; dropped if there are none.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates an independent receiver for subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
