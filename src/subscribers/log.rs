//! # Logging subscriber.
//!
//! [`LogWriter`] turns watcher events into `tracing` records under the
//! `appwatch` target. Install any `tracing` subscriber (for example
//! `tracing_subscriber::fmt`) to see them.
//!
//! ## Levels
//! ```text
//! error  SubscriptionFailed, SubscriberPanicked
//! warn   NotificationFailed, LookupFailed, StartTimedOut, SubscriberOverflow
//! info   Subscribed, Unsubscribed, ListenerCreated, StatusReceived, AllListenersExited
//! debug  EmptyStreamSet, ListenerRestarting, StatusIgnored
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Forwards every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWriter;

impl LogWriter {
    /// Creates the writer.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let app = e.app.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::SubscriptionFailed => {
                tracing::error!(target: "appwatch", seq = e.seq, reason, "subscription failed");
            }
            EventKind::SubscriberPanicked => {
                tracing::error!(
                    target: "appwatch",
                    subscriber = app,
                    reason,
                    "subscriber panicked"
                );
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(target: "appwatch", subscriber = app, reason, "subscriber overflow");
            }
            EventKind::NotificationFailed => {
                tracing::warn!(target: "appwatch", seq = e.seq, reason, "notification error");
            }
            EventKind::LookupFailed => {
                tracing::warn!(
                    target: "appwatch",
                    app,
                    op = e.op.unwrap_or("-"),
                    reason,
                    "lookup failed"
                );
            }
            EventKind::StartTimedOut => {
                tracing::warn!(
                    target: "appwatch",
                    app,
                    timeout = reason,
                    "listener start timed out"
                );
            }
            EventKind::StatusIgnored => {
                tracing::debug!(
                    target: "appwatch",
                    app,
                    status = e.status.unwrap_or_default(),
                    reason,
                    "status ignored"
                );
            }
            EventKind::Subscribed => {
                tracing::info!(target: "appwatch", topic = reason, "subscribed");
            }
            EventKind::Unsubscribed => {
                tracing::info!(target: "appwatch", topic = reason, "unsubscribed");
            }
            EventKind::ListenerCreated => {
                tracing::info!(target: "appwatch", app, reason, "listener created");
            }
            EventKind::AllListenersExited => {
                tracing::info!(target: "appwatch", "all listeners exited");
            }
            EventKind::EmptyStreamSet => {
                tracing::debug!(target: "appwatch", app, "no stream identifiers, skipped");
            }
            EventKind::ListenerRestarting => {
                tracing::debug!(target: "appwatch", app, "restarting listener");
            }
            EventKind::StatusReceived => {
                tracing::info!(
                    target: "appwatch",
                    app,
                    status = e.status.unwrap_or_default(),
                    outstanding = e.outstanding.unwrap_or_default(),
                    "status received"
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
