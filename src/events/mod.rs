//! Diagnostic events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to publish
//! what the watcher observed: subscription changes, recovered lookup and transport
//! failures, listener creation/restarts, and shutdown progress.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `AppWatcher`, `NotificationLoop`, `ShutdownCoordinator`,
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the watcher's forwarder (fans out to `SubscriberSet`) and any
//!   receiver obtained from [`AppWatcher::bus`](crate::AppWatcher::bus).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
