//! # Application store contract.
//!
//! The watcher reads everything it knows about applications through an
//! [`ApplicationStore`]: the notification subscription, application records, and
//! per-application stream identifiers. The store is read-only to the watcher.
//!
//! ```text
//! ApplicationStore
//!   ├─► subscribe(topic)               → Subscription { events, stop }
//!   ├─► get_application(name)          → ApplicationRecord   | NotFound | Transport | Decode
//!   ├─► list_stream_identifiers(name)  → StreamIdentifiers   | Transport (may be empty)
//!   └─► list_application_names()       → Vec<String>         | Transport
//! ```
//!
//! [`MemoryStore`] is an in-process implementation with the record layout of the
//! key/value backend the watcher was first deployed against. Tests and demos use it.

mod memory;
mod record;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::StoreError;

pub use memory::{DEFAULT_IDENTIFIER_KEY, MemoryStore};
pub use record::{ApplicationRecord, StreamIdentifiers, UserRecord};

/// One message on the notification topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Name of an application that should be (re)watched.
    App(String),
    /// The transport delivered an error instead of a name.
    Error(StoreError),
}

/// Signals a [`Subscription`] to stop delivering events. Cheap to clone.
#[derive(Clone, Debug, Default)]
pub struct StopHandle {
    token: CancellationToken,
}

impl StopHandle {
    /// Creates a handle around `token`.
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Signals stop; never blocks and is idempotent.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// True once stop has been signaled.
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once stop has been signaled.
    pub async fn stopped(&self) {
        self.token.cancelled().await;
    }
}

/// Live subscription: a stream of [`Notification`]s plus its stop signal.
///
/// The store must end the stream (drop its sender) once stop is signaled.
pub struct Subscription {
    events: mpsc::Receiver<Notification>,
    stop: StopHandle,
}

impl Subscription {
    /// Pairs an event stream with the handle that ends it.
    pub fn new(events: mpsc::Receiver<Notification>, stop: StopHandle) -> Self {
        Self { events, stop }
    }

    /// Stop handle for this subscription.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Splits into the event stream and its stop handle.
    pub fn into_parts(self) -> (mpsc::Receiver<Notification>, StopHandle) {
        (self.events, self.stop)
    }
}

/// # Read contract the watcher needs from persistent storage.
///
/// Implementations must be safe to share between the watcher and the notification
/// loop task.
#[async_trait]
pub trait ApplicationStore: Send + Sync + 'static {
    /// Subscribes to `topic`; events flow until the returned stop handle fires.
    async fn subscribe(&self, topic: &str) -> Result<Subscription, StoreError>;

    /// Fetches the record of application `name`.
    async fn get_application(&self, name: &str) -> Result<ApplicationRecord, StoreError>;

    /// Lists the stream identifiers of application `name`; empty is not an error.
    async fn list_stream_identifiers(&self, name: &str) -> Result<StreamIdentifiers, StoreError>;

    /// Lists every application name known to the store.
    async fn list_application_names(&self) -> Result<Vec<String>, StoreError>;
}
