//! # Listener abstraction and its status plumbing.
//!
//! A [`Listener`] streams data for one application. The watcher only knows its
//! [`name`](Listener::name) and how to [`start`](Listener::start) it; everything
//! else (connections, upstream protocol, teardown) belongs to the implementation.
//!
//! Results flow to the shared [`OutputSink`] given at construction time; termination
//! flows to the shared [`StatusSink`] given on each start.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::store::{ApplicationRecord, StreamIdentifiers};

/// Status code for a run that completed or was cancelled gracefully.
pub const STATUS_OK: i32 = 0;
/// Status code for a run that failed and may succeed on restart.
pub const STATUS_FAILED: i32 = 1;
/// Status code for a run that hit a non-recoverable error.
pub const STATUS_FATAL: i32 = 2;
/// Status code for a run whose task panicked.
pub const STATUS_PANICKED: i32 = 101;

/// Shared many-producer sink for listener results.
pub type OutputSink<T> = mpsc::Sender<T>;

/// Shared many-producer sink for termination reports.
pub type StatusSink = mpsc::Sender<StatusReport>;

/// Shared handle to a listener.
pub type ListenerRef = Arc<dyn Listener>;

/// One listener termination: who stopped and with which code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    /// Name of the listener that stopped.
    pub listener: Arc<str>,
    /// Termination status code ([`STATUS_OK`] on success).
    pub code: i32,
}

impl StatusReport {
    /// Creates a report for `listener` with `code`.
    pub fn new(listener: impl Into<Arc<str>>, code: i32) -> Self {
        Self {
            listener: listener.into(),
            code,
        }
    }

    /// True if the run ended without error.
    pub fn is_ok(&self) -> bool {
        self.code == STATUS_OK
    }
}

/// # Restartable streaming unit for one application.
///
/// ## Contract
/// - `name()` is stable and is the registry key.
/// - Every run started by `start` eventually pushes **exactly one** [`StatusReport`]
///   onto the given sink, whether it completed, was cancelled by a restart, or failed.
/// - That report's `listener` must equal `name()`. A report under any other name
///   is ignored and never counts, so `watch` keeps waiting for this listener.
/// - `start` on an already started listener is a restart: the implementation tears
///   down the prior run itself. It must be safe to call repeatedly.
/// - `start` returns once the run is triggered; it must not wait for the run to end.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use appwatch::{Listener, StatusReport, StatusSink};
///
/// struct Once;
///
/// #[async_trait]
/// impl Listener for Once {
///     fn name(&self) -> &str { "once" }
///
///     async fn start(&self, status: StatusSink) {
///         tokio::spawn(async move {
///             let _ = status.send(StatusReport::new("once", 0)).await;
///         });
///     }
/// }
/// ```
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    /// Returns the application name this listener streams for.
    fn name(&self) -> &str;

    /// Begins (or restarts) streaming; the run reports on `status` when it stops.
    async fn start(&self, status: StatusSink);
}

/// Builds listeners for applications seen for the first time.
pub trait ListenerFactory: Send + Sync + 'static {
    /// Item type the created listeners push to the output sink.
    type Item: Send + 'static;

    /// Constructs a listener bound to `output`; it is not started yet.
    fn create(
        &self,
        app: ApplicationRecord,
        identifiers: StreamIdentifiers,
        output: OutputSink<Self::Item>,
    ) -> ListenerRef;
}

/// Status channel handed to [`AppWatcher::watch`](crate::AppWatcher::watch).
///
/// Holds the single receiving end (consumed by the shutdown coordinator) and a
/// sender that can be cloned for listeners started outside the watcher.
pub struct StatusChannel {
    tx: StatusSink,
    rx: mpsc::Receiver<StatusReport>,
}

impl StatusChannel {
    /// Creates a bounded status channel; capacity is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self { tx, rx }
    }

    /// Returns a new sender for the channel.
    pub fn sender(&self) -> StatusSink {
        self.tx.clone()
    }

    pub(crate) fn into_parts(self) -> (StatusSink, mpsc::Receiver<StatusReport>) {
        (self.tx, self.rx)
    }
}

/// Creates a bounded output channel; capacity is clamped to at least 1.
pub fn output_channel<T>(capacity: usize) -> (OutputSink<T>, mpsc::Receiver<T>) {
    mpsc::channel(capacity.max(1))
}
