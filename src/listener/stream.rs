//! # Source-backed listener (`StreamListener`)
//!
//! [`StreamListener`] implements the [`Listener`] restart contract on top of a
//! [`Source`]: something that, given a [`RunContext`], streams items until it is
//! done, fails, or its token is cancelled.
//!
//! ## Run lifecycle
//! ```text
//! start(status)
//!   ├─► previous run? ── cancel token ──► join (it reports its own status)
//!   ├─► state = Starting
//!   ├─► fresh CancellationToken, RunContext { app, identifiers, output, token }
//!   ├─► state = Running
//!   └─► spawn: source.stream(ctx)
//!               ├─ Ok / Canceled ─► state = Stopped, report STATUS_OK
//!               ├─ Fail / Fatal  ─► state = Failed,  report 1 / 2
//!               └─ panic         ─► state = Failed,  report STATUS_PANICKED
//! ```
//!
//! ## Rules
//! - At most one run per listener at a time; runs never overlap.
//! - Every run sends **exactly one** [`StatusReport`](crate::StatusReport).
//! - Restarts are never refused: any state may transition to `Starting`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use appwatch::{ListenerError, RunContext, SourceFn, StreamListenerFactory};
//!
//! let factory = StreamListenerFactory::new(SourceFn::new(|ctx: RunContext<String>| async move {
//!     for id in ctx.identifiers.iter() {
//!         if ctx.token.is_cancelled() {
//!             return Err(ListenerError::Canceled);
//!         }
//!         let _ = ctx.output.send(format!("{}:{id}", ctx.app.name)).await;
//!     }
//!     Ok(())
//! }));
//! # let _ = factory;
//! ```

use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::ListenerError;
use crate::listener::listener::{
    Listener, ListenerFactory, ListenerRef, OutputSink, STATUS_OK, STATUS_PANICKED, StatusReport,
    StatusSink,
};
use crate::store::{ApplicationRecord, StreamIdentifiers};

/// Boxed future returned by [`Source::stream`].
pub type BoxStreamFuture = BoxFuture<'static, Result<(), ListenerError>>;

/// Observable lifecycle state of a [`StreamListener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Never started, or the last run ended without error.
    Stopped,
    /// A restart is in progress.
    Starting,
    /// A run is active.
    Running,
    /// The last run failed or panicked.
    Failed,
}

/// Everything one run of a [`Source`] gets to work with.
pub struct RunContext<T> {
    /// The application being streamed.
    pub app: Arc<ApplicationRecord>,
    /// Stream identifiers assigned to the listener.
    pub identifiers: StreamIdentifiers,
    /// Shared output sink.
    pub output: OutputSink<T>,
    /// Cancelled when the listener restarts or stops.
    pub token: CancellationToken,
}

/// Streaming body of a listener. Called once per run.
pub trait Source: Send + Sync + 'static {
    /// Item pushed onto the output sink.
    type Item: Send + 'static;

    /// Creates the future for one run.
    fn stream(&self, ctx: RunContext<Self::Item>) -> BoxStreamFuture;
}

/// Closure-backed [`Source`]; the closure creates a fresh future per run.
pub struct SourceFn<T, F> {
    f: F,
    _item: PhantomData<fn() -> T>,
}

impl<T, F> SourceFn<T, F> {
    /// Wraps `f` as a source.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _item: PhantomData,
        }
    }
}

impl<T, F, Fut> Source for SourceFn<T, F>
where
    T: Send + 'static,
    F: Fn(RunContext<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ListenerError>> + Send + 'static,
{
    type Item = T;

    fn stream(&self, ctx: RunContext<T>) -> BoxStreamFuture {
        Box::pin((self.f)(ctx))
    }
}

/// The active run. Only `start` and `stop` cancel it; dropping the listener
/// leaves an in-flight run to finish on its own.
struct Run {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

/// [`Listener`] that drives a [`Source`] with restart-on-start semantics.
pub struct StreamListener<S: Source> {
    name: Arc<str>,
    app: Arc<ApplicationRecord>,
    identifiers: StreamIdentifiers,
    output: OutputSink<S::Item>,
    source: Arc<S>,
    current: Mutex<Option<Run>>,
    state: Arc<watch::Sender<ListenerState>>,
}

impl<S: Source> StreamListener<S> {
    /// Creates a stopped listener for `app`.
    pub fn new(
        app: ApplicationRecord,
        identifiers: StreamIdentifiers,
        output: OutputSink<S::Item>,
        source: Arc<S>,
    ) -> Self {
        let (state, _rx) = watch::channel(ListenerState::Stopped);
        Self {
            name: Arc::from(app.name.as_str()),
            app: Arc::new(app),
            identifiers,
            output,
            source,
            current: Mutex::new(None),
            state: Arc::new(state),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    /// Receiver observing every state transition.
    pub fn subscribe_state(&self) -> watch::Receiver<ListenerState> {
        self.state.subscribe()
    }

    /// Stream identifiers this listener was built with.
    pub fn identifiers(&self) -> &StreamIdentifiers {
        &self.identifiers
    }

    /// Cancels the active run (if any) and waits for it to report.
    pub async fn stop(&self) {
        let prev = self.current.lock().await.take();
        if let Some(run) = prev {
            teardown(run).await;
        }
    }
}

async fn teardown(run: Run) {
    run.cancel.cancel();
    // Panics are caught inside the run, so a join error means the runtime is shutting down.
    let _ = run.join.await;
}

#[async_trait]
impl<S: Source> Listener for StreamListener<S> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, status: StatusSink) {
        let mut current = self.current.lock().await;
        if let Some(prev) = current.take() {
            teardown(prev).await;
        }
        self.state.send_replace(ListenerState::Starting);

        let token = CancellationToken::new();
        let fut = self.source.stream(RunContext {
            app: Arc::clone(&self.app),
            identifiers: self.identifiers.clone(),
            output: self.output.clone(),
            token: token.clone(),
        });

        let name = Arc::clone(&self.name);
        let state = Arc::clone(&self.state);
        self.state.send_replace(ListenerState::Running);

        let join = tokio::spawn(async move {
            let (code, next) = match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(())) => (STATUS_OK, ListenerState::Stopped),
                Ok(Err(e)) => match e.status_code() {
                    STATUS_OK => (STATUS_OK, ListenerState::Stopped),
                    code => (code, ListenerState::Failed),
                },
                Err(payload) => {
                    let info = crate::subscribers::panic_message(&*payload);
                    tracing::error!(listener = %name, panic = %info, "listener run panicked");
                    (STATUS_PANICKED, ListenerState::Failed)
                }
            };
            state.send_replace(next);
            // The coordinator may already be gone after shutdown.
            let _ = status.send(StatusReport::new(name, code)).await;
        });

        *current = Some(Run {
            cancel: token,
            join,
        });
    }
}

/// [`ListenerFactory`] producing [`StreamListener`]s that share one [`Source`].
pub struct StreamListenerFactory<S> {
    source: Arc<S>,
}

impl<S: Source> StreamListenerFactory<S> {
    /// Creates a factory around `source`.
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
        }
    }
}

impl<S: Source> ListenerFactory for StreamListenerFactory<S> {
    type Item = S::Item;

    fn create(
        &self,
        app: ApplicationRecord,
        identifiers: StreamIdentifiers,
        output: OutputSink<S::Item>,
    ) -> ListenerRef {
        Arc::new(StreamListener::new(
            app,
            identifiers,
            output,
            Arc::clone(&self.source),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::{Notify, mpsc};
    use tokio::time::timeout;

    fn record(name: &str) -> ApplicationRecord {
        ApplicationRecord::new(name)
    }

    fn ids(list: &[&str]) -> StreamIdentifiers {
        StreamIdentifiers::from(list.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }

    async fn next_report(rx: &mut mpsc::Receiver<StatusReport>) -> StatusReport {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("report in time")
            .expect("channel open")
    }

    #[tokio::test]
    async fn test_run_pushes_items_and_reports_once() {
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let (st_tx, mut st_rx) = mpsc::channel(8);
        let source = SourceFn::new(|ctx: RunContext<String>| async move {
            for id in ctx.identifiers.iter() {
                let _ = ctx.output.send(id.clone()).await;
            }
            Ok::<_, ListenerError>(())
        });
        let listener =
            StreamListener::new(record("app1"), ids(&["u1", "u2"]), out_tx, Arc::new(source));

        listener.start(st_tx).await;

        assert_eq!(out_rx.recv().await.as_deref(), Some("u1"));
        assert_eq!(out_rx.recv().await.as_deref(), Some("u2"));
        let report = next_report(&mut st_rx).await;
        assert_eq!(report, StatusReport::new("app1", STATUS_OK));
        assert!(st_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_restart_cancels_previous_run() {
        let (out_tx, _out_rx) = mpsc::channel::<()>(1);
        let (st_tx, mut st_rx) = mpsc::channel(8);
        let source = SourceFn::new(|ctx: RunContext<()>| async move {
            ctx.token.cancelled().await;
            Err::<(), _>(ListenerError::Canceled)
        });
        let listener =
            StreamListener::new(record("app1"), ids(&["u1"]), out_tx, Arc::new(source));

        listener.start(st_tx.clone()).await;
        assert_eq!(listener.state(), ListenerState::Running);

        listener.start(st_tx).await;
        let first = next_report(&mut st_rx).await;
        assert_eq!(first.code, STATUS_OK);
        assert_eq!(listener.state(), ListenerState::Running);

        listener.stop().await;
        let second = next_report(&mut st_rx).await;
        assert_eq!(second.code, STATUS_OK);
        assert_eq!(listener.state(), ListenerState::Stopped);
    }

    #[tokio::test]
    async fn test_failure_and_panic_codes() {
        let (out_tx, _out_rx) = mpsc::channel::<()>(1);
        let (st_tx, mut st_rx) = mpsc::channel(8);

        let failing = StreamListener::new(
            record("failing"),
            ids(&["u1"]),
            out_tx.clone(),
            Arc::new(SourceFn::new(|_ctx: RunContext<()>| async {
                Err::<(), _>(ListenerError::Fail {
                    error: "connection reset".into(),
                })
            })),
        );
        failing.start(st_tx.clone()).await;
        let report = next_report(&mut st_rx).await;
        assert_eq!(report, StatusReport::new("failing", 1));

        let panicking = StreamListener::new(
            record("panicking"),
            ids(&["u1"]),
            out_tx,
            Arc::new(SourceFn::new(|ctx: RunContext<()>| async move {
                if !ctx.token.is_cancelled() {
                    panic!("boom");
                }
                Ok::<_, ListenerError>(())
            })),
        );
        panicking.start(st_tx).await;
        let report = next_report(&mut st_rx).await;
        assert_eq!(report, StatusReport::new("panicking", STATUS_PANICKED));
        assert_eq!(panicking.state(), ListenerState::Failed);
    }

    #[tokio::test]
    async fn test_dropping_listener_leaves_run_in_flight() {
        let (out_tx, mut out_rx) = mpsc::channel(4);
        let (st_tx, mut st_rx) = mpsc::channel(8);
        let gate = Arc::new(Notify::new());
        let release = Arc::clone(&gate);
        let source = SourceFn::new(move |ctx: RunContext<&'static str>| {
            let gate = Arc::clone(&gate);
            async move {
                tokio::select! {
                    _ = ctx.token.cancelled() => {
                        let _ = ctx.output.send("cancelled").await;
                        Err(ListenerError::Canceled)
                    }
                    _ = gate.notified() => {
                        let _ = ctx.output.send("done").await;
                        Ok(())
                    }
                }
            }
        });
        let listener =
            StreamListener::new(record("app1"), ids(&["u1"]), out_tx, Arc::new(source));

        listener.start(st_tx).await;
        drop(listener);
        tokio::task::yield_now().await;
        release.notify_one();

        let item = timeout(Duration::from_secs(2), out_rx.recv()).await.unwrap();
        assert_eq!(item, Some("done"));
        assert_eq!(next_report(&mut st_rx).await, StatusReport::new("app1", STATUS_OK));
    }
}
