//! # appwatch
//!
//! **appwatch** keeps one restartable stream listener per application and
//! restarts it whenever the application's name is published on a notification
//! topic. [`AppWatcher::watch`] returns once every listener it is waiting for has
//! reported termination.
//!
//! ## Architecture
//! ```text
//!                ┌──────────────────────────┐
//!                │     ApplicationStore     │  subscribe / get_application /
//!                │  (MemoryStore or custom) │  list_stream_identifiers
//!                └──────┬────────────▲──────┘
//!          Notification │            │ lookups
//!                       ▼            │
//! ┌──────────────────────────────────┴─────────────────────────────────┐
//! │ NotificationLoop (one task, owns ListenerRegistry)                 │
//! │   App(name) ─► registry hit? ─ no ─► ListenerFactory::create()     │
//! │                     │                   └─► admit(name) ──────┐    │
//! │                     └──────────► listener.start(status) ◄─────┘    │
//! └──────────────────────┬───────────────────────────────┬─────────────┘
//!                        │ items                         │ StatusReport
//!                        ▼                               ▼
//!                 OutputSink<T> (caller)      ShutdownCoordinator (caller's flow)
//!                                               outstanding == 0 ─► stop, return
//!
//! Every decision ─► Bus ─► SubscriberSet ─► LogWriter / custom Subscribe
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types / traits                          |
//! |-------------------|----------------------------------------------------------|---------------------------------------------|
//! | **Watching**      | Subscribe, resolve or create listeners, await reports.   | [`AppWatcher`], [`WatcherConfig`]           |
//! | **Listeners**     | Restartable per-application streaming units.             | [`Listener`], [`ListenerFactory`], [`StreamListener`] |
//! | **Store**         | Read contract plus an in-memory implementation.          | [`ApplicationStore`], [`MemoryStore`]       |
//! | **Events**        | Diagnostics for every recovered failure and decision.    | [`Event`], [`EventKind`], [`Bus`]           |
//! | **Subscriber API**| Pluggable sinks for events.                              | [`Subscribe`], [`SubscriberSet`]            |
//! | **Errors**        | Typed errors for watch, store and listener runs.         | [`WatchError`], [`StoreError`], [`ListenerError`] |
//!
//! ## Optional features
//! - `logging` (default): exports [`LogWriter`], which renders events through `tracing`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use appwatch::{
//!     AppWatcher, ApplicationRecord, DEFAULT_IDENTIFIER_KEY, ListenerError, MemoryStore,
//!     RunContext, SourceFn, StatusChannel, StreamListenerFactory, UserRecord, WatcherConfig,
//!     output_channel,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     store.put_application(&ApplicationRecord::new("app1")).await?;
//!     store.add_member("app1", "id:1").await;
//!     store
//!         .put_user("id:1", &UserRecord::new("alice").with_metadata(DEFAULT_IDENTIFIER_KEY, "alice"))
//!         .await?;
//!
//!     // One pass over the identifiers, then the run ends and reports.
//!     let factory = StreamListenerFactory::new(SourceFn::new(|ctx: RunContext<String>| async move {
//!         for id in ctx.identifiers.iter() {
//!             let _ = ctx.output.send(format!("{}:{id}", ctx.app.name)).await;
//!         }
//!         Ok::<_, ListenerError>(())
//!     }));
//!
//!     let cfg = WatcherConfig::default();
//!     let (output, mut items) = output_channel(cfg.output_capacity);
//!     let status = StatusChannel::new(cfg.status_capacity);
//!     let watcher = AppWatcher::new(cfg, Arc::clone(&store), factory);
//!
//!     let publisher = Arc::clone(&store);
//!     tokio::spawn(async move {
//!         // Retry until the watcher has subscribed.
//!         while publisher.publish("apps", "app1").await == 0 {
//!             tokio::task::yield_now().await;
//!         }
//!     });
//!
//!     watcher.watch(output, status).await?;
//!     assert_eq!(items.recv().await.as_deref(), Some("app1:alice"));
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod listener;
mod store;
mod subscribers;

// ---- Public re-exports ----

pub use core::{AppWatcher, AppWatcherBuilder, ListenerRegistry, WatcherConfig};
pub use error::{ListenerError, StoreError, WatchError};
pub use events::{Bus, Event, EventKind};
pub use listener::{
    BoxStreamFuture, Listener, ListenerFactory, ListenerRef, ListenerState, OutputSink,
    RunContext, STATUS_FAILED, STATUS_FATAL, STATUS_OK, STATUS_PANICKED, Source, SourceFn,
    StatusChannel, StatusReport, StatusSink, StreamListener, StreamListenerFactory,
    output_channel,
};
pub use store::{
    ApplicationRecord, ApplicationStore, DEFAULT_IDENTIFIER_KEY, MemoryStore, Notification,
    StopHandle, StreamIdentifiers, Subscription, UserRecord,
};
pub use subscribers::{Subscribe, SubscriberSet};

// Built-in `tracing` subscriber.
// Enabled by default; disable with `--no-default-features`.
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
