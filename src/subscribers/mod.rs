//! # Diagnostic event subscribers.
//!
//! Every event published on the watcher's [`Bus`](crate::Bus) is forwarded to a
//! [`SubscriberSet`], which fans it out to the registered [`Subscribe`] sinks.
//!
//! ```text
//! Bus ──► forwarder (AppWatcher::watch) ──► SubscriberSet::emit_arc
//!                                              ├──► [queue] ─► LogWriter   (feature "logging")
//!                                              └──► [queue] ─► custom sink (metrics, audit, tests)
//! ```
//!
//! ## Implementing a subscriber
//! ```rust
//! use async_trait::async_trait;
//! use appwatch::{Event, EventKind, Subscribe};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! #[derive(Default)]
//! struct FailureCounter(AtomicUsize);
//!
//! #[async_trait]
//! impl Subscribe for FailureCounter {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.is_failure() {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "failure-counter"
//!     }
//! }
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub(crate) use set::panic_message;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
