//! Watcher core: orchestration and shutdown.
//!
//! The public API from this module is [`AppWatcher`] (with its builder and
//! [`WatcherConfig`]) and the [`ListenerRegistry`] it exposes read-only.
//!
//! Internal modules:
//! - [`watcher`]: subscribes, spawns the loop, runs the coordinator, unsubscribes;
//! - [`notify`]: consumes notifications in order, resolves or creates listeners, restarts them;
//! - [`shutdown`]: counts awaited listeners down to zero from their status reports;
//! - [`registry`]: one listener per application name, resolve-or-create helper;
//! - [`builder`]: initial listeners and subscribers.

mod builder;
mod config;
mod notify;
mod registry;
mod shutdown;
mod watcher;

#[cfg(test)]
mod testing;

pub use builder::AppWatcherBuilder;
pub use config::WatcherConfig;
pub use registry::ListenerRegistry;
pub use watcher::AppWatcher;
