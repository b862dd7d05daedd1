use std::sync::Arc;

use crate::core::config::WatcherConfig;
use crate::core::registry::ListenerRegistry;
use crate::core::watcher::AppWatcher;
use crate::events::Bus;
use crate::listener::{ListenerFactory, ListenerRef};
use crate::store::ApplicationStore;
use crate::subscribers::Subscribe;

/// Builder for an [`AppWatcher`] with optional initial listeners and subscribers.
pub struct AppWatcherBuilder<S, F> {
    cfg: WatcherConfig,
    store: Arc<S>,
    factory: F,
    listeners: Vec<ListenerRef>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl<S, F> AppWatcherBuilder<S, F>
where
    S: ApplicationStore,
    F: ListenerFactory,
{
    /// Starts a builder with no initial listeners and no subscribers.
    pub fn new(cfg: WatcherConfig, store: Arc<S>, factory: F) -> Self {
        Self {
            cfg,
            store,
            factory,
            listeners: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    /// Seeds the registry; these listeners are awaited by the first `watch`.
    ///
    /// When two listeners share a name, the first one wins.
    pub fn with_listeners(mut self, listeners: Vec<ListenerRef>) -> Self {
        self.listeners.extend(listeners);
        self
    }

    /// Sets diagnostic event subscribers.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the watcher. Does not touch the store and spawns nothing.
    pub fn build(self) -> AppWatcher<S, F> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());

        let mut registry = ListenerRegistry::new();
        for listener in self.listeners {
            if let Err(dup) = registry.insert(listener) {
                tracing::warn!(app = dup.name(), "duplicate initial listener ignored");
            }
        }

        AppWatcher::new_internal(
            self.cfg,
            self.store,
            self.factory,
            registry,
            bus,
            self.subscribers,
        )
    }
}
