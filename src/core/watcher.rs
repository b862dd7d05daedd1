//! # AppWatcher: subscribe, react to notifications, return once every listener reported.
//!
//! ```text
//! watch(output, status)
//!   ├─► store.subscribe(topic) ── err ─► SubscriptionFailed, Err(WatchError::Subscription)
//!   ├─► Subscribed
//!   ├─► spawn NotificationLoop (owns the registry, admits new listeners)
//!   │         events ──► resolve-or-create ──► listener.start(status)
//!   ├─► ShutdownCoordinator::wait(status)      (awaits initial + admitted listeners)
//!   │         └─ outstanding == 0 ─► AllListenersExited
//!   ├─► stop.stop()  → subscription ends, loop exits on its own
//!   ├─► Unsubscribed
//!   └─► flush subscribers, return
//! ```
//!
//! ## Rules
//! - `watch` consumes the watcher: one watch per registry.
//! - Notification failures never end `watch`; they surface as events only.
//! - `watch` never holds a status sender itself, so a closed status channel
//!   means nobody is left to report.
//! - The loop is not joined: a listener whose `start` never returns cannot hold
//!   `watch` open once the count reached zero.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::builder::AppWatcherBuilder;
use crate::core::config::WatcherConfig;
use crate::core::notify::NotificationLoop;
use crate::core::registry::{ListenerRegistry, build_listener};
use crate::core::shutdown::ShutdownCoordinator;
use crate::error::{StoreError, WatchError};
use crate::events::{Bus, Event, EventKind};
use crate::listener::{ListenerFactory, OutputSink, StatusChannel};
use crate::store::ApplicationStore;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Orchestrates one listener per application name for the lifetime of a watch.
pub struct AppWatcher<S, F: ListenerFactory> {
    cfg: WatcherConfig,
    store: Arc<S>,
    factory: F,
    registry: ListenerRegistry,
    bus: Bus,
    subscribers: Vec<Arc<dyn Subscribe>>,
    events: broadcast::Receiver<Event>,
}

impl<S, F> AppWatcher<S, F>
where
    S: ApplicationStore,
    F: ListenerFactory,
{
    /// Creates a watcher with an empty registry and no subscribers.
    pub fn new(cfg: WatcherConfig, store: Arc<S>, factory: F) -> Self {
        Self::builder(cfg, store, factory).build()
    }

    /// Returns a builder for initial listeners and subscribers.
    pub fn builder(cfg: WatcherConfig, store: Arc<S>, factory: F) -> AppWatcherBuilder<S, F> {
        AppWatcherBuilder::new(cfg, store, factory)
    }

    pub(crate) fn new_internal(
        cfg: WatcherConfig,
        store: Arc<S>,
        factory: F,
        registry: ListenerRegistry,
        bus: Bus,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Self {
        // Subscribed before anything can publish, so subscribers see every event.
        let events = bus.subscribe();
        Self {
            cfg,
            store,
            factory,
            registry,
            bus,
            subscribers,
            events,
        }
    }

    /// Diagnostic bus; receivers only see events published after they subscribe.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Listeners the next `watch` starts with.
    pub fn registry(&self) -> &ListenerRegistry {
        &self.registry
    }

    /// Configuration this watcher was built with.
    pub fn config(&self) -> &WatcherConfig {
        &self.cfg
    }

    /// Creates (without starting) a listener for every application in the store.
    ///
    /// Applications already registered, with failed lookups, or without stream
    /// identifiers are skipped. Returns how many listeners were added.
    pub async fn preload(&mut self, output: &OutputSink<F::Item>) -> Result<usize, StoreError> {
        let names = match self.store.list_application_names().await {
            Ok(names) => names,
            Err(e) => {
                self.bus.publish(
                    Event::new(EventKind::LookupFailed)
                        .with_op("list_application_names")
                        .with_reason(e.to_string()),
                );
                return Err(e);
            }
        };

        let mut added = 0;
        for name in names {
            if self.registry.contains(&name) {
                continue;
            }
            let built =
                build_listener(&*self.store, &self.factory, &name, output, &self.bus).await;
            if let Some(listener) = built {
                if self.registry.insert(listener).is_ok() {
                    added += 1;
                }
            }
        }
        Ok(added)
    }

    /// Watches the notification topic until every awaited listener has reported.
    ///
    /// Awaited listeners are the ones registered when `watch` begins plus every
    /// listener created along the way. Each is counted once, however often it is
    /// restarted or reports.
    ///
    /// # Errors
    /// - [`WatchError::Subscription`] if the topic cannot be subscribed to.
    /// - [`WatchError::StatusClosed`] if every status sender is dropped first.
    pub async fn watch(
        self,
        output: OutputSink<F::Item>,
        status: StatusChannel,
    ) -> Result<(), WatchError> {
        let Self {
            cfg,
            store,
            factory,
            registry,
            bus,
            subscribers,
            events,
        } = self;

        let forwarder = Forwarder::spawn(subscribers, events, bus.clone());
        let res = run(cfg, store, factory, registry, bus, output, status).await;
        if let Some(forwarder) = forwarder {
            forwarder.finish().await;
        }
        res
    }
}

async fn run<S, F>(
    cfg: WatcherConfig,
    store: Arc<S>,
    factory: F,
    registry: ListenerRegistry,
    bus: Bus,
    output: OutputSink<F::Item>,
    status: StatusChannel,
) -> Result<(), WatchError>
where
    S: ApplicationStore,
    F: ListenerFactory,
{
    let subscription = match store.subscribe(&cfg.topic).await {
        Ok(subscription) => subscription,
        Err(source) => {
            bus.publish(
                Event::new(EventKind::SubscriptionFailed)
                    .with_reason(format!("{}: {source}", cfg.topic)),
            );
            return Err(WatchError::Subscription {
                topic: cfg.topic,
                source,
            });
        }
    };
    bus.publish(Event::new(EventKind::Subscribed).with_reason(cfg.topic.as_str()));

    let (notifications, stop) = subscription.into_parts();
    let (status_tx, mut status_rx) = status.into_parts();
    let (admit_tx, admit_rx) = mpsc::unbounded_channel();

    let coordinator = ShutdownCoordinator::new(registry.names(), admit_rx, bus.clone());
    let notify = NotificationLoop::new(
        registry,
        store,
        factory,
        output,
        status_tx,
        admit_tx,
        bus.clone(),
        cfg.start_limit(),
    );
    // Detached: it ends with the subscription stream after stop.
    tokio::spawn(notify.run(notifications, stop.clone(), cfg.start_initial));

    let res = coordinator.wait(&mut status_rx).await;

    stop.stop();
    bus.publish(Event::new(EventKind::Unsubscribed).with_reason(cfg.topic.as_str()));
    res
}

/// Bus → [`SubscriberSet`] bridge, alive for one watch.
struct Forwarder {
    token: CancellationToken,
    join: JoinHandle<SubscriberSet>,
}

impl Forwarder {
    fn spawn(
        subscribers: Vec<Arc<dyn Subscribe>>,
        mut rx: broadcast::Receiver<Event>,
        bus: Bus,
    ) -> Option<Self> {
        if subscribers.is_empty() {
            return None;
        }
        let set = SubscriberSet::new(subscribers, bus);
        let token = CancellationToken::new();
        let stop = token.clone();

        let join = tokio::spawn(async move {
            loop {
                // Buffered events win over cancellation so nothing queued is lost.
                let ev = tokio::select! {
                    biased;
                    ev = rx.recv() => ev,
                    _ = stop.cancelled() => break,
                };
                match ev {
                    Ok(ev) => set.emit_arc(Arc::new(ev)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "event forwarder lagged behind the bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            set
        });
        Some(Self { token, join })
    }

    /// Stops forwarding once the bus is drained and flushes every subscriber.
    async fn finish(self) {
        self.token.cancel();
        if let Ok(set) = self.join.await {
            set.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{CountingFactory, seeded_store};
    use crate::listener::output_channel;

    #[tokio::test]
    async fn test_preload_registers_streamable_apps_only() {
        let store = seeded_store(&[("app1", 1), ("app2", 0), ("app3", 2)]).await;
        let factory = CountingFactory::default();
        let mut watcher = AppWatcher::new(WatcherConfig::default(), store, factory.clone());
        let (output, _rx) = output_channel::<String>(4);

        assert_eq!(watcher.preload(&output).await.unwrap(), 2);
        assert_eq!(
            watcher.registry().names(),
            vec![Arc::<str>::from("app1"), Arc::<str>::from("app3")]
        );
        // Repeating finds nothing new.
        assert_eq!(watcher.preload(&output).await.unwrap(), 0);
        assert_eq!(factory.created(), 2);
        assert_eq!(factory.starts("app1"), 0);
    }

    #[tokio::test]
    async fn test_preload_propagates_store_failure() {
        let store = seeded_store(&[("app1", 1)]).await;
        store.set_online(false);
        let mut watcher =
            AppWatcher::new(WatcherConfig::default(), store, CountingFactory::default());
        let mut events = watcher.bus().subscribe();
        let (output, _rx) = output_channel::<String>(4);

        let err = watcher.preload(&output).await.unwrap_err();
        assert_eq!(err.as_label(), "store_transport");
        let ev = events.try_recv().unwrap();
        assert_eq!(ev.kind, EventKind::LookupFailed);
        assert_eq!(ev.op, Some("list_application_names"));
    }
}
