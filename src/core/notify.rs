//! # Notification loop: one event at a time, in arrival order.
//!
//! The loop runs as a single task that exclusively owns the [`ListenerRegistry`].
//! All listener creation and every `start`/restart happen here, serialized.
//!
//! ## Per event
//! ```text
//! Notification::Error(e) ──► publish NotificationFailed, next event
//! Notification::App(name)
//!   ├─► registry.get(name) ── hit ─────────────────────────────┐
//!   └─► miss ─► build_listener() ── None ─► next event         │
//!                 └─ Some(l) ─► registry.insert(l)             │
//!                               admit(name) to coordinator     │
//!                                                              ▼
//!                               publish ListenerRestarting, listener.start(status)
//!                               (optionally bounded by start timeout)
//! ```
//!
//! ## Rules
//! - Events are never reordered, batched, or handled concurrently.
//! - Repeated names coalesce onto one listener; every occurrence triggers a restart.
//! - A new listener is admitted to the shutdown coordinator **before** it starts,
//!   so its status report can never be consumed ahead of its admission.
//! - The loop ends when the subscription stream ends or stop is signaled.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time;

use crate::core::registry::{ListenerRegistry, build_listener};
use crate::events::{Bus, Event, EventKind};
use crate::listener::{ListenerFactory, ListenerRef, OutputSink, StatusSink};
use crate::store::{ApplicationStore, Notification, StopHandle};

pub(crate) struct NotificationLoop<S, F: ListenerFactory> {
    pub(crate) registry: ListenerRegistry,
    store: Arc<S>,
    factory: F,
    output: OutputSink<F::Item>,
    status: StatusSink,
    admissions: mpsc::UnboundedSender<Arc<str>>,
    bus: Bus,
    start_limit: Option<Duration>,
}

impl<S, F> NotificationLoop<S, F>
where
    S: ApplicationStore,
    F: ListenerFactory,
{
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        registry: ListenerRegistry,
        store: Arc<S>,
        factory: F,
        output: OutputSink<F::Item>,
        status: StatusSink,
        admissions: mpsc::UnboundedSender<Arc<str>>,
        bus: Bus,
        start_limit: Option<Duration>,
    ) -> Self {
        Self {
            registry,
            store,
            factory,
            output,
            status,
            admissions,
            bus,
            start_limit,
        }
    }

    /// Drives the loop until the stream ends or `stop` fires; returns the registry.
    pub(crate) async fn run(
        mut self,
        mut events: mpsc::Receiver<Notification>,
        stop: StopHandle,
        start_initial: bool,
    ) -> ListenerRegistry {
        if start_initial {
            let initial: Vec<ListenerRef> = self.registry.listeners().cloned().collect();
            for listener in initial {
                self.restart(&listener).await;
            }
        }

        loop {
            let event = tokio::select! {
                biased;
                _ = stop.stopped() => break,
                ev = events.recv() => match ev {
                    Some(ev) => ev,
                    None => break,
                },
            };
            self.handle(event).await;
        }
        self.registry
    }

    /// Handles one notification.
    pub(crate) async fn handle(&mut self, event: Notification) {
        let name = match event {
            Notification::App(name) => name,
            Notification::Error(err) => {
                let reason = err.to_string();
                self.bus.publish(Event::new(EventKind::NotificationFailed).with_reason(reason));
                return;
            }
        };

        let listener = match self.registry.get(&name) {
            Some(existing) => existing,
            None => match self.register(&name).await {
                Some(created) => created,
                None => return,
            },
        };
        self.restart(&listener).await;
    }

    async fn register(&mut self, name: &str) -> Option<ListenerRef> {
        let listener =
            build_listener(&*self.store, &self.factory, name, &self.output, &self.bus).await?;

        match self.registry.insert(Arc::clone(&listener)) {
            Ok(()) => {
                // The coordinator outlives the loop unless watch already returned.
                let _ = self.admissions.send(Arc::from(listener.name()));
                Some(listener)
            }
            // Factory picked a name that is already registered; keep the registered one.
            Err(dup) => self.registry.get(dup.name()),
        }
    }

    async fn restart(&self, listener: &ListenerRef) {
        self.bus
            .publish(Event::new(EventKind::ListenerRestarting).with_app(listener.name()));

        let start = listener.start(self.status.clone());
        match self.start_limit {
            None => start.await,
            Some(limit) => {
                if time::timeout(limit, start).await.is_err() {
                    self.bus.publish(
                        Event::new(EventKind::StartTimedOut)
                            .with_app(listener.name())
                            .with_reason(format!("{limit:?}")),
                    );
                }
            }
        }
    }
}
