//! # Listener registry - one listener per application name.
//!
//! The registry is the watcher's in-memory set of known listeners. It is owned by
//! exactly one task at a time (the builder, then the notification loop), so it
//! needs no lock.
//!
//! ## Resolve-or-create
//! ```text
//! name ──► registry.get(name) ── hit ──► existing listener
//!                               └ miss ─► build_listener():
//!                                           ├─► store.get_application(name)          ─ err ─► LookupFailed
//!                                           ├─► store.list_stream_identifiers(name)  ─ err ─► LookupFailed
//!                                           ├─► identifiers empty                    ───────► EmptyStreamSet
//!                                           └─► factory.create(app, ids, output)     ───────► ListenerCreated
//! ```
//!
//! ## Rules
//! - Names are unique: `insert` refuses a second listener with the same name.
//! - Listeners are never removed; a known listener is only ever restarted.
//! - A failed or empty lookup leaves the registry untouched, so the next
//!   notification for that name tries again.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::StoreError;
use crate::events::{Bus, Event, EventKind};
use crate::listener::{ListenerFactory, ListenerRef, OutputSink};
use crate::store::ApplicationStore;

/// Keyed set of listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: HashMap<Arc<str>, ListenerRef>,
}

impl ListenerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` under its name.
    ///
    /// Returns the listener back if the name is already taken.
    pub fn insert(&mut self, listener: ListenerRef) -> Result<(), ListenerRef> {
        if self.listeners.contains_key(listener.name()) {
            return Err(listener);
        }
        self.listeners.insert(Arc::from(listener.name()), listener);
        Ok(())
    }

    /// Returns the listener registered under `name` (exact match).
    pub fn get(&self, name: &str) -> Option<ListenerRef> {
        self.listeners.get(name).cloned()
    }

    /// True if a listener is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.listeners.contains_key(name)
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Returns sorted list of registered names.
    pub fn names(&self) -> Vec<Arc<str>> {
        let mut names: Vec<Arc<str>> = self.listeners.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Iterates over registered listeners in no particular order.
    pub fn listeners(&self) -> impl Iterator<Item = &ListenerRef> {
        self.listeners.values()
    }
}

/// Looks `name` up in the store and builds a listener for it.
///
/// The notification name is authoritative: the record is renamed to `name`, and a
/// listener the factory names differently is rejected. Returns `None` (after
/// publishing why) when the lookup fails, the application has no stream
/// identifiers, or the listener name does not match.
pub(crate) async fn build_listener<S, F>(
    store: &S,
    factory: &F,
    name: &str,
    output: &OutputSink<F::Item>,
    bus: &Bus,
) -> Option<ListenerRef>
where
    S: ApplicationStore + ?Sized,
    F: ListenerFactory,
{
    let mut app = match store.get_application(name).await {
        Ok(app) => app,
        Err(e) => {
            publish_lookup_failed(bus, name, "get_application", &e);
            return None;
        }
    };

    if app.name != name {
        tracing::warn!(
            app = name,
            record = %app.name,
            "record name differs from its key, using the key"
        );
        app.name = name.to_string();
    }

    let identifiers = match store.list_stream_identifiers(name).await {
        Ok(ids) => ids,
        Err(e) => {
            publish_lookup_failed(bus, name, "list_stream_identifiers", &e);
            return None;
        }
    };

    if identifiers.is_empty() {
        bus.publish(Event::new(EventKind::EmptyStreamSet).with_app(name));
        return None;
    }

    let count = identifiers.len();
    let listener = factory.create(app, identifiers, output.clone());
    if listener.name() != name {
        bus.publish(
            Event::new(EventKind::LookupFailed)
                .with_app(name)
                .with_op("create_listener")
                .with_reason(format!("factory named the listener {:?}", listener.name())),
        );
        return None;
    }
    bus.publish(
        Event::new(EventKind::ListenerCreated)
            .with_app(name)
            .with_reason(format!("identifiers={count}")),
    );
    Some(listener)
}

fn publish_lookup_failed(bus: &Bus, name: &str, op: &'static str, err: &StoreError) {
    bus.publish(
        Event::new(EventKind::LookupFailed)
            .with_app(name)
            .with_op(op)
            .with_reason(err.to_string()),
    );
}
