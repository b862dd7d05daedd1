//! Fakes shared by the core unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::StoreError;
use crate::events::Event;
use crate::listener::{Listener, ListenerFactory, ListenerRef, OutputSink, StatusSink};
use crate::store::{
    ApplicationRecord, ApplicationStore, DEFAULT_IDENTIFIER_KEY, MemoryStore, StreamIdentifiers,
    Subscription, UserRecord,
};

/// Listener that only counts its starts; hanging listeners never return from `start`.
struct CountingListener {
    name: String,
    hang: bool,
    starts: Arc<Mutex<HashMap<String, usize>>>,
}

#[async_trait]
impl Listener for CountingListener {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, _status: StatusSink) {
        *self
            .starts
            .lock()
            .unwrap()
            .entry(self.name.clone())
            .or_default() += 1;
        if self.hang {
            std::future::pending::<()>().await;
        }
    }
}

#[derive(Clone, Default)]
pub(crate) struct CountingFactory {
    created: Arc<AtomicUsize>,
    starts: Arc<Mutex<HashMap<String, usize>>>,
    hanging: HashSet<String>,
    renamed: HashMap<String, String>,
}

impl CountingFactory {
    pub(crate) fn hanging(mut self, name: &str) -> Self {
        self.hanging.insert(name.to_string());
        self
    }

    /// Listeners built for `app` come out named `to`.
    pub(crate) fn renaming(mut self, app: &str, to: &str) -> Self {
        self.renamed.insert(app.to_string(), to.to_string());
        self
    }

    pub(crate) fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub(crate) fn starts(&self, name: &str) -> usize {
        self.starts.lock().unwrap().get(name).copied().unwrap_or(0)
    }
}

impl ListenerFactory for CountingFactory {
    type Item = String;

    fn create(
        &self,
        app: ApplicationRecord,
        _identifiers: StreamIdentifiers,
        _output: OutputSink<String>,
    ) -> ListenerRef {
        self.created.fetch_add(1, Ordering::SeqCst);
        let name = self.renamed.get(&app.name).cloned().unwrap_or(app.name);
        Arc::new(CountingListener {
            hang: self.hanging.contains(&name),
            name,
            starts: Arc::clone(&self.starts),
        })
    }
}

/// Wraps a [`MemoryStore`]; identifier listing fails while `failing` is set.
pub(crate) struct FlakyIdentifiers {
    pub(crate) inner: Arc<MemoryStore>,
    pub(crate) failing: AtomicBool,
}

impl FlakyIdentifiers {
    pub(crate) fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl ApplicationStore for FlakyIdentifiers {
    async fn subscribe(&self, topic: &str) -> Result<Subscription, StoreError> {
        self.inner.subscribe(topic).await
    }

    async fn get_application(&self, name: &str) -> Result<ApplicationRecord, StoreError> {
        self.inner.get_application(name).await
    }

    async fn list_stream_identifiers(&self, name: &str) -> Result<StreamIdentifiers, StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::transport("members read timed out"));
        }
        self.inner.list_stream_identifiers(name).await
    }

    async fn list_application_names(&self) -> Result<Vec<String>, StoreError> {
        self.inner.list_application_names().await
    }
}

/// Store holding `apps`, each with `n` streamable users named `<app>-u<i>`.
pub(crate) async fn seeded_store(apps: &[(&str, usize)]) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for &(name, n) in apps {
        store
            .put_application(&ApplicationRecord::new(name))
            .await
            .unwrap();
        for i in 0..n {
            add_identifier(&store, name, &format!("{name}-u{i}")).await;
        }
    }
    store
}

pub(crate) async fn add_identifier(store: &MemoryStore, app: &str, username: &str) {
    let id = format!("id:{app}:{username}");
    store.add_member(app, &id).await;
    store
        .put_user(
            &id,
            &UserRecord::new(username).with_metadata(DEFAULT_IDENTIFIER_KEY, username),
        )
        .await
        .unwrap();
}

/// Collects every event already buffered on `rx`.
pub(crate) fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}
