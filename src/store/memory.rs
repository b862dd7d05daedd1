//! # In-memory application store.
//!
//! [`MemoryStore`] keeps the layout of the key/value backend the watcher was first
//! deployed against:
//!
//! ```text
//! apps:     <name>             → JSON ApplicationRecord
//! members:  customer:<name>    → set of user ids
//! users:    <user id>          → JSON UserRecord { username, metadata }
//! topics:   <topic>            → broadcast channel of Notification
//! ```
//!
//! ## Identifier resolution
//! `list_stream_identifiers(name)` walks the member set of `name` in insertion order
//! and keeps the `username` of every user whose metadata carries the identifier key.
//! Users that are missing, malformed, or have no metadata are skipped with a warning.
//!
//! ## Pub/sub
//! Each subscription gets its own forwarder task bridging the topic's broadcast
//! channel into a bounded mpsc queue. A subscriber that falls behind receives a
//! [`Notification::Error`] describing how many messages it lost.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{RwLock, broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::error::StoreError;
use crate::store::{
    ApplicationRecord, ApplicationStore, Notification, StopHandle, StreamIdentifiers,
    Subscription, UserRecord,
};

/// Metadata key marking a user as a streamable account.
pub const DEFAULT_IDENTIFIER_KEY: &str = "stream.screen_name";

#[derive(Default)]
struct Tables {
    apps: HashMap<String, String>,
    members: HashMap<String, Vec<String>>,
    users: HashMap<String, String>,
}

/// Shared in-process store with topic pub/sub.
pub struct MemoryStore {
    tables: RwLock<Tables>,
    topics: RwLock<HashMap<String, broadcast::Sender<Notification>>>,
    online: AtomicBool,
    identifier_key: String,
    capacity: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty, online store.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            topics: RwLock::new(HashMap::new()),
            online: AtomicBool::new(true),
            identifier_key: DEFAULT_IDENTIFIER_KEY.to_string(),
            capacity: 256,
        }
    }

    /// Overrides the metadata key that marks a user as streamable.
    pub fn with_identifier_key(mut self, key: impl Into<String>) -> Self {
        self.identifier_key = key.into();
        self
    }

    /// Overrides the per-topic and per-subscription buffer size (min 1).
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Simulates the backend going away (`false`) or coming back (`true`).
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::transport("store unreachable"))
        }
    }

    /// Stores (or replaces) an application record.
    pub async fn put_application(&self, app: &ApplicationRecord) -> Result<(), StoreError> {
        let json = app.to_json()?;
        self.put_raw_application(&app.name, json).await;
        Ok(())
    }

    /// Stores a raw JSON value under an application name.
    pub async fn put_raw_application(&self, name: &str, json: impl Into<String>) {
        self.tables
            .write()
            .await
            .apps
            .insert(name.to_string(), json.into());
    }

    /// Adds `user_id` to the member set of `app` (set semantics).
    pub async fn add_member(&self, app: &str, user_id: &str) {
        let mut tables = self.tables.write().await;
        let members = tables.members.entry(app.to_string()).or_default();
        if !members.iter().any(|m| m == user_id) {
            members.push(user_id.to_string());
        }
    }

    /// Stores (or replaces) a user record.
    pub async fn put_user(&self, user_id: &str, user: &UserRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(user).map_err(|e| StoreError::Decode {
            key: user_id.to_string(),
            error: e.to_string(),
        })?;
        self.put_raw_user(user_id, json).await;
        Ok(())
    }

    /// Stores a raw JSON value under a user id.
    pub async fn put_raw_user(&self, user_id: &str, json: impl Into<String>) {
        self.tables
            .write()
            .await
            .users
            .insert(user_id.to_string(), json.into());
    }

    /// Publishes an application name; returns how many subscriptions received it.
    pub async fn publish(&self, topic: &str, app: impl Into<String>) -> usize {
        self.send(topic, Notification::App(app.into())).await
    }

    /// Publishes a transport error onto `topic`.
    pub async fn publish_error(&self, topic: &str, err: StoreError) -> usize {
        self.send(topic, Notification::Error(err)).await
    }

    async fn send(&self, topic: &str, msg: Notification) -> usize {
        match self.topics.read().await.get(topic) {
            Some(tx) => tx.send(msg).unwrap_or(0),
            None => 0,
        }
    }

    async fn topic(&self, topic: &str) -> broadcast::Sender<Notification> {
        let mut topics = self.topics.write().await;
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    fn identifier_of(&self, app: &str, user_id: &str, json: Option<&String>) -> Option<String> {
        let Some(json) = json else {
            tracing::warn!(app, user = user_id, "skipping member: user record missing");
            return None;
        };
        let user: UserRecord = match serde_json::from_str(json) {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!(
                    app,
                    user = user_id,
                    error = %e,
                    "skipping member: malformed user record"
                );
                return None;
            }
        };
        let Some(metadata) = user.metadata else {
            tracing::warn!(app, user = user_id, "skipping member: no metadata");
            return None;
        };
        metadata
            .contains_key(&self.identifier_key)
            .then_some(user.username)
    }
}

/// Forwards one notification unless the subscription was stopped first.
async fn forward(
    tx: &mpsc::Sender<Notification>,
    token: &CancellationToken,
    msg: Notification,
) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        res = tx.send(msg) => res.is_ok(),
    }
}

#[async_trait]
impl ApplicationStore for MemoryStore {
    async fn subscribe(&self, topic: &str) -> Result<Subscription, StoreError> {
        self.ensure_online()?;

        let mut rx = self.topic(topic).await.subscribe();
        let (tx, events) = mpsc::channel(self.capacity);
        let token = CancellationToken::new();
        let stop = token.clone();

        tokio::spawn(async move {
            loop {
                let msg = tokio::select! {
                    _ = token.cancelled() => break,
                    msg = rx.recv() => msg,
                };
                let msg = match msg {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(n)) => Notification::Error(
                        StoreError::transport(format!("subscription lagged, {n} message(s) lost")),
                    ),
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if !forward(&tx, &token, msg).await {
                    break;
                }
            }
        });

        Ok(Subscription::new(events, StopHandle::new(stop)))
    }

    async fn get_application(&self, name: &str) -> Result<ApplicationRecord, StoreError> {
        self.ensure_online()?;
        let tables = self.tables.read().await;
        let json = tables.apps.get(name).ok_or_else(|| StoreError::NotFound {
            name: name.to_string(),
        })?;
        ApplicationRecord::from_json(name, json)
    }

    async fn list_stream_identifiers(&self, name: &str) -> Result<StreamIdentifiers, StoreError> {
        self.ensure_online()?;
        let tables = self.tables.read().await;
        let Some(members) = tables.members.get(name) else {
            return Ok(StreamIdentifiers::default());
        };
        Ok(members
            .iter()
            .filter_map(|id| self.identifier_of(name, id, tables.users.get(id)))
            .collect())
    }

    async fn list_application_names(&self) -> Result<Vec<String>, StoreError> {
        self.ensure_online()?;
        let mut names: Vec<String> = self.tables.read().await.apps.keys().cloned().collect();
        names.sort_unstable();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn seed_user(store: &MemoryStore, app: &str, id: &str, user: UserRecord) {
        store.add_member(app, id).await;
        store.put_user(id, &user).await.unwrap();
    }

    #[tokio::test]
    async fn test_identifiers_require_metadata_key() {
        let store = MemoryStore::new();
        seed_user(
            &store,
            "app1",
            "id:1",
            UserRecord::new("u1").with_metadata(DEFAULT_IDENTIFIER_KEY, "U1"),
        )
        .await;
        seed_user(&store, "app1", "id:2", UserRecord::new("u2").with_metadata("other", 1)).await;
        seed_user(&store, "app1", "id:3", UserRecord::new("u3")).await;
        store.add_member("app1", "id:4").await;
        store.add_member("app1", "id:5").await;
        store.put_raw_user("id:5", "{broken").await;
        seed_user(
            &store,
            "app1",
            "id:6",
            UserRecord::new("u6").with_metadata(DEFAULT_IDENTIFIER_KEY, "U6"),
        )
        .await;

        let ids = store.list_stream_identifiers("app1").await.unwrap();
        assert_eq!(ids.as_slice(), ["u1".to_string(), "u6".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_app_has_no_identifiers() {
        let store = MemoryStore::new();
        let ids = store.list_stream_identifiers("ghost").await.unwrap();
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn test_missing_and_malformed_applications() {
        let store = MemoryStore::new();
        store.put_raw_application("bad", "[1,2").await;

        let missing = store.get_application("ghost").await.unwrap_err();
        assert_eq!(missing, StoreError::NotFound { name: "ghost".into() });
        let bad = store.get_application("bad").await.unwrap_err();
        assert_eq!(bad.as_label(), "store_decode");
    }

    #[tokio::test]
    async fn test_offline_store_fails_every_operation() {
        let store = MemoryStore::new();
        store.set_online(false);

        assert!(matches!(store.subscribe("apps").await, Err(StoreError::Transport { .. })));
        assert!(matches!(store.get_application("a").await, Err(StoreError::Transport { .. })));
        assert!(matches!(
            store.list_stream_identifiers("a").await,
            Err(StoreError::Transport { .. })
        ));
        assert!(matches!(
            store.list_application_names().await,
            Err(StoreError::Transport { .. })
        ));
    }

    #[tokio::test]
    async fn test_subscription_delivers_until_stopped() {
        let store = MemoryStore::new();
        let (mut events, stop) = store.subscribe("apps").await.unwrap().into_parts();

        assert_eq!(store.publish("apps", "app1").await, 1);
        assert_eq!(store.publish("other", "app2").await, 0);
        store
            .publish_error("apps", StoreError::transport("connection reset"))
            .await;

        let first = timeout(Duration::from_secs(1), events.recv()).await.unwrap();
        assert_eq!(first, Some(Notification::App("app1".into())));
        let second = timeout(Duration::from_secs(1), events.recv()).await.unwrap();
        assert_eq!(
            second,
            Some(Notification::Error(StoreError::transport("connection reset")))
        );

        stop.stop();
        let end = timeout(Duration::from_secs(1), events.recv()).await.unwrap();
        assert_eq!(end, None);
    }
}
