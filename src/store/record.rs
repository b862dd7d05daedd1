//! Read-only records served by an application store.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreError;

/// One application: a name plus whatever configuration its listener needs.
///
/// Configuration is kept opaque; extra JSON fields are flattened into `settings`.
///
/// # Example
/// ```
/// use appwatch::ApplicationRecord;
///
/// let app = ApplicationRecord::from_json("app1", r#"{"name":"app1","token":"t0k"}"#).unwrap();
/// assert_eq!(app.name, "app1");
/// assert_eq!(app.setting("token").and_then(|v| v.as_str()), Some("t0k"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    /// Application name (registry key of its listener).
    #[serde(default)]
    pub name: String,
    /// Opaque configuration fields.
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

impl ApplicationRecord {
    /// Creates a record with no settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings: Map::new(),
        }
    }

    /// Adds one setting.
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Returns a setting by key.
    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }

    /// Decodes a record stored under `key`; the record's `name` is always `key`.
    pub fn from_json(key: &str, json: &str) -> Result<Self, StoreError> {
        let mut app: ApplicationRecord =
            serde_json::from_str(json).map_err(|e| StoreError::Decode {
                key: key.to_string(),
                error: e.to_string(),
            })?;
        if app.name != key {
            app.name = key.to_string();
        }
        Ok(app)
    }

    /// Encodes the record as stored by [`MemoryStore`](crate::MemoryStore).
    pub fn to_json(&self) -> Result<String, StoreError> {
        serde_json::to_string(self).map_err(|e| StoreError::Decode {
            key: self.name.clone(),
            error: e.to_string(),
        })
    }
}

/// Ordered external-stream identifiers (account handles) of one application.
///
/// May be empty; the watcher never creates a listener for an empty set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamIdentifiers(Vec<String>);

impl StreamIdentifiers {
    /// Wraps an ordered list of identifiers.
    pub fn new(ids: Vec<String>) -> Self {
        Self(ids)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<Vec<String>> for StreamIdentifiers {
    fn from(ids: Vec<String>) -> Self {
        Self(ids)
    }
}

impl FromIterator<String> for StreamIdentifiers {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a StreamIdentifiers {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Member of an application, as stored by [`MemoryStore`](crate::MemoryStore).
///
/// A user contributes its `username` as a stream identifier only when its metadata
/// carries the store's identifier key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Becomes the stream identifier.
    pub username: String,
    /// Free-form attributes; `None` when the record has none.
    #[serde(default)]
    pub metadata: Option<HashMap<String, Value>>,
}

impl UserRecord {
    /// Creates a user with no metadata.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            metadata: None,
        }
    }

    /// Adds one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_name_defaults_to_key() {
        let app = ApplicationRecord::from_json("app2", r#"{"region":"eu"}"#).unwrap();
        assert_eq!(app.name, "app2");
        assert_eq!(app.setting("region"), Some(&Value::from("eu")));
    }

    #[test]
    fn test_stored_name_is_overridden_by_key() {
        let app = ApplicationRecord::from_json("app1", r#"{"name":"other","lang":"en"}"#).unwrap();
        assert_eq!(app.name, "app1");
        assert_eq!(app.setting("lang"), Some(&Value::from("en")));
    }

    #[test]
    fn test_invalid_json_is_decode_error() {
        let err = ApplicationRecord::from_json("app3", "{not json").unwrap_err();
        assert_eq!(err.as_label(), "store_decode");
    }

    #[test]
    fn test_settings_survive_encoding() {
        let app = ApplicationRecord::new("app1").with_setting("lang", "en");
        let back = ApplicationRecord::from_json("app1", &app.to_json().unwrap()).unwrap();
        assert_eq!(back, app);
    }
}
