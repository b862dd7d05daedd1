//! # Watcher configuration.
//!
//! Provides [`WatcherConfig`] centralized settings for [`AppWatcher`](crate::AppWatcher).
//!
//! The same struct sizes the channels callers create for `watch`:
//! [`StatusChannel::new(cfg.status_capacity)`](crate::StatusChannel::new) and
//! [`output_channel(cfg.output_capacity)`](crate::output_channel).
//!
//! ## Sentinel values
//! - `start_timeout = 0s` → no timeout around `Listener::start`
//! - capacities of `0` are clamped to 1

use std::time::Duration;

use serde::Deserialize;

/// Global configuration for the watcher.
///
/// Defines:
/// - **Subscription**: notification topic name
/// - **Event system**: diagnostic bus capacity
/// - **Channels**: status and output sink sizes
/// - **Listener starts**: optional start timeout, starting initial listeners
///
/// Deserializable from any serde format; missing fields take their defaults.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Notification topic carrying application names.
    pub topic: String,

    /// Capacity of the diagnostic event bus ring buffer.
    ///
    /// Subscribers lagging more than `bus_capacity` events skip older ones.
    pub bus_capacity: usize,

    /// Capacity of the status channel (many listeners, one coordinator).
    pub status_capacity: usize,

    /// Capacity of the output channel listeners push results onto.
    pub output_capacity: usize,

    /// Upper bound on a single `Listener::start` call.
    ///
    /// - `Duration::ZERO` = wait for `start` however long it takes
    /// - `> 0` = give up on that start, publish `StartTimedOut`, move to the next event
    pub start_timeout: Duration,

    /// Start every initial listener before the first notification is consumed.
    pub start_initial: bool,
}

impl WatcherConfig {
    /// Creates the default configuration for `topic`.
    pub fn for_topic(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Self::default()
        }
    }

    /// Returns the start timeout as an `Option`.
    ///
    /// - `None` → no timeout
    /// - `Some(d)` → timeout applied per start
    #[inline]
    pub fn start_limit(&self) -> Option<Duration> {
        if self.start_timeout == Duration::ZERO {
            None
        } else {
            Some(self.start_timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for WatcherConfig {
    /// Default configuration:
    ///
    /// - `topic = "apps"`
    /// - `bus_capacity = 1024`
    /// - `status_capacity = 64`
    /// - `output_capacity = 1024`
    /// - `start_timeout = 0s` (no timeout)
    /// - `start_initial = false`
    fn default() -> Self {
        Self {
            topic: "apps".to_string(),
            bus_capacity: 1024,
            status_capacity: 64,
            output_capacity: 1024,
            start_timeout: Duration::ZERO,
            start_initial: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_timeout_is_disabled() {
        let mut cfg = WatcherConfig::default();
        assert_eq!(cfg.start_limit(), None);
        cfg.start_timeout = Duration::from_millis(250);
        assert_eq!(cfg.start_limit(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let cfg: WatcherConfig =
            serde_json::from_str(r#"{"topic":"tenants","start_initial":true}"#).unwrap();
        assert_eq!(cfg.topic, "tenants");
        assert!(cfg.start_initial);
        assert_eq!(cfg.bus_capacity, 1024);
        assert_eq!(cfg.start_limit(), None);
    }
}
