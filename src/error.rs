//! Error types used by the watcher, the store contract, and listener runs.
//!
//! This module defines three error enums:
//!
//! - [`WatchError`]: errors returned by [`AppWatcher::watch`](crate::AppWatcher::watch) itself.
//! - [`StoreError`]: failures of the application store (subscribe, lookups, transport).
//! - [`ListenerError`]: outcome of a single listener run, mapped to a status code.
//!
//! All types provide `as_label` for logging/metrics. Only [`WatchError`] ever reaches
//! the caller; [`StoreError`]s raised while handling notifications are recovered
//! locally and surface as diagnostic events.

use thiserror::Error;

/// # Errors returned by the watcher.
///
/// These represent failures to begin or to complete a coordinated watch.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WatchError {
    /// The notification subscription could not be established; no listener was started.
    #[error("failed to subscribe to topic {topic:?}: {source}")]
    Subscription {
        /// Topic the watcher tried to subscribe to.
        topic: String,
        /// Underlying store failure.
        #[source]
        source: StoreError,
    },

    /// Every status sender was dropped while listeners were still outstanding.
    #[error("status channel closed with {outstanding} listener(s) outstanding")]
    StatusClosed {
        /// Number of awaited listeners that never reported.
        outstanding: usize,
    },
}

impl WatchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use appwatch::WatchError;
    ///
    /// let err = WatchError::StatusClosed { outstanding: 2 };
    /// assert_eq!(err.as_label(), "watch_status_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            WatchError::Subscription { .. } => "watch_subscription_failed",
            WatchError::StatusClosed { .. } => "watch_status_closed",
        }
    }
}

/// # Errors produced by an [`ApplicationStore`](crate::ApplicationStore).
///
/// `Clone` so the same failure can be fanned out through notifications and events.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No application record exists under the given name.
    #[error("application {name:?} not found")]
    NotFound {
        /// Requested application name.
        name: String,
    },

    /// The backend could not be reached or the transport failed mid-operation.
    #[error("transport error: {error}")]
    Transport {
        /// The underlying error message.
        error: String,
    },

    /// A stored record could not be decoded.
    #[error("failed to decode record {key:?}: {error}")]
    Decode {
        /// Storage key of the offending record.
        key: String,
        /// The underlying decoder message.
        error: String,
    },
}

impl StoreError {
    /// Shorthand for a [`StoreError::Transport`] with the given message.
    pub fn transport(error: impl Into<String>) -> Self {
        StoreError::Transport {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "store_not_found",
            StoreError::Transport { .. } => "store_transport",
            StoreError::Decode { .. } => "store_decode",
        }
    }
}

/// # Outcome of a failed listener run.
///
/// Returned by a [`Source`](crate::Source) and converted to the status code carried
/// by the run's [`StatusReport`](crate::StatusReport).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ListenerError {
    /// The run failed; a later restart may succeed.
    #[error("stream failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Non-recoverable failure (bad credentials, revoked access, ...).
    #[error("fatal stream error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// The run observed its cancellation token (restart or shutdown).
    #[error("stream cancelled")]
    Canceled,
}

impl ListenerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use appwatch::ListenerError;
    ///
    /// let err = ListenerError::Fail { error: "reset".into() };
    /// assert_eq!(err.as_label(), "listener_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ListenerError::Fail { .. } => "listener_failed",
            ListenerError::Fatal { .. } => "listener_fatal",
            ListenerError::Canceled => "listener_canceled",
        }
    }

    /// Status code reported when a run ends with this error.
    ///
    /// Cancellation is a graceful stop and reports the same code as success.
    pub fn status_code(&self) -> i32 {
        match self {
            ListenerError::Fail { .. } => crate::listener::STATUS_FAILED,
            ListenerError::Fatal { .. } => crate::listener::STATUS_FATAL,
            ListenerError::Canceled => crate::listener::STATUS_OK,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_error_keeps_source() {
        let err = WatchError::Subscription {
            topic: "apps".into(),
            source: StoreError::transport("connection refused"),
        };
        assert_eq!(err.as_label(), "watch_subscription_failed");
        assert_eq!(
            err.to_string(),
            "failed to subscribe to topic \"apps\": transport error: connection refused"
        );
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("transport error: connection refused"));
    }

    #[test]
    fn test_canceled_reports_ok() {
        assert_eq!(ListenerError::Canceled.status_code(), 0);
        assert_eq!(ListenerError::Fail { error: "x".into() }.status_code(), 1);
        assert_eq!(ListenerError::Fatal { error: "x".into() }.status_code(), 2);
    }
}
