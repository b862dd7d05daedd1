//! # Subscriber contract.
//!
//! Each [`Subscribe`] implementation is driven by its own worker task, fed by a
//! bounded queue owned by the [`SubscriberSet`](crate::SubscriberSet).
//!
//! ## Rules
//! - A slow subscriber only fills its own queue; the watcher never waits on it.
//! - When the queue is full the event is dropped for that subscriber and a
//!   `SubscriberOverflow` event is published.
//! - A panic inside `on_event` is caught and published as `SubscriberPanicked`;
//!   the worker carries on with the next event.

use async_trait::async_trait;

use crate::events::Event;

/// Sink for diagnostic events.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event, in publication order for this subscriber.
    async fn on_event(&self, event: &Event);

    /// Name used in overflow and panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred queue capacity (clamped to at least 1).
    fn queue_capacity(&self) -> usize {
        1024
    }
}
