//! # Listener abstractions.
//!
//! This module provides the listener-related types:
//! - [`Listener`] - trait for restartable per-application streaming units
//! - [`ListenerRef`] - shared reference to a listener (`Arc<dyn Listener>`)
//! - [`ListenerFactory`] - builds a listener the first time an application is seen
//! - [`StatusReport`], [`StatusSink`], [`StatusChannel`] - termination reporting
//! - [`StreamListener`] - ready-made listener driving a [`Source`] (closure or trait impl)

mod listener;
mod stream;

pub use listener::{
    Listener, ListenerFactory, ListenerRef, OutputSink, STATUS_FAILED, STATUS_FATAL, STATUS_OK,
    STATUS_PANICKED, StatusChannel, StatusReport, StatusSink, output_channel,
};
pub use stream::{
    BoxStreamFuture, ListenerState, RunContext, Source, SourceFn, StreamListener,
    StreamListenerFactory,
};
