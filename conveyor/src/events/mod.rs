//! Event sink system for observability.
//!
//! The executor and the plugin manager emit lifecycle events
//! (`stage.started`, `stage.failed`, `plugin.loaded`, ...) through an
//! [`EventSink`] so hosts can observe runs without parsing logs. Sinks are
//! constructor-injected into the context and the manager; there is no
//! process-global sink, so tests can observe events in isolation.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
