//! # Conveyor
//!
//! An extensible content-archiving pipeline core.
//!
//! Conveyor ingests content from an external source, runs it through a
//! configurable sequence of processing stages, and lets third-party
//! plugins extend both the stages and the handlers those stages use,
//! without recompiling the host:
//!
//! - **Stage-based execution**: ordered stages with a declared failure
//!   policy, driven by a re-entrancy-guarded executor
//! - **Plugin runtime**: discovery, validation, dependency-ordered
//!   loading, capability sandboxing, conflict detection, and hot-reload
//! - **Event-driven observability**: lifecycle events for runs and
//!   plugins through injectable sinks
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use conveyor::prelude::*;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(PluginRegistry::new());
//! let manager = PluginManager::new(registry.clone())
//!     .with_plugin_dirs(vec!["plugins".into()]);
//! manager.load_all(manager.discover_plugins().candidates)?;
//!
//! let mut executor = PipelineExecutor::new()
//!     .with_error_handling(ErrorHandling::Halt);
//! executor.add_stage(Arc::new(AcquisitionStage::new(registry.clone())));
//!
//! let ctx = PipelineContext::new();
//! let metrics = executor.execute(&ctx).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod concurrency;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod plugins;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::context::PipelineContext;
    pub use crate::core::{ExecutionMetrics, PipelineResult};
    pub use crate::errors::{
        ConveyorError, DependencyCycleError, ExecutorError, PluginError, PluginValidationError,
        RegistryError, SandboxViolation,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{ErrorHandling, PipelineExecutor};
    pub use crate::plugins::{
        Capability, ComponentCategory, Conflict, ContentHandler, Exporter, HostEnv, ItemFilter,
        PluginCandidate, PluginComponent, PluginManager, PluginManifest, PluginModule,
        PluginRegistry, Scraper,
    };
    pub use crate::stages::PipelineStage;
}
