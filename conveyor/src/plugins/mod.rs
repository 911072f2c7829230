//! The plugin subsystem.
//!
//! This module provides:
//! - The four component contracts plugins implement
//! - Discovery of candidates from plugin directories
//! - Validation, dependency-ordered loading, and capability sandboxing
//! - The registry of contributed components
//! - Conflict detection and hot-reload

pub mod conflicts;
pub mod deps;
pub mod discovery;
pub mod manager;
pub mod manifest;
pub mod registry;
#[cfg(feature = "hot-reload")]
pub mod reload;
pub mod sandbox;
pub mod traits;
pub mod validation;

pub use conflicts::{detect_conflicts, Conflict};
pub use deps::sort_by_dependencies;
pub use discovery::{
    discover_plugins, DiscoveryOutcome, PluginCandidate, PluginSourceKind, MANIFEST_FILE,
    SINGLE_FILE_SUFFIX,
};
pub use manager::{LoadReport, PluginManager, PluginMetadata, PluginStatus};
pub use manifest::{ComponentCategory, EntryPoint, PluginInfo, PluginManifest};
pub use registry::{
    CategoryCounts, ComponentEntry, ContentHandlerEntry, ExporterEntry, FilterEntry,
    PluginRegistry, ScraperEntry,
};
#[cfg(feature = "hot-reload")]
pub use reload::{HotReloadWatcher, ReloadEvent, ReloadEventType};
pub use sandbox::{Capability, CapabilityToken, HostEnv};
pub use traits::{
    ContentHandler, Exporter, FormatInfo, ItemFilter, PluginComponent, PluginModule, Scraper,
};
pub use validation::validate_candidate;
