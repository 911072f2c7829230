//! The capability contracts plugin components implement.
//!
//! The four component kinds form a closed set: the registry stores typed
//! trait objects and host code performs ordinary interface dispatch, never
//! runtime type inspection. Component methods return `anyhow` errors since
//! they sit at the third-party boundary.

use super::manifest::{ComponentCategory, PluginInfo};
use super::sandbox::HostEnv;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// A handler that processes one content type of an item.
#[async_trait]
pub trait ContentHandler: Send + Sync {
    /// Returns true if this handler can process the given content.
    fn can_handle(&self, content_type: &str, item: &serde_json::Value) -> bool;

    /// Processes the item and returns handler-specific output.
    async fn process(
        &self,
        item: &serde_json::Value,
        config: &HashMap<String, serde_json::Value>,
    ) -> anyhow::Result<serde_json::Value>;

    /// The content types this handler supports.
    fn supported_types(&self) -> Vec<String>;
}

/// A filter that narrows the item set.
pub trait ItemFilter: Send + Sync {
    /// Applies the filter, returning the items that survive.
    fn apply(
        &self,
        items: Vec<serde_json::Value>,
        config: &HashMap<String, serde_json::Value>,
    ) -> Vec<serde_json::Value>;

    /// The criteria this filter matches on (e.g. "score", "date").
    fn criteria(&self) -> Vec<String>;

    /// A JSON schema describing this filter's configuration.
    fn config_schema(&self) -> serde_json::Value {
        serde_json::json!({})
    }
}

/// Format descriptor an exporter advertises.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatInfo {
    /// Format name (e.g. "csv").
    pub name: String,
    /// File extension (e.g. "csv").
    pub extension: String,
    /// Human-readable description.
    pub description: String,
}

/// An exporter that writes items to an output format.
pub trait Exporter: Send + Sync {
    /// Exports the data to the given path.
    fn export(
        &self,
        data: &serde_json::Value,
        output_path: &std::path::Path,
        config: &HashMap<String, serde_json::Value>,
    ) -> anyhow::Result<()>;

    /// The format this exporter produces.
    fn format(&self) -> FormatInfo;
}

/// A scraper that acquires items from a source type.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Returns true if this scraper can handle the given source.
    fn can_scrape(&self, source_type: &str, source_config: &serde_json::Value) -> bool;

    /// Scrapes the source and returns acquired items.
    async fn scrape(
        &self,
        source_config: &serde_json::Value,
    ) -> anyhow::Result<Vec<serde_json::Value>>;

    /// The source types this scraper supports.
    fn supported_sources(&self) -> Vec<String>;
}

/// One component a plugin contributes, tagged with its category.
#[derive(Clone)]
pub enum PluginComponent {
    /// A content handler contribution.
    ContentHandler {
        /// Component name within the plugin.
        name: String,
        /// Priority (lower = tried first).
        priority: i32,
        /// The handler instance.
        handler: Arc<dyn ContentHandler>,
    },
    /// A filter contribution.
    Filter {
        /// Component name within the plugin.
        name: String,
        /// Priority (lower = tried first).
        priority: i32,
        /// The filter instance.
        filter: Arc<dyn ItemFilter>,
    },
    /// An exporter contribution.
    Exporter {
        /// Component name within the plugin.
        name: String,
        /// Priority (lower = tried first).
        priority: i32,
        /// The exporter instance.
        exporter: Arc<dyn Exporter>,
    },
    /// A scraper contribution.
    Scraper {
        /// Component name within the plugin.
        name: String,
        /// Priority (lower = tried first).
        priority: i32,
        /// The scraper instance.
        scraper: Arc<dyn Scraper>,
    },
}

impl PluginComponent {
    /// The component's name within its plugin.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::ContentHandler { name, .. }
            | Self::Filter { name, .. }
            | Self::Exporter { name, .. }
            | Self::Scraper { name, .. } => name,
        }
    }

    /// The category this component belongs to.
    #[must_use]
    pub fn category(&self) -> ComponentCategory {
        match self {
            Self::ContentHandler { .. } => ComponentCategory::ContentHandlers,
            Self::Filter { .. } => ComponentCategory::Filters,
            Self::Exporter { .. } => ComponentCategory::Exporters,
            Self::Scraper { .. } => ComponentCategory::Scrapers,
        }
    }

    /// The component's priority.
    #[must_use]
    pub fn priority(&self) -> i32 {
        match self {
            Self::ContentHandler { priority, .. }
            | Self::Filter { priority, .. }
            | Self::Exporter { priority, .. }
            | Self::Scraper { priority, .. } => *priority,
        }
    }
}

impl std::fmt::Debug for PluginComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginComponent")
            .field("name", &self.name())
            .field("category", &self.category())
            .field("priority", &self.priority())
            .finish()
    }
}

/// An independently loadable unit contributing components to the registry.
///
/// A module's executable code is bound to a discovered candidate either as
/// a pre-built handle or through a builder registered with the manager.
/// `initialize` runs inside the capability sandbox: the [`HostEnv`] is the
/// module's only route to capability-bearing facilities, and a denied
/// request fails the load.
pub trait PluginModule: Send + Sync {
    /// The plugin-info declaration for this module.
    fn info(&self) -> PluginInfo;

    /// The components this module contributes.
    fn components(&self) -> Vec<PluginComponent>;

    /// Initialization hook, run inside the sandbox before registration.
    ///
    /// # Errors
    ///
    /// Any error (including a [`SandboxViolation`](crate::errors::SandboxViolation)
    /// from a denied capability) fails the load; the plugin will be absent
    /// from every registry.
    fn initialize(&self, _host: &HostEnv) -> anyhow::Result<()> {
        Ok(())
    }

    /// Cleanup hook, invoked on unload.
    fn cleanup(&self) {}
}
