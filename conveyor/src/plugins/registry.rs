//! The in-memory catalogue of everything plugins have contributed.

use super::manifest::ComponentCategory;
use super::traits::{ContentHandler, Exporter, ItemFilter, Scraper};
use crate::errors::RegistryError;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A registered component: who contributed it, what it claims to handle,
/// and the live instance host code dispatches through.
pub struct ComponentEntry<T: ?Sized> {
    /// The contributing plugin.
    pub plugin_name: String,
    /// The component's name within the plugin.
    pub component_name: String,
    /// Declared capability list (content types, criteria, format name, or
    /// source types depending on category).
    pub capabilities: Vec<String>,
    /// Priority; lower values are tried first.
    pub priority: i32,
    /// The runtime instance.
    pub instance: Arc<T>,
}

impl<T: ?Sized> ComponentEntry<T> {
    /// The qualified `pluginName.componentName` registry key.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}.{}", self.plugin_name, self.component_name)
    }
}

impl<T: ?Sized> Clone for ComponentEntry<T> {
    fn clone(&self) -> Self {
        Self {
            plugin_name: self.plugin_name.clone(),
            component_name: self.component_name.clone(),
            capabilities: self.capabilities.clone(),
            priority: self.priority,
            instance: Arc::clone(&self.instance),
        }
    }
}

impl<T: ?Sized> std::fmt::Debug for ComponentEntry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentEntry")
            .field("key", &self.key())
            .field("capabilities", &self.capabilities)
            .field("priority", &self.priority)
            .finish()
    }
}

/// A registered content handler.
pub type ContentHandlerEntry = ComponentEntry<dyn ContentHandler>;
/// A registered filter.
pub type FilterEntry = ComponentEntry<dyn ItemFilter>;
/// A registered exporter.
pub type ExporterEntry = ComponentEntry<dyn Exporter>;
/// A registered scraper.
pub type ScraperEntry = ComponentEntry<dyn Scraper>;

/// One lock-guarded catalogue keyed by `pluginName.componentName`.
struct Catalogue<T: ?Sized> {
    category: ComponentCategory,
    entries: RwLock<HashMap<String, ComponentEntry<T>>>,
}

impl<T: ?Sized> Catalogue<T> {
    fn new(category: ComponentCategory) -> Self {
        Self {
            category,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn register(
        &self,
        entry: ComponentEntry<T>,
        allow_overwrite: bool,
    ) -> Result<(), RegistryError> {
        let key = entry.key();
        let mut entries = self.entries.write();

        if !allow_overwrite && entries.contains_key(&key) {
            return Err(RegistryError::DuplicateKey {
                category: self.category,
                key,
            });
        }

        entries.insert(key, entry);
        Ok(())
    }

    /// Copy-on-read snapshot of enabled entries, ascending by priority.
    fn list_enabled(&self, enabled: &HashSet<String>) -> Vec<ComponentEntry<T>> {
        let mut result: Vec<ComponentEntry<T>> = self
            .entries
            .read()
            .values()
            .filter(|e| enabled.contains(&e.plugin_name))
            .cloned()
            .collect();
        result.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.key().cmp(&b.key())));
        result
    }

    fn remove_plugin(&self, plugin_name: &str) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| e.plugin_name != plugin_name);
        before - entries.len()
    }

    fn count_for(&self, plugin_name: &str) -> usize {
        self.entries
            .read()
            .values()
            .filter(|e| e.plugin_name == plugin_name)
            .count()
    }
}

/// Per-category component counts for one plugin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CategoryCounts {
    /// Registered content handlers.
    pub content_handlers: usize,
    /// Registered filters.
    pub filters: usize,
    /// Registered exporters.
    pub exporters: usize,
    /// Registered scrapers.
    pub scrapers: usize,
}

/// The process-wide catalogue of plugin contributions.
///
/// Explicitly constructed and constructor-injected (never a module-level
/// singleton) so tests can build isolated registries. Reads are
/// copy-on-read snapshots; mutation happens only through the
/// [`PluginManager`](super::PluginManager), which serializes writers.
/// Entries registered by a disabled plugin remain in the catalogue but are
/// never returned to callers until the plugin is re-enabled.
pub struct PluginRegistry {
    content_handlers: Catalogue<dyn ContentHandler>,
    filters: Catalogue<dyn ItemFilter>,
    exporters: Catalogue<dyn Exporter>,
    scrapers: Catalogue<dyn Scraper>,
    enabled: RwLock<HashSet<String>>,
    dependencies: RwLock<HashMap<String, HashSet<String>>>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            content_handlers: Catalogue::new(ComponentCategory::ContentHandlers),
            filters: Catalogue::new(ComponentCategory::Filters),
            exporters: Catalogue::new(ComponentCategory::Exporters),
            scrapers: Catalogue::new(ComponentCategory::Scrapers),
            enabled: RwLock::new(HashSet::new()),
            dependencies: RwLock::new(HashMap::new()),
        }
    }

    /// Marks a plugin enabled, restoring visibility of its entries.
    pub fn enable_plugin(&self, plugin_name: &str) {
        self.enabled.write().insert(plugin_name.to_string());
    }

    /// Marks a plugin disabled. Its entries stay in the catalogue but are
    /// not returned to callers; reversible without reloading.
    pub fn disable_plugin(&self, plugin_name: &str) {
        self.enabled.write().remove(plugin_name);
    }

    /// Returns true if the plugin is enabled.
    #[must_use]
    pub fn is_enabled(&self, plugin_name: &str) -> bool {
        self.enabled.read().contains(plugin_name)
    }

    /// Records a dependency edge.
    pub fn add_dependency(&self, plugin_name: &str, depends_on: &str) {
        self.dependencies
            .write()
            .entry(plugin_name.to_string())
            .or_default()
            .insert(depends_on.to_string());
    }

    /// The plugins the named plugin depends on. Empty set, not an error,
    /// for unknown names.
    #[must_use]
    pub fn dependencies(&self, plugin_name: &str) -> HashSet<String> {
        self.dependencies
            .read()
            .get(plugin_name)
            .cloned()
            .unwrap_or_default()
    }

    /// Registers a content handler under `pluginName.componentName`.
    ///
    /// # Errors
    ///
    /// `DuplicateKey` when the key exists and `allow_overwrite` is false.
    pub fn register_content_handler(
        &self,
        entry: ContentHandlerEntry,
        allow_overwrite: bool,
    ) -> Result<(), RegistryError> {
        self.content_handlers.register(entry, allow_overwrite)
    }

    /// Registers a filter under `pluginName.componentName`.
    ///
    /// # Errors
    ///
    /// `DuplicateKey` when the key exists and `allow_overwrite` is false.
    pub fn register_filter(
        &self,
        entry: FilterEntry,
        allow_overwrite: bool,
    ) -> Result<(), RegistryError> {
        self.filters.register(entry, allow_overwrite)
    }

    /// Registers an exporter under `pluginName.componentName`.
    ///
    /// # Errors
    ///
    /// `DuplicateKey` when the key exists and `allow_overwrite` is false.
    pub fn register_exporter(
        &self,
        entry: ExporterEntry,
        allow_overwrite: bool,
    ) -> Result<(), RegistryError> {
        self.exporters.register(entry, allow_overwrite)
    }

    /// Registers a scraper under `pluginName.componentName`.
    ///
    /// # Errors
    ///
    /// `DuplicateKey` when the key exists and `allow_overwrite` is false.
    pub fn register_scraper(
        &self,
        entry: ScraperEntry,
        allow_overwrite: bool,
    ) -> Result<(), RegistryError> {
        self.scrapers.register(entry, allow_overwrite)
    }

    /// Enabled content handlers, ascending by priority.
    #[must_use]
    pub fn content_handlers(&self) -> Vec<ContentHandlerEntry> {
        self.content_handlers.list_enabled(&self.enabled.read())
    }

    /// Enabled filters, ascending by priority.
    #[must_use]
    pub fn filters(&self) -> Vec<FilterEntry> {
        self.filters.list_enabled(&self.enabled.read())
    }

    /// Enabled exporters, ascending by priority.
    #[must_use]
    pub fn exporters(&self) -> Vec<ExporterEntry> {
        self.exporters.list_enabled(&self.enabled.read())
    }

    /// Enabled scrapers, ascending by priority.
    #[must_use]
    pub fn scrapers(&self) -> Vec<ScraperEntry> {
        self.scrapers.list_enabled(&self.enabled.read())
    }

    /// Removes every entry, edge, and enabled mark for a plugin.
    /// Returns the number of entries removed.
    pub(crate) fn remove_plugin(&self, plugin_name: &str) -> usize {
        let removed = self.content_handlers.remove_plugin(plugin_name)
            + self.filters.remove_plugin(plugin_name)
            + self.exporters.remove_plugin(plugin_name)
            + self.scrapers.remove_plugin(plugin_name);

        self.enabled.write().remove(plugin_name);
        self.dependencies.write().remove(plugin_name);

        removed
    }

    /// Per-category counts for one plugin, enabled or not.
    #[must_use]
    pub fn counts_for(&self, plugin_name: &str) -> CategoryCounts {
        CategoryCounts {
            content_handlers: self.content_handlers.count_for(plugin_name),
            filters: self.filters.count_for(plugin_name),
            exporters: self.exporters.count_for(plugin_name),
            scrapers: self.scrapers.count_for(plugin_name),
        }
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("enabled", &self.enabled.read().len())
            .finish()
    }
}
