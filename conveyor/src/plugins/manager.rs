//! Central plugin lifecycle management.
//!
//! The manager discovers candidates, validates them, computes a
//! dependency-respecting load order, runs each module's initialization
//! inside the capability sandbox, registers contributed components into
//! the [`PluginRegistry`], and can later disable, unload, or hot-reload a
//! plugin. All mutation is serialized through a single mutex; registry
//! readers see copy-on-read snapshots throughout.

use super::conflicts::{detect_conflicts, Conflict};
use super::deps::sort_by_dependencies;
use super::discovery::{discover_plugins, DiscoveryOutcome, PluginCandidate, PluginSourceKind};
use super::manifest::PluginManifest;
use super::registry::{CategoryCounts, ComponentEntry, PluginRegistry};
use super::sandbox::HostEnv;
use super::traits::{PluginComponent, PluginModule};
use super::validation::validate_candidate;
use crate::errors::{DependencyCycleError, PluginError, PluginValidationError};
use crate::events::{EventSink, NoOpEventSink};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Factory producing a plugin's executable module.
pub type PluginBuilder = Box<dyn Fn() -> Arc<dyn PluginModule> + Send + Sync>;

/// Bookkeeping for one loaded plugin.
#[derive(Clone)]
pub struct PluginMetadata {
    /// The plugin's unique name.
    pub name: String,
    /// The plugin's version.
    pub version: String,
    /// Where the plugin lives on disk (empty for pre-built plugins).
    pub source_path: PathBuf,
    /// How the plugin was found.
    pub kind: PluginSourceKind,
    /// The full manifest.
    pub manifest: PluginManifest,
    /// The loaded module handle.
    pub module: Arc<dyn PluginModule>,
    /// Plugins this plugin depends on.
    pub dependencies: HashSet<String>,
    /// Plugins that depend on this plugin.
    pub dependents: HashSet<String>,
    /// When the plugin was loaded.
    pub loaded_at: DateTime<Utc>,
}

impl std::fmt::Debug for PluginMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginMetadata")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("kind", &self.kind)
            .field("dependencies", &self.dependencies)
            .field("dependents", &self.dependents)
            .finish()
    }
}

/// Status of one plugin for introspection.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PluginStatus {
    /// Whether the plugin is loaded.
    pub loaded: bool,
    /// Whether the plugin is enabled.
    pub enabled: bool,
    /// The plugin's version.
    pub version: String,
    /// Registered component counts by category.
    pub counts: CategoryCounts,
}

/// Outcome of loading a batch of candidates.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Plugins loaded successfully, in load order.
    pub loaded: Vec<String>,
    /// Candidates that failed, with the reason each was skipped.
    pub failed: Vec<(String, PluginError)>,
}

/// Central plugin management.
///
/// The registry is constructor-injected (never a singleton) so tests can
/// build isolated managers.
pub struct PluginManager {
    registry: Arc<PluginRegistry>,
    plugin_dirs: Vec<PathBuf>,
    builders: RwLock<HashMap<String, PluginBuilder>>,
    loaded: RwLock<HashMap<String, PluginMetadata>>,
    /// Serializes load/unload/reload/enable/disable relative to each other.
    mutate_lock: Mutex<()>,
    event_sink: Arc<dyn EventSink>,
}

impl PluginManager {
    /// Creates a manager writing into the given registry.
    #[must_use]
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self {
            registry,
            plugin_dirs: Vec::new(),
            builders: RwLock::new(HashMap::new()),
            loaded: RwLock::new(HashMap::new()),
            mutate_lock: Mutex::new(()),
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the directories scanned by [`Self::discover_plugins`].
    #[must_use]
    pub fn with_plugin_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.plugin_dirs = dirs;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// The registry this manager writes into.
    #[must_use]
    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// The directories scanned during discovery.
    #[must_use]
    pub fn plugin_dirs(&self) -> &[PathBuf] {
        &self.plugin_dirs
    }

    /// Binds an executable module factory to a candidate name.
    pub fn register_builder<F>(&self, name: impl Into<String>, builder: F)
    where
        F: Fn() -> Arc<dyn PluginModule> + Send + Sync + 'static,
    {
        self.builders.write().insert(name.into(), Box::new(builder));
    }

    /// Scans the configured directories for candidates.
    #[must_use]
    pub fn discover_plugins(&self) -> DiscoveryOutcome {
        discover_plugins(&self.plugin_dirs)
    }

    /// Validates a candidate against the current load state.
    ///
    /// # Errors
    ///
    /// `PluginValidationError` carrying every collected reason.
    pub fn validate_plugin(&self, candidate: &PluginCandidate) -> Result<(), PluginValidationError> {
        let loaded = self.loaded_names();
        let module = self.builders.read().get(candidate.name()).map(|b| b());
        validate_candidate(
            candidate,
            &loaded,
            &HashSet::new(),
            module.as_deref(),
        )
    }

    /// Loads a single candidate: re-validates, initializes inside the
    /// sandbox, registers every contributed entry point, marks the plugin
    /// enabled, and records its metadata.
    ///
    /// # Errors
    ///
    /// `PluginError` if validation, module resolution, sandboxed
    /// initialization, or registration fails; the registry is left without
    /// any entry for the candidate.
    pub fn load_plugin(&self, candidate: &PluginCandidate) -> Result<(), PluginError> {
        let _guard = self.mutate_lock.lock();
        self.load_locked(candidate, false)
    }

    /// Loads a pre-built module, bypassing discovery.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::load_plugin`].
    pub fn load_prebuilt(&self, module: Arc<dyn PluginModule>) -> Result<(), PluginError> {
        let info = module.info();
        let candidate = PluginCandidate {
            manifest: PluginManifest::from_info(info),
            kind: PluginSourceKind::Prebuilt,
            source_path: PathBuf::new(),
        };

        let _guard = self.mutate_lock.lock();
        {
            let module = Arc::clone(&module);
            self.builders
                .write()
                .insert(candidate.name().to_string(), Box::new(move || Arc::clone(&module)));
        }
        self.load_locked(&candidate, false)
    }

    /// Sorts a batch by dependencies and loads it in order.
    ///
    /// Individually invalid candidates are skipped and reported while the
    /// rest of the batch proceeds.
    ///
    /// # Errors
    ///
    /// `DependencyCycleError` when the batch's dependency graph has a
    /// cycle; nothing is loaded in that case.
    pub fn load_all(
        &self,
        candidates: Vec<PluginCandidate>,
    ) -> Result<LoadReport, DependencyCycleError> {
        let _guard = self.mutate_lock.lock();

        let ordered = sort_by_dependencies(candidates)?;
        let mut report = LoadReport::default();

        for candidate in ordered {
            let name = candidate.name().to_string();
            match self.load_locked(&candidate, false) {
                Ok(()) => report.loaded.push(name),
                Err(e) => {
                    warn!(plugin = %name, error = %e, "Skipping plugin");
                    report.failed.push((name, e));
                }
            }
        }

        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "Plugin batch load complete"
        );
        Ok(report)
    }

    /// Unloads a plugin: invokes its cleanup hook, removes its registry
    /// entries and metadata. Returns false if the plugin was not loaded.
    pub fn unload_plugin(&self, name: &str) -> bool {
        let _guard = self.mutate_lock.lock();
        self.unload_locked(name)
    }

    /// Hot-reloads a plugin: re-reads its candidate from disk, then
    /// unloads and loads it under a single mutation-lock acquisition.
    ///
    /// # Errors
    ///
    /// `NotLoaded` if the plugin is unknown, otherwise the same failure
    /// modes as [`Self::load_plugin`]. Registration during reload passes
    /// `allow_overwrite` so a half-cleaned registry can never wedge it.
    pub fn reload_plugin(&self, name: &str) -> Result<(), PluginError> {
        let _guard = self.mutate_lock.lock();

        let metadata = self
            .loaded
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| PluginError::NotLoaded {
                plugin: name.to_string(),
            })?;

        let candidate = if metadata.kind == PluginSourceKind::Prebuilt {
            PluginCandidate {
                manifest: metadata.manifest.clone(),
                kind: PluginSourceKind::Prebuilt,
                source_path: PathBuf::new(),
            }
        } else {
            super::discovery::candidate_from_path(&metadata.source_path)?
                .ok_or_else(|| {
                    PluginError::Validation(PluginValidationError::new(
                        name,
                        format!(
                            "source path is no longer a plugin: {}",
                            metadata.source_path.display()
                        ),
                    ))
                })?
        };

        self.unload_locked(name);
        let result = self.load_locked(&candidate, true);

        match &result {
            Ok(()) => {
                self.event_sink.try_emit(
                    "plugin.reloaded",
                    Some(serde_json::json!({ "plugin": name })),
                );
                info!(plugin = %name, "Reloaded plugin");
            }
            Err(e) => warn!(plugin = %name, error = %e, "Reload failed"),
        }
        result
    }

    /// Enables a loaded plugin, restoring visibility of its components.
    /// Returns false for unknown plugins.
    pub fn enable_plugin(&self, name: &str) -> bool {
        let _guard = self.mutate_lock.lock();
        if !self.loaded.read().contains_key(name) {
            warn!(plugin = %name, "Cannot enable unloaded plugin");
            return false;
        }
        self.registry.enable_plugin(name);
        info!(plugin = %name, "Enabled plugin");
        true
    }

    /// Disables a plugin without unloading it; reversible via
    /// [`Self::enable_plugin`]. Returns false for unknown plugins.
    pub fn disable_plugin(&self, name: &str) -> bool {
        let _guard = self.mutate_lock.lock();
        if !self.loaded.read().contains_key(name) {
            warn!(plugin = %name, "Cannot disable unloaded plugin");
            return false;
        }
        self.registry.disable_plugin(name);
        info!(plugin = %name, "Disabled plugin");
        true
    }

    /// Returns true if the named plugin is loaded.
    #[must_use]
    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.read().contains_key(name)
    }

    /// Metadata for a loaded plugin.
    #[must_use]
    pub fn plugin_metadata(&self, name: &str) -> Option<PluginMetadata> {
        self.loaded.read().get(name).cloned()
    }

    /// Status of every loaded plugin, for an external CLI or dashboard.
    #[must_use]
    pub fn get_plugin_status(&self) -> HashMap<String, PluginStatus> {
        self.loaded
            .read()
            .iter()
            .map(|(name, metadata)| {
                (
                    name.clone(),
                    PluginStatus {
                        loaded: true,
                        enabled: self.registry.is_enabled(name),
                        version: metadata.version.clone(),
                        counts: self.registry.counts_for(name),
                    },
                )
            })
            .collect()
    }

    /// Scans for cross-plugin capability conflicts among enabled plugins.
    #[must_use]
    pub fn detect_conflicts(&self) -> Vec<Conflict> {
        detect_conflicts(&self.registry)
    }

    /// Maps a filesystem path to the loaded plugin it belongs to.
    #[must_use]
    pub fn plugin_for_path(&self, path: &Path) -> Option<String> {
        self.loaded
            .read()
            .values()
            .find(|m| {
                m.kind != PluginSourceKind::Prebuilt
                    && (path == m.source_path || path.starts_with(&m.source_path))
            })
            .map(|m| m.name.clone())
    }

    fn loaded_names(&self) -> HashSet<String> {
        self.loaded.read().keys().cloned().collect()
    }

    fn resolve_module(&self, name: &str) -> Result<Arc<dyn PluginModule>, PluginError> {
        self.builders
            .read()
            .get(name)
            .map(|builder| builder())
            .ok_or_else(|| PluginError::NoModule {
                plugin: name.to_string(),
            })
    }

    /// Load path shared by `load_plugin`, `load_all`, and `reload_plugin`.
    /// Caller must hold `mutate_lock`.
    fn load_locked(
        &self,
        candidate: &PluginCandidate,
        allow_overwrite: bool,
    ) -> Result<(), PluginError> {
        let name = candidate.name().to_string();
        info!(plugin = %name, "Loading plugin");

        let module = self.resolve_module(&name)?;
        validate_candidate(
            candidate,
            &self.loaded_names(),
            &HashSet::new(),
            Some(module.as_ref()),
        )?;

        let host = HostEnv::new(&name);
        module.initialize(&host).map_err(|e| PluginError::Init {
            plugin: name.clone(),
            reason: e,
        })?;

        let components = select_components(candidate, module.as_ref());
        let component_count = components.len();
        if let Err(e) = self.register_components(&name, components, allow_overwrite) {
            // Back out anything registered before the failure.
            self.registry.remove_plugin(&name);
            return Err(e.into());
        }

        for dependency in &candidate.manifest.dependencies {
            self.registry.add_dependency(&name, dependency);
        }
        self.registry.enable_plugin(&name);

        let dependencies: HashSet<String> =
            candidate.manifest.dependencies.iter().cloned().collect();
        {
            let mut loaded = self.loaded.write();
            for dependency in &dependencies {
                if let Some(parent) = loaded.get_mut(dependency) {
                    parent.dependents.insert(name.clone());
                }
            }
            loaded.insert(
                name.clone(),
                PluginMetadata {
                    name: name.clone(),
                    version: candidate.manifest.version.clone(),
                    source_path: candidate.source_path.clone(),
                    kind: candidate.kind,
                    manifest: candidate.manifest.clone(),
                    module,
                    dependencies,
                    dependents: HashSet::new(),
                    loaded_at: Utc::now(),
                },
            );
        }

        self.event_sink.try_emit(
            "plugin.loaded",
            Some(serde_json::json!({
                "plugin": &name,
                "version": &candidate.manifest.version,
                "components": component_count,
            })),
        );
        info!(plugin = %name, components = component_count, "Loaded plugin");
        Ok(())
    }

    /// Unload path shared by `unload_plugin` and `reload_plugin`.
    /// Caller must hold `mutate_lock`.
    fn unload_locked(&self, name: &str) -> bool {
        let Some(metadata) = self.loaded.write().remove(name) else {
            warn!(plugin = %name, "Plugin is not loaded");
            return false;
        };

        if !metadata.dependents.is_empty() {
            warn!(
                plugin = %name,
                dependents = ?metadata.dependents,
                "Unloading plugin with live dependents"
            );
        }

        metadata.module.cleanup();
        let removed = self.registry.remove_plugin(name);

        let mut loaded = self.loaded.write();
        for other in loaded.values_mut() {
            other.dependents.remove(name);
        }
        drop(loaded);

        self.event_sink.try_emit(
            "plugin.unloaded",
            Some(serde_json::json!({ "plugin": name, "entries_removed": removed })),
        );
        info!(plugin = %name, entries_removed = removed, "Unloaded plugin");
        true
    }

    fn register_components(
        &self,
        plugin_name: &str,
        components: Vec<(PluginComponent, i32)>,
        allow_overwrite: bool,
    ) -> Result<(), crate::errors::RegistryError> {
        for (component, priority) in components {
            match component {
                PluginComponent::ContentHandler { name, handler, .. } => {
                    let capabilities = handler.supported_types();
                    self.registry.register_content_handler(
                        ComponentEntry {
                            plugin_name: plugin_name.to_string(),
                            component_name: name,
                            capabilities,
                            priority,
                            instance: handler,
                        },
                        allow_overwrite,
                    )?;
                }
                PluginComponent::Filter { name, filter, .. } => {
                    let capabilities = filter.criteria();
                    self.registry.register_filter(
                        ComponentEntry {
                            plugin_name: plugin_name.to_string(),
                            component_name: name,
                            capabilities,
                            priority,
                            instance: filter,
                        },
                        allow_overwrite,
                    )?;
                }
                PluginComponent::Exporter { name, exporter, .. } => {
                    let capabilities = vec![exporter.format().name];
                    self.registry.register_exporter(
                        ComponentEntry {
                            plugin_name: plugin_name.to_string(),
                            component_name: name,
                            capabilities,
                            priority,
                            instance: exporter,
                        },
                        allow_overwrite,
                    )?;
                }
                PluginComponent::Scraper { name, scraper, .. } => {
                    let capabilities = scraper.supported_sources();
                    self.registry.register_scraper(
                        ComponentEntry {
                            plugin_name: plugin_name.to_string(),
                            component_name: name,
                            capabilities,
                            priority,
                            instance: scraper,
                        },
                        allow_overwrite,
                    )?;
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("plugin_dirs", &self.plugin_dirs)
            .field("loaded", &self.loaded.read().len())
            .finish()
    }
}

/// Picks the components to register for a candidate.
///
/// Declared entry points select (and may re-prioritize) specific
/// components; an empty declaration means every contributed component, in
/// the inferred-category model single-file plugins rely on.
fn select_components(
    candidate: &PluginCandidate,
    module: &dyn PluginModule,
) -> Vec<(PluginComponent, i32)> {
    let contributed = module.components();

    if candidate.manifest.entry_points.is_empty() {
        return contributed
            .into_iter()
            .map(|component| {
                let priority = component.priority();
                (component, priority)
            })
            .collect();
    }

    let mut selected = Vec::new();
    for (category, entry_points) in &candidate.manifest.entry_points {
        for entry_point in entry_points {
            if let Some(component) = contributed
                .iter()
                .find(|c| c.category() == *category && c.name() == entry_point.class())
            {
                let priority = entry_point.priority().unwrap_or_else(|| component.priority());
                selected.push((component.clone(), priority));
            }
        }
    }
    selected
}
