//! Plugin manifests and plugin-info declarations.
//!
//! Directory plugins carry a `plugin.json` manifest; single-file plugins
//! carry a `<name>.plugin.json` plugin-info literal and have their entry
//! points inferred from the components their module contributes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The four component categories a plugin can contribute to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentCategory {
    /// Handlers that process one content type of an item.
    ContentHandlers,
    /// Filters that narrow the item set.
    Filters,
    /// Exporters that write items to an output format.
    Exporters,
    /// Scrapers that acquire items from a source type.
    Scrapers,
}

impl ComponentCategory {
    /// All categories, in registry order.
    pub const ALL: [Self; 4] = [
        Self::ContentHandlers,
        Self::Filters,
        Self::Exporters,
        Self::Scrapers,
    ];

    /// The manifest key for this category.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ContentHandlers => "content_handlers",
            Self::Filters => "filters",
            Self::Exporters => "exporters",
            Self::Scrapers => "scrapers",
        }
    }
}

impl std::fmt::Display for ComponentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared entry point: either a bare component name or a record with
/// category-specific fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryPoint {
    /// A bare component name.
    Name(String),
    /// A detailed entry-point record.
    Detailed(DetailedEntryPoint),
}

/// The detailed form of an entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedEntryPoint {
    /// The component name within the plugin.
    pub class: String,
    /// Optional priority override (lower = tried first).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    /// Category-specific extra fields, kept verbatim.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl EntryPoint {
    /// The component name this entry point nominates.
    #[must_use]
    pub fn class(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Detailed(detailed) => &detailed.class,
        }
    }

    /// The declared priority override, if any.
    #[must_use]
    pub fn priority(&self) -> Option<i32> {
        match self {
            Self::Name(_) => None,
            Self::Detailed(detailed) => detailed.priority,
        }
    }
}

/// A directory plugin's manifest (`plugin.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Unique plugin name.
    pub name: String,
    /// Plugin version.
    pub version: String,
    /// Human-readable description.
    pub description: String,
    /// Plugin author.
    #[serde(default)]
    pub author: String,
    /// Names of plugins this plugin depends on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    /// Declared entry points per category. Empty means "infer from the
    /// module's contributed components".
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub entry_points: HashMap<ComponentCategory, Vec<EntryPoint>>,
    /// Declared capability needs. Documentation and audit only; the
    /// sandbox denylist is enforced regardless.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
}

impl PluginManifest {
    /// Builds a minimal manifest from a plugin-info declaration.
    #[must_use]
    pub fn from_info(info: PluginInfo) -> Self {
        Self {
            name: info.name,
            version: info.version,
            description: info.description,
            author: info.author.unwrap_or_default(),
            dependencies: info.dependencies,
            entry_points: HashMap::new(),
            permissions: Vec::new(),
        }
    }
}

/// The plugin-info literal a single-file plugin exposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Unique plugin name.
    pub name: String,
    /// Plugin version.
    pub version: String,
    /// Human-readable description.
    pub description: String,
    /// Plugin author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Names of plugins this plugin depends on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}
