//! Cross-plugin conflict detection.

use super::manifest::ComponentCategory;
use super::registry::{ComponentEntry, PluginRegistry};
use serde::Serialize;
use std::collections::BTreeMap;

/// Two or more enabled plugins claiming the same capability in one category.
///
/// A diagnostic record for the operator, not an error: detection never
/// disables anything, and resolution policy is left to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    /// The category the conflict is in.
    pub category: ComponentCategory,
    /// The shared capability (content type, criterion, format name, or
    /// source type).
    pub capability: String,
    /// The conflicting plugins, sorted.
    pub plugins: Vec<String>,
    /// The conflicting registry keys, sorted.
    pub entries: Vec<String>,
}

/// Scans the registry for enabled entries of different plugins with
/// overlapping capability, per category.
#[must_use]
pub fn detect_conflicts(registry: &PluginRegistry) -> Vec<Conflict> {
    let mut conflicts = Vec::new();

    conflicts.extend(conflicts_in(
        ComponentCategory::ContentHandlers,
        &registry.content_handlers(),
    ));
    conflicts.extend(conflicts_in(ComponentCategory::Filters, &registry.filters()));
    conflicts.extend(conflicts_in(
        ComponentCategory::Exporters,
        &registry.exporters(),
    ));
    conflicts.extend(conflicts_in(ComponentCategory::Scrapers, &registry.scrapers()));

    conflicts
}

fn conflicts_in<T: ?Sized>(
    category: ComponentCategory,
    entries: &[ComponentEntry<T>],
) -> Vec<Conflict> {
    // capability -> [(plugin, key)], BTreeMap for deterministic output.
    let mut claims: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();

    for entry in entries {
        for capability in &entry.capabilities {
            claims
                .entry(capability.clone())
                .or_default()
                .push((entry.plugin_name.clone(), entry.key()));
        }
    }

    claims
        .into_iter()
        .filter_map(|(capability, claimants)| {
            let mut plugins: Vec<String> =
                claimants.iter().map(|(plugin, _)| plugin.clone()).collect();
            plugins.sort();
            plugins.dedup();
            if plugins.len() < 2 {
                return None;
            }

            let mut entries: Vec<String> = claimants.into_iter().map(|(_, key)| key).collect();
            entries.sort();

            Some(Conflict {
                category,
                capability,
                plugins,
                entries,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::registry::ComponentEntry;
    use crate::testing::StaticContentHandler;
    use std::sync::Arc;

    fn handler_entry(plugin: &str, component: &str, content_type: &str) -> ComponentEntry<dyn crate::plugins::ContentHandler> {
        ComponentEntry {
            plugin_name: plugin.to_string(),
            component_name: component.to_string(),
            capabilities: vec![content_type.to_string()],
            priority: 100,
            instance: Arc::new(StaticContentHandler::new(vec![content_type.to_string()])),
        }
    }

    #[test]
    fn test_two_plugins_same_content_type_is_one_conflict() {
        let registry = PluginRegistry::new();
        registry.enable_plugin("alpha");
        registry.enable_plugin("beta");
        registry
            .register_content_handler(handler_entry("alpha", "VideoA", "video"), false)
            .unwrap();
        registry
            .register_content_handler(handler_entry("beta", "VideoB", "video"), false)
            .unwrap();

        let conflicts = detect_conflicts(&registry);

        assert_eq!(conflicts.len(), 1);
        let conflict = &conflicts[0];
        assert_eq!(conflict.category, ComponentCategory::ContentHandlers);
        assert_eq!(conflict.capability, "video");
        assert_eq!(conflict.plugins, vec!["alpha", "beta"]);
        assert_eq!(conflict.entries, vec!["alpha.VideoA", "beta.VideoB"]);
    }

    #[test]
    fn test_disabled_plugin_does_not_conflict() {
        let registry = PluginRegistry::new();
        registry.enable_plugin("alpha");
        registry.enable_plugin("beta");
        registry
            .register_content_handler(handler_entry("alpha", "VideoA", "video"), false)
            .unwrap();
        registry
            .register_content_handler(handler_entry("beta", "VideoB", "video"), false)
            .unwrap();

        registry.disable_plugin("beta");
        assert!(detect_conflicts(&registry).is_empty());
    }

    #[test]
    fn test_same_plugin_overlap_is_not_a_conflict() {
        let registry = PluginRegistry::new();
        registry.enable_plugin("alpha");
        registry
            .register_content_handler(handler_entry("alpha", "VideoA", "video"), false)
            .unwrap();
        registry
            .register_content_handler(handler_entry("alpha", "VideoB", "video"), false)
            .unwrap();

        assert!(detect_conflicts(&registry).is_empty());
    }
}
