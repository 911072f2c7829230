//! Candidate validation, run before any plugin code executes.

use super::discovery::PluginCandidate;
use super::traits::PluginModule;
use crate::errors::PluginValidationError;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

#[allow(clippy::expect_used)]
fn name_pattern() -> &'static Regex {
    static NAME_PATTERN: OnceLock<Regex> = OnceLock::new();
    NAME_PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("pattern is a valid literal"))
}

/// Validates a candidate against the current load state.
///
/// Collects every failure reason: malformed name, collision with an
/// already-loaded plugin, dependencies that are neither loaded nor
/// scheduled earlier in the batch, a missing source path, and entry
/// points that nominate components the bound module does not contribute.
/// Interface compliance is skipped when no module is bound yet.
///
/// # Errors
///
/// `PluginValidationError` carrying all collected reasons.
pub fn validate_candidate(
    candidate: &PluginCandidate,
    loaded: &HashSet<String>,
    scheduled: &HashSet<String>,
    module: Option<&dyn PluginModule>,
) -> Result<(), PluginValidationError> {
    let mut reasons = Vec::new();
    let name = candidate.name();

    if !name_pattern().is_match(name) {
        reasons.push(format!(
            "invalid plugin name '{name}' (must start with a letter and use only letters, digits, '_' or '-')"
        ));
    }

    if loaded.contains(name) {
        reasons.push(format!("name collides with already-loaded plugin '{name}'"));
    }

    for dependency in &candidate.manifest.dependencies {
        if !loaded.contains(dependency) && !scheduled.contains(dependency) {
            reasons.push(format!("missing dependency '{dependency}'"));
        }
    }

    if candidate.kind != super::discovery::PluginSourceKind::Prebuilt
        && !candidate.source_path.exists()
    {
        reasons.push(format!(
            "source path does not exist: {}",
            candidate.source_path.display()
        ));
    }

    if let Some(module) = module {
        let components: HashSet<(super::manifest::ComponentCategory, String)> = module
            .components()
            .iter()
            .map(|c| (c.category(), c.name().to_string()))
            .collect();

        for (category, entry_points) in &candidate.manifest.entry_points {
            for entry_point in entry_points {
                let class = entry_point.class();
                if !components.contains(&(*category, class.to_string())) {
                    reasons.push(format!(
                        "entry point '{class}' in '{category}' is not contributed by the module"
                    ));
                }
            }
        }
    }

    if reasons.is_empty() {
        Ok(())
    } else {
        Err(PluginValidationError::with_reasons(name, reasons))
    }
}
