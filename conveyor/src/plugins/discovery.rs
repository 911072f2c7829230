//! Plugin discovery from directories.

use super::manifest::{PluginInfo, PluginManifest};
use crate::errors::PluginValidationError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The name of a directory plugin's manifest file.
pub const MANIFEST_FILE: &str = "plugin.json";

/// The suffix single-file plugin-info declarations carry.
pub const SINGLE_FILE_SUFFIX: &str = ".plugin.json";

/// How a candidate was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginSourceKind {
    /// A subdirectory containing a `plugin.json` manifest.
    Directory,
    /// A top-level `<name>.plugin.json` plugin-info declaration.
    SingleFile,
    /// Supplied pre-built by the host; no on-disk source.
    Prebuilt,
}

/// A discovered plugin, not yet validated or loaded.
#[derive(Debug, Clone)]
pub struct PluginCandidate {
    /// The parsed manifest (built from the plugin-info literal for
    /// single-file candidates).
    pub manifest: PluginManifest,
    /// How the candidate was found.
    pub kind: PluginSourceKind,
    /// Where the candidate lives on disk.
    pub source_path: PathBuf,
}

impl PluginCandidate {
    /// The candidate's plugin name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.manifest.name
    }
}

/// The result of scanning plugin directories.
///
/// Malformed candidates are surfaced in `rejected`, never silently
/// dropped; healthy candidates in the same batch proceed.
#[derive(Debug, Default)]
pub struct DiscoveryOutcome {
    /// Candidates ready for validation and loading.
    pub candidates: Vec<PluginCandidate>,
    /// Candidates that could not even be parsed.
    pub rejected: Vec<PluginValidationError>,
}

/// Discovers plugin candidates from the given directories.
///
/// Immediate subdirectories holding a [`MANIFEST_FILE`] become directory
/// candidates; top-level files ending in [`SINGLE_FILE_SUFFIX`] become
/// single-file candidates. Non-existent directories produce an empty
/// result, not an error.
#[must_use]
pub fn discover_plugins(directories: &[PathBuf]) -> DiscoveryOutcome {
    let mut outcome = DiscoveryOutcome::default();

    for directory in directories {
        if !directory.exists() {
            debug!(directory = %directory.display(), "Plugin directory does not exist");
            continue;
        }

        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(directory = %directory.display(), error = %e, "Failed to read plugin directory");
                continue;
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .collect();
        paths.sort();

        for path in paths {
            match candidate_from_path(&path) {
                Ok(Some(candidate)) => {
                    debug!(
                        plugin = candidate.name(),
                        path = %path.display(),
                        "Discovered plugin candidate"
                    );
                    outcome.candidates.push(candidate);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Rejected plugin candidate");
                    outcome.rejected.push(e);
                }
            }
        }
    }

    outcome
}

/// Builds a candidate from a single filesystem path, if it looks like one.
///
/// Used by discovery and by the hot-reload watcher to map changed paths
/// back to plugins. Returns `Ok(None)` for paths that are not plugin
/// sources at all.
///
/// # Errors
///
/// `PluginValidationError` when the path is plugin-shaped but its manifest
/// or plugin-info declaration cannot be parsed.
pub fn candidate_from_path(path: &Path) -> Result<Option<PluginCandidate>, PluginValidationError> {
    if path.is_dir() {
        let manifest_path = path.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Ok(None);
        }
        let manifest = parse_manifest(&manifest_path)?;
        return Ok(Some(PluginCandidate {
            manifest,
            kind: PluginSourceKind::Directory,
            source_path: path.to_path_buf(),
        }));
    }

    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if !file_name.ends_with(SINGLE_FILE_SUFFIX) {
        return Ok(None);
    }

    let info = parse_info(path)?;
    Ok(Some(PluginCandidate {
        manifest: PluginManifest::from_info(info),
        kind: PluginSourceKind::SingleFile,
        source_path: path.to_path_buf(),
    }))
}

fn parse_manifest(path: &Path) -> Result<PluginManifest, PluginValidationError> {
    let fallback_name = || {
        path.parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string()
    };

    let raw = fs::read_to_string(path).map_err(|e| {
        PluginValidationError::new(fallback_name(), format!("unreadable manifest: {e}"))
    })?;

    serde_json::from_str(&raw)
        .map_err(|e| PluginValidationError::new(fallback_name(), format!("bad manifest: {e}")))
}

fn parse_info(path: &Path) -> Result<PluginInfo, PluginValidationError> {
    let fallback_name = || {
        path.file_name()
            .and_then(|n| n.to_str())
            .map_or_else(|| "unknown".to_string(), |n| {
                n.trim_end_matches(SINGLE_FILE_SUFFIX).to_string()
            })
    };

    let raw = fs::read_to_string(path).map_err(|e| {
        PluginValidationError::new(fallback_name(), format!("unreadable plugin info: {e}"))
    })?;

    serde_json::from_str(&raw).map_err(|e| {
        PluginValidationError::new(fallback_name(), format!("bad plugin info: {e}"))
    })
}
