//! Hot-reload watcher for plugin sources.
//!
//! Watches plugin directories on a background thread and, when a source
//! changes, performs unload+load through the manager (under the same
//! mutation lock normal load/unload takes). A content hash per path
//! suppresses reloads for writes that did not change the file. Observers
//! receive a [`ReloadEvent`] per action.

use super::discovery::candidate_from_path;
use super::manager::PluginManager;
use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use parking_lot::RwLock;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What the watcher did in response to a source change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloadEventType {
    /// A new plugin source appeared and was loaded.
    Load,
    /// A loaded plugin's source changed and was reloaded.
    Reload,
    /// A loaded plugin's source disappeared and was unloaded.
    Unload,
}

/// One watcher action, for an external observer to display.
#[derive(Debug, Clone, Serialize)]
pub struct ReloadEvent {
    /// The plugin acted on.
    pub plugin_name: String,
    /// What was done.
    pub event_type: ReloadEventType,
    /// Whether the action succeeded.
    pub success: bool,
    /// The failure message, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Watches plugin directories and hot-reloads plugins through a manager.
pub struct HotReloadWatcher {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl HotReloadWatcher {
    /// Starts watching the manager's plugin directories.
    ///
    /// Returns the watcher handle and the stream of [`ReloadEvent`]s.
    ///
    /// # Errors
    ///
    /// `notify::Error` when the filesystem watcher cannot be installed.
    pub fn start(
        manager: Arc<PluginManager>,
        debounce: Duration,
    ) -> Result<(Self, tokio::sync::mpsc::UnboundedReceiver<ReloadEvent>), notify::Error> {
        let (fs_tx, fs_rx) = mpsc::channel();
        let mut debouncer = new_debouncer(debounce, fs_tx)?;

        for dir in manager.plugin_dirs() {
            if dir.exists() {
                debouncer.watcher().watch(dir, RecursiveMode::Recursive)?;
                info!(directory = %dir.display(), "Watching plugin directory");
            } else {
                warn!(directory = %dir.display(), "Skipping missing plugin directory");
            }
        }

        let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);

        let handle = std::thread::spawn(move || {
            // Keeps the debouncer alive for the watcher's lifetime.
            let _debouncer = debouncer;
            let hashes = RwLock::new(HashMap::new());

            while !shutdown_flag.load(Ordering::SeqCst) {
                match fs_rx.recv_timeout(Duration::from_millis(200)) {
                    Ok(Ok(events)) => {
                        for event in events {
                            if let Some(reload_event) =
                                handle_change(&manager, &hashes, &event.path)
                            {
                                if event_tx.send(reload_event).is_err() {
                                    return;
                                }
                            }
                        }
                    }
                    Ok(Err(error)) => {
                        warn!(?error, "Watch error");
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => {}
                    Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        Ok((
            Self {
                shutdown,
                handle: Some(handle),
            },
            event_rx,
        ))
    }

    /// Stops the watcher and joins its thread.
    pub fn stop(mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for HotReloadWatcher {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl std::fmt::Debug for HotReloadWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HotReloadWatcher")
            .field("running", &!self.shutdown.load(Ordering::SeqCst))
            .finish()
    }
}

/// Reacts to one changed path. Returns the event to publish, or `None`
/// when the change is irrelevant or a no-op.
fn handle_change(
    manager: &PluginManager,
    hashes: &RwLock<HashMap<PathBuf, String>>,
    path: &Path,
) -> Option<ReloadEvent> {
    if path.exists() {
        if path.is_file() {
            let hash = file_hash(path)?;
            let unchanged = hashes.read().get(path) == Some(&hash);
            if unchanged {
                debug!(path = %path.display(), "Content unchanged; skipping reload");
                return None;
            }
            hashes.write().insert(path.to_path_buf(), hash);
        }

        if let Some(plugin_name) = manager.plugin_for_path(path) {
            debug!(plugin = %plugin_name, path = %path.display(), "Plugin source changed");
            let result = manager.reload_plugin(&plugin_name);
            return Some(ReloadEvent {
                plugin_name,
                event_type: ReloadEventType::Reload,
                success: result.is_ok(),
                error: result.err().map(|e| e.to_string()),
            });
        }

        // A source the manager does not know yet: load it if a module is
        // bound to its name.
        match candidate_from_path(path) {
            Ok(Some(candidate)) => {
                let plugin_name = candidate.name().to_string();
                let result = manager.load_plugin(&candidate);
                return Some(ReloadEvent {
                    plugin_name,
                    event_type: ReloadEventType::Load,
                    success: result.is_ok(),
                    error: result.err().map(|e| e.to_string()),
                });
            }
            Ok(None) => return None,
            Err(e) => {
                return Some(ReloadEvent {
                    plugin_name: e.plugin.clone(),
                    event_type: ReloadEventType::Load,
                    success: false,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    // Path is gone: unload whichever plugin owned it.
    hashes.write().remove(path);
    let plugin_name = manager.plugin_for_path(path)?;
    let success = manager.unload_plugin(&plugin_name);
    Some(ReloadEvent {
        plugin_name,
        event_type: ReloadEventType::Unload,
        success,
        error: None,
    })
}

fn file_hash(path: &Path) -> Option<String> {
    match std::fs::read(path) {
        Ok(bytes) => Some(hex::encode(Sha256::digest(bytes))),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Failed to hash file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::registry::PluginRegistry;
    use crate::testing::FixturePlugin;
    use std::fs;

    fn write_manifest(dir: &Path, name: &str, version: &str) {
        fs::write(
            dir.join(super::super::discovery::MANIFEST_FILE),
            serde_json::json!({
                "name": name,
                "version": version,
                "description": "d",
                "author": "a"
            })
            .to_string(),
        )
        .unwrap();
    }

    fn manager_with_dir(dir: &Path) -> Arc<PluginManager> {
        Arc::new(
            PluginManager::new(Arc::new(PluginRegistry::new()))
                .with_plugin_dirs(vec![dir.to_path_buf()]),
        )
    }

    #[test]
    fn test_handle_change_reloads_loaded_plugin() {
        let tmp = tempfile::tempdir().unwrap();
        let plugin_dir = tmp.path().join("pack");
        fs::create_dir_all(&plugin_dir).unwrap();
        write_manifest(&plugin_dir, "pack", "1.0.0");

        let manager = manager_with_dir(tmp.path());
        let module = Arc::new(FixturePlugin::new("pack").with_exporter("E", "csv", 100));
        manager.register_builder("pack", move || module.clone());
        let outcome = manager.discover_plugins();
        manager.load_plugin(&outcome.candidates[0]).unwrap();

        let hashes = RwLock::new(HashMap::new());
        let manifest_path = plugin_dir.join(super::super::discovery::MANIFEST_FILE);

        let event = handle_change(&manager, &hashes, &manifest_path).unwrap();
        assert_eq!(event.event_type, ReloadEventType::Reload);
        assert!(event.success);
        assert_eq!(event.plugin_name, "pack");
        assert_eq!(manager.registry().exporters().len(), 1);

        // Same content again: hash matches, no event.
        assert!(handle_change(&manager, &hashes, &manifest_path).is_none());

        // New content: reload fires again and picks up the new manifest.
        write_manifest(&plugin_dir, "pack", "2.0.0");
        let event = handle_change(&manager, &hashes, &manifest_path).unwrap();
        assert!(event.success);
        assert_eq!(
            manager.plugin_metadata("pack").unwrap().version,
            "2.0.0"
        );
    }

    #[test]
    fn test_handle_change_loads_new_plugin_with_builder() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = manager_with_dir(tmp.path());
        let module = Arc::new(FixturePlugin::new("late").with_filter("F", "score", 100));
        manager.register_builder("late", move || module.clone());

        let declaration = tmp.path().join("late.plugin.json");
        fs::write(
            &declaration,
            serde_json::json!({
                "name": "late",
                "version": "0.1.0",
                "description": "d"
            })
            .to_string(),
        )
        .unwrap();

        let hashes = RwLock::new(HashMap::new());
        let event = handle_change(&manager, &hashes, &declaration).unwrap();

        assert_eq!(event.event_type, ReloadEventType::Load);
        assert!(event.success);
        assert!(manager.is_loaded("late"));
    }

    #[test]
    fn test_handle_change_unloads_deleted_plugin() {
        let tmp = tempfile::tempdir().unwrap();
        let plugin_dir = tmp.path().join("gone");
        fs::create_dir_all(&plugin_dir).unwrap();
        write_manifest(&plugin_dir, "gone", "1.0.0");

        let manager = manager_with_dir(tmp.path());
        let module = Arc::new(FixturePlugin::new("gone"));
        manager.register_builder("gone", move || module.clone());
        let outcome = manager.discover_plugins();
        manager.load_plugin(&outcome.candidates[0]).unwrap();

        fs::remove_dir_all(&plugin_dir).unwrap();

        let hashes = RwLock::new(HashMap::new());
        let event = handle_change(&manager, &hashes, &plugin_dir).unwrap();

        assert_eq!(event.event_type, ReloadEventType::Unload);
        assert!(event.success);
        assert!(!manager.is_loaded("gone"));
    }

    #[test]
    fn test_irrelevant_path_is_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = manager_with_dir(tmp.path());
        let stray = tmp.path().join("notes.txt");
        fs::write(&stray, "hello").unwrap();

        let hashes = RwLock::new(HashMap::new());
        assert!(handle_change(&manager, &hashes, &stray).is_none());
    }

    #[tokio::test]
    async fn test_watcher_start_and_stop() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = manager_with_dir(tmp.path());

        let (watcher, _events) =
            HotReloadWatcher::start(manager, Duration::from_millis(50)).unwrap();
        watcher.stop();
    }
}
