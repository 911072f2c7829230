//! Capability sandbox for plugin initialization.
//!
//! Plugin code never touches capability-bearing facilities directly; its
//! only route is the [`HostEnv`] handed to `initialize`. A fixed denylist
//! is enforced uniformly for every module and is not configurable
//! per-plugin. Granted capabilities are recorded for audit.

use crate::errors::SandboxViolation;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// A capability a plugin may request from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Raw filesystem access outside managed storage.
    RawFilesystem,
    /// Spawning child processes.
    ProcessSpawn,
    /// Opening raw network sockets.
    RawSockets,
    /// Loading or executing code at runtime.
    DynamicCodeExec,
    /// Raw memory access.
    RawMemory,
    /// HTTP fetches through the host's client.
    HttpFetch,
    /// Scratch storage inside the plugin's managed directory.
    ScratchStorage,
    /// Reading the host clock.
    Clock,
}

impl Capability {
    /// The capability's wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RawFilesystem => "raw_filesystem",
            Self::ProcessSpawn => "process_spawn",
            Self::RawSockets => "raw_sockets",
            Self::DynamicCodeExec => "dynamic_code_exec",
            Self::RawMemory => "raw_memory",
            Self::HttpFetch => "http_fetch",
            Self::ScratchStorage => "scratch_storage",
            Self::Clock => "clock",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The uniform denylist, with the reason each entry is restricted.
const DENIED: [(Capability, &str); 5] = [
    (
        Capability::RawFilesystem,
        "plugins must use managed scratch storage",
    ),
    (
        Capability::ProcessSpawn,
        "plugins may not spawn child processes",
    ),
    (
        Capability::RawSockets,
        "plugins must use the host's HTTP client",
    ),
    (
        Capability::DynamicCodeExec,
        "plugins may not load code at runtime",
    ),
    (Capability::RawMemory, "plugins may not access raw memory"),
];

/// Proof that a capability was granted.
#[derive(Debug, Clone, Copy)]
pub struct CapabilityToken {
    capability: Capability,
}

impl CapabilityToken {
    /// The capability this token grants.
    #[must_use]
    pub fn capability(&self) -> Capability {
        self.capability
    }
}

/// The restricted execution environment handed to a plugin's `initialize`.
pub struct HostEnv {
    plugin: String,
    granted: RwLock<Vec<Capability>>,
}

impl HostEnv {
    /// Creates a sandbox environment for the named plugin.
    #[must_use]
    pub fn new(plugin: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            granted: RwLock::new(Vec::new()),
        }
    }

    /// The plugin this environment belongs to.
    #[must_use]
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Requests a capability.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxViolation`] naming the capability and the reason it
    /// is restricted when the capability is on the denylist.
    pub fn require(&self, capability: Capability) -> Result<CapabilityToken, SandboxViolation> {
        if let Some((_, reason)) = DENIED.iter().find(|(denied, _)| *denied == capability) {
            return Err(SandboxViolation {
                plugin: self.plugin.clone(),
                capability,
                reason: (*reason).to_string(),
            });
        }

        self.granted.write().push(capability);
        Ok(CapabilityToken { capability })
    }

    /// The capabilities granted so far, for audit.
    #[must_use]
    pub fn granted(&self) -> Vec<Capability> {
        self.granted.read().clone()
    }
}

impl std::fmt::Debug for HostEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostEnv")
            .field("plugin", &self.plugin)
            .field("granted", &self.granted.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denied_capability_names_itself() {
        let env = HostEnv::new("rogue");
        let err = env.require(Capability::ProcessSpawn).unwrap_err();

        assert_eq!(err.plugin, "rogue");
        assert_eq!(err.capability, Capability::ProcessSpawn);
        assert!(err.to_string().contains("process_spawn"));
        assert!(env.granted().is_empty());
    }

    #[test]
    fn test_allowed_capability_is_recorded() {
        let env = HostEnv::new("polite");
        let token = env.require(Capability::HttpFetch).unwrap();

        assert_eq!(token.capability(), Capability::HttpFetch);
        assert_eq!(env.granted(), vec![Capability::HttpFetch]);
    }

    #[test]
    fn test_denylist_is_uniform() {
        for (capability, _) in DENIED {
            let env = HostEnv::new("any");
            assert!(env.require(capability).is_err());
        }
    }
}
