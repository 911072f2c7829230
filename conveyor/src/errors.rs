//! Error types for the conveyor framework.
//!
//! Run-level failures are expressed as `ExecutorError`; per-stage failures
//! live inside [`PipelineResult`](crate::core::PipelineResult) and only
//! surface here when the halt policy promotes them. Plugin failures carry
//! enough detail (plugin names, category, capability, missing dependency)
//! for an operator to act without reading plugin source.

use crate::plugins::manifest::ComponentCategory;
use crate::plugins::sandbox::Capability;
use thiserror::Error;

/// The unifying error type for host code driving conveyor.
///
/// Lets callers mix executor and plugin operations behind one `?`-friendly
/// result type.
#[derive(Debug, Error)]
pub enum ConveyorError {
    /// A pipeline-run failure.
    #[error("{0}")]
    Executor(#[from] ExecutorError),

    /// A plugin lifecycle failure.
    #[error("{0}")]
    Plugin(#[from] PluginError),

    /// IO error from host-side plumbing around the core.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by [`PipelineExecutor::execute`](crate::pipeline::PipelineExecutor::execute).
#[derive(Debug, Clone, Error)]
pub enum ExecutorError {
    /// A second `execute` was attempted while one was in flight.
    #[error("pipeline is already running; concurrent execute() calls are rejected")]
    AlreadyRunning,

    /// The stage list failed pre-run validation; no stage was executed.
    #[error("pipeline validation failed: {}", problems.join("; "))]
    Validation {
        /// Human-readable validation problems.
        problems: Vec<String>,
    },

    /// The halt policy stopped the run at a failed stage.
    #[error("pipeline halted at stage '{stage}': {}", errors.join("; "))]
    Halted {
        /// The stage that failed.
        stage: String,
        /// The errors that stage reported.
        errors: Vec<String>,
    },
}

/// Errors raised by plugin lifecycle operations.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The candidate failed validation before any plugin code ran.
    #[error("{0}")]
    Validation(#[from] PluginValidationError),

    /// The batch being loaded together contains a dependency cycle.
    #[error("{0}")]
    Cycle(#[from] DependencyCycleError),

    /// A registration was rejected by the registry.
    #[error("{0}")]
    Registry(#[from] RegistryError),

    /// The plugin's sandboxed initialization failed.
    #[error("plugin '{plugin}' failed to initialize: {reason:#}")]
    Init {
        /// The plugin that failed.
        plugin: String,
        /// The underlying failure (including sandbox violations).
        reason: anyhow::Error,
    },

    /// No executable module is bound to the candidate's name.
    #[error("no module builder registered for plugin '{plugin}'")]
    NoModule {
        /// The plugin missing a module binding.
        plugin: String,
    },

    /// The named plugin is not in the loaded-plugin table.
    #[error("plugin '{plugin}' is not loaded")]
    NotLoaded {
        /// The plugin name.
        plugin: String,
    },
}

/// Error raised when a plugin candidate fails validation.
///
/// Collects every reason rather than stopping at the first, so an operator
/// can fix the plugin in one pass.
#[derive(Debug, Clone, Error)]
#[error("plugin '{plugin}' failed validation: {}", reasons.join("; "))]
pub struct PluginValidationError {
    /// The offending plugin's name.
    pub plugin: String,
    /// Human-readable failure reasons.
    pub reasons: Vec<String>,
}

impl PluginValidationError {
    /// Creates a validation error with a single reason.
    #[must_use]
    pub fn new(plugin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            reasons: vec![reason.into()],
        }
    }

    /// Creates a validation error from collected reasons.
    #[must_use]
    pub fn with_reasons(plugin: impl Into<String>, reasons: Vec<String>) -> Self {
        Self {
            plugin: plugin.into(),
            reasons,
        }
    }
}

/// Error raised when the declared-dependency graph of a load batch has a cycle.
///
/// Fatal for the whole batch; no partial load is attempted.
#[derive(Debug, Clone, Error)]
#[error("dependency cycle among plugins: {}", members.join(" -> "))]
pub struct DependencyCycleError {
    /// The plugins participating in (or downstream of) the cycle.
    pub members: Vec<String>,
}

impl DependencyCycleError {
    /// Creates a cycle error naming the unresolvable plugins.
    #[must_use]
    pub fn new(members: Vec<String>) -> Self {
        Self { members }
    }
}

/// Errors raised by [`PluginRegistry`](crate::plugins::PluginRegistry) operations.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// A key was registered twice without `allow_overwrite`.
    #[error("{category} entry '{key}' is already registered (pass allow_overwrite to replace it)")]
    DuplicateKey {
        /// The catalogue the collision happened in.
        category: ComponentCategory,
        /// The qualified `plugin.component` key.
        key: String,
    },
}

/// Error raised when a plugin requests a denylisted capability.
///
/// Raised from within the offending plugin's own initialization and treated
/// like any other load-time failure for that plugin.
#[derive(Debug, Clone, Error)]
#[error("plugin '{plugin}' denied capability '{capability}': {reason}")]
pub struct SandboxViolation {
    /// The plugin that requested the capability.
    pub plugin: String,
    /// The capability that was denied.
    pub capability: Capability,
    /// Why the capability is restricted.
    pub reason: String,
}
