//! Sequential stage executor with configurable failure policy.

use crate::context::PipelineContext;
use crate::core::{ExecutionMetrics, PipelineResult};
use crate::errors::ExecutorError;
use crate::stages::PipelineStage;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// What the executor does when a stage reports failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorHandling {
    /// Log the failure and advance to the next stage regardless.
    #[default]
    Continue,
    /// Stop immediately between stages with a run-level failure naming the
    /// stage and its errors; later stages never execute.
    Halt,
}

impl std::str::FromStr for ErrorHandling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "continue" => Ok(Self::Continue),
            "halt" => Ok(Self::Halt),
            other => Err(format!("unknown error handling strategy: {other}")),
        }
    }
}

/// Orchestrates the execution of pipeline stages.
///
/// Owns an ordered list of stages and runs them strictly sequentially
/// against a [`PipelineContext`]. Stage order is deterministic and equals
/// insertion order unless explicitly reordered. At most one `execute()`
/// call is in progress per executor instance; a second call fails fast
/// rather than queuing.
pub struct PipelineExecutor {
    stages: Vec<Arc<dyn PipelineStage>>,
    error_handling: ErrorHandling,
    running: AtomicBool,
}

/// Clears the running flag even if a stage future is dropped mid-run.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl PipelineExecutor {
    /// Creates an executor with no stages and the default `continue` policy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            error_handling: ErrorHandling::default(),
            running: AtomicBool::new(false),
        }
    }

    /// Sets the failure policy.
    #[must_use]
    pub fn with_error_handling(mut self, error_handling: ErrorHandling) -> Self {
        self.error_handling = error_handling;
        self
    }

    /// Returns the configured failure policy.
    #[must_use]
    pub fn error_handling(&self) -> ErrorHandling {
        self.error_handling
    }

    /// Appends a stage at the end of the pipeline.
    pub fn add_stage(&mut self, stage: Arc<dyn PipelineStage>) {
        info!(stage = stage.name(), "Added stage");
        self.stages.push(stage);
    }

    /// Inserts a stage at the given position (clamped to the end).
    pub fn add_stage_at(&mut self, position: usize, stage: Arc<dyn PipelineStage>) {
        let position = position.min(self.stages.len());
        info!(stage = stage.name(), position, "Added stage");
        self.stages.insert(position, stage);
    }

    /// Removes a stage by name. Returns false if no stage matched.
    pub fn remove_stage(&mut self, stage_name: &str) -> bool {
        let before = self.stages.len();
        self.stages.retain(|s| s.name() != stage_name);
        let removed = self.stages.len() != before;
        if removed {
            info!(stage = stage_name, "Removed stage");
        } else {
            warn!(stage = stage_name, "Stage not found for removal");
        }
        removed
    }

    /// Gets a stage by name.
    #[must_use]
    pub fn get_stage(&self, stage_name: &str) -> Option<Arc<dyn PipelineStage>> {
        self.stages.iter().find(|s| s.name() == stage_name).cloned()
    }

    /// Reorders stages to match the supplied name list.
    ///
    /// The list must be a permutation of exactly the current stage names;
    /// otherwise no change is made and false is returned.
    pub fn reorder_stages(&mut self, stage_names: &[String]) -> bool {
        if stage_names.len() != self.stages.len() {
            warn!("Stage count mismatch in reorder operation");
            return false;
        }

        let unique: HashSet<&str> = stage_names.iter().map(String::as_str).collect();
        if unique.len() != stage_names.len() {
            warn!("Duplicate names in reorder operation");
            return false;
        }

        let mut reordered = Vec::with_capacity(self.stages.len());
        for name in stage_names {
            match self.get_stage(name) {
                Some(stage) => reordered.push(stage),
                None => {
                    warn!(stage = %name, "Stage not found for reordering");
                    return false;
                }
            }
        }

        self.stages = reordered;
        info!(order = ?stage_names, "Reordered stages");
        true
    }

    /// Returns the stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name().to_string()).collect()
    }

    /// Removes all stages.
    pub fn clear_stages(&mut self) {
        self.stages.clear();
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the pipeline has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Returns true if an `execute` call is currently in flight.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Executes the pipeline against the given context.
    ///
    /// Rejects re-entrant calls, validates the stage list before any stage
    /// runs, then drives each stage through `pre_process` → `process` →
    /// `post_process`, recording the timed result into
    /// `context.stage_results` before `post_process` observes it.
    ///
    /// # Errors
    ///
    /// `AlreadyRunning` if another execute is in flight, `Validation` if
    /// the stage list is invalid, `Halted` if a stage failed under the
    /// halt policy.
    pub async fn execute(&self, ctx: &PipelineContext) -> Result<ExecutionMetrics, ExecutorError> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ExecutorError::AlreadyRunning)?;
        let _guard = RunGuard(&self.running);

        let problems = self.validate_stages();
        if !problems.is_empty() {
            return Err(ExecutorError::Validation { problems });
        }

        let mut metrics = ExecutionMetrics::new();
        metrics.started_at = Some(Utc::now());
        let run_start = Instant::now();

        info!(
            stages = self.stages.len(),
            items = ctx.item_count(),
            "Starting pipeline execution"
        );

        for (i, stage) in self.stages.iter().enumerate() {
            let stage_name = stage.name().to_string();
            info!(
                stage = %stage_name,
                position = i + 1,
                total = self.stages.len(),
                "Executing stage"
            );
            ctx.try_emit_event(
                "stage.started",
                Some(serde_json::json!({ "stage": &stage_name })),
            );

            stage.pre_process(ctx).await;

            let stage_start = Instant::now();
            let mut result = stage.process(ctx).await;
            result.stage_name = stage_name.clone();
            result.duration_ms = stage_start.elapsed().as_secs_f64() * 1000.0;

            ctx.record_stage_result(result.clone());
            stage.post_process(ctx, &result).await;
            metrics.record_stage(&result);

            info!(
                stage = %stage_name,
                success = result.success,
                processed = result.processed_count,
                errors = result.error_count,
                duration_ms = result.duration_ms,
                "Stage completed"
            );

            if result.success {
                ctx.try_emit_event(
                    "stage.completed",
                    Some(serde_json::json!({
                        "stage": &stage_name,
                        "duration_ms": result.duration_ms,
                        "processed": result.processed_count,
                    })),
                );
            } else {
                ctx.try_emit_event(
                    "stage.failed",
                    Some(serde_json::json!({
                        "stage": &stage_name,
                        "errors": &result.errors,
                        "duration_ms": result.duration_ms,
                    })),
                );

                match self.error_handling {
                    ErrorHandling::Halt => {
                        warn!(stage = %stage_name, "Halting pipeline due to stage failure");
                        return Err(ExecutorError::Halted {
                            stage: stage_name,
                            errors: result.errors,
                        });
                    }
                    ErrorHandling::Continue => {
                        warn!(stage = %stage_name, "Continuing pipeline despite stage failure");
                    }
                }
            }
        }

        metrics.total_duration_ms = run_start.elapsed().as_secs_f64() * 1000.0;
        metrics.finished_at = Some(Utc::now());

        ctx.try_emit_event(
            "pipeline.completed",
            Some(serde_json::json!({
                "stages": metrics.total_stages,
                "failed": metrics.failed_stages,
                "duration_ms": metrics.total_duration_ms,
            })),
        );
        info!(
            successful = metrics.successful_stages,
            total = metrics.total_stages,
            duration_ms = metrics.total_duration_ms,
            "Pipeline execution completed"
        );

        Ok(metrics)
    }

    fn validate_stages(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.stages.is_empty() {
            problems.push("no stages configured in pipeline".to_string());
        }

        let mut seen = HashSet::new();
        for stage in &self.stages {
            if !seen.insert(stage.name().to_string()) {
                problems.push(format!("duplicate stage name: {}", stage.name()));
            }
            for problem in stage.validate_config() {
                problems.push(format!("stage '{}': {problem}", stage.name()));
            }
        }

        problems
    }
}

impl Default for PipelineExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PipelineExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineExecutor")
            .field("stages", &self.stage_names())
            .field("error_handling", &self.error_handling)
            .field("running", &self.is_running())
            .finish()
    }
}
