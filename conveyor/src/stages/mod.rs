//! Stage trait and adapters.
//!
//! Stages are the fundamental units of work in a conveyor pipeline.

use crate::context::PipelineContext;
use crate::core::PipelineResult;
use async_trait::async_trait;
use std::fmt::Debug;

/// Trait for pipeline stages.
///
/// Each stage is one step of the processing pipeline. Stages communicate
/// through the shared [`PipelineContext`]; failure is expressed in the
/// returned [`PipelineResult`] rather than by unwinding, and the executor
/// applies the configured failure policy. Stages must not assume they run
/// more than once per executor instance, but must tolerate being
/// instantiated fresh per run if the host chooses to.
#[async_trait]
pub trait PipelineStage: Send + Sync {
    /// Returns the stage's stable identifier, unique within one executor.
    fn name(&self) -> &str;

    /// Validates the stage configuration.
    ///
    /// Returns human-readable problems; empty means valid. Called by the
    /// executor before any stage runs.
    fn validate_config(&self) -> Vec<String> {
        Vec::new()
    }

    /// Hook that runs before `process`. May observe side effects of every
    /// earlier stage's `post_process`.
    async fn pre_process(&self, _ctx: &PipelineContext) {}

    /// The stage's primary work.
    ///
    /// May perform blocking or suspendable I/O internally; that concurrency
    /// is private to the stage and invisible to the executor's sequencing.
    async fn process(&self, ctx: &PipelineContext) -> PipelineResult;

    /// Hook that always runs after `process`, on success or failure.
    ///
    /// Observes the exact result recorded in the context's stage results,
    /// for bookkeeping, metrics, or cleanup.
    async fn post_process(&self, _ctx: &PipelineContext, _result: &PipelineResult) {}
}

/// A function-backed stage.
pub struct FnStage<F>
where
    F: Fn(&PipelineContext) -> PipelineResult + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&PipelineContext) -> PipelineResult + Send + Sync,
{
    /// Creates a new function-backed stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&PipelineContext) -> PipelineResult + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> PipelineStage for FnStage<F>
where
    F: Fn(&PipelineContext) -> PipelineResult + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, ctx: &PipelineContext) -> PipelineResult {
        (self.func)(ctx)
    }
}

/// A no-op stage for testing and placeholders.
#[derive(Debug, Clone)]
pub struct NoOpStage {
    name: String,
}

impl NoOpStage {
    /// Creates a new no-op stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl PipelineStage for NoOpStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, _ctx: &PipelineContext) -> PipelineResult {
        PipelineResult::new(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fn_stage() {
        let stage = FnStage::new("count", |ctx: &PipelineContext| {
            PipelineResult::new("count").with_processed_count(ctx.item_count() as u64)
        });

        assert_eq!(stage.name(), "count");
        assert!(stage.validate_config().is_empty());

        let ctx = PipelineContext::new();
        ctx.add_items(vec![serde_json::json!({"id": 1})]);

        let result = stage.process(&ctx).await;
        assert!(result.success);
        assert_eq!(result.processed_count, 1);
    }

    #[tokio::test]
    async fn test_noop_stage() {
        let stage = NoOpStage::new("noop");
        let ctx = PipelineContext::new();

        let result = stage.process(&ctx).await;
        assert_eq!(result.stage_name, "noop");
        assert!(result.success);
    }
}
