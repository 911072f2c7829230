//! End-to-end executor tests, including plugin-backed stages.

use crate::context::PipelineContext;
use crate::core::PipelineResult;
use crate::errors::ExecutorError;
use crate::events::CollectingEventSink;
use crate::pipeline::{ErrorHandling, PipelineExecutor};
use crate::plugins::{ItemFilter, PluginManager, PluginRegistry};
use crate::stages::PipelineStage;
use crate::testing::{FailingStage, FixturePlugin, RecordingStage};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct SlowStage {
    name: String,
    delay: Duration,
}

#[async_trait]
impl PipelineStage for SlowStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, _ctx: &PipelineContext) -> PipelineResult {
        tokio::time::sleep(self.delay).await;
        PipelineResult::new(&self.name)
    }
}

#[tokio::test]
async fn test_continue_policy_runs_every_stage_once() {
    let a = Arc::new(RecordingStage::new("a"));
    let b = Arc::new(FailingStage::new("b"));
    let c = Arc::new(RecordingStage::new("c"));

    let mut executor = PipelineExecutor::new().with_error_handling(ErrorHandling::Continue);
    executor.add_stage(a.clone());
    executor.add_stage(b.clone());
    executor.add_stage(c.clone());

    let ctx = PipelineContext::new();
    let metrics = executor.execute(&ctx).await.unwrap();

    assert_eq!(a.invocations(), 1);
    assert_eq!(b.invocations(), 1);
    assert_eq!(c.invocations(), 1);
    assert_eq!(metrics.total_stages, 3);
    assert_eq!(metrics.failed_stages, 1);
    assert_eq!(metrics.successful_stages, 2);
    assert_eq!(ctx.stage_results().len(), 3);
}

#[tokio::test]
async fn test_halt_policy_stops_before_later_stages() {
    let a = Arc::new(RecordingStage::new("a"));
    let b = Arc::new(FailingStage::new("b"));
    let c = Arc::new(RecordingStage::new("c"));

    let mut executor = PipelineExecutor::new().with_error_handling(ErrorHandling::Halt);
    executor.add_stage(a.clone());
    executor.add_stage(b.clone());
    executor.add_stage(c.clone());

    let ctx = PipelineContext::new();
    let err = executor.execute(&ctx).await.unwrap_err();

    match err {
        ExecutorError::Halted { stage, errors } => {
            assert_eq!(stage, "b");
            assert!(!errors.is_empty());
        }
        other => panic!("expected halt, got {other:?}"),
    }

    assert_eq!(a.invocations(), 1);
    assert_eq!(b.invocations(), 1);
    assert_eq!(c.invocations(), 0);
    // The failing stage's result is still recorded.
    assert_eq!(ctx.stage_results().len(), 2);
}

#[tokio::test]
async fn test_second_execute_fails_without_affecting_first() {
    let mut executor = PipelineExecutor::new();
    executor.add_stage(Arc::new(SlowStage {
        name: "slow".to_string(),
        delay: Duration::from_millis(100),
    }));
    let executor = Arc::new(executor);

    let first_ctx = Arc::new(PipelineContext::new());
    let first = {
        let executor = Arc::clone(&executor);
        let ctx = Arc::clone(&first_ctx);
        tokio::spawn(async move { executor.execute(&ctx).await })
    };

    // Let the first run get in flight, then collide with it.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(executor.is_running());
    let second_ctx = PipelineContext::new();
    let second = executor.execute(&second_ctx).await;
    assert!(matches!(second, Err(ExecutorError::AlreadyRunning)));

    let first = first.await.unwrap().unwrap();
    assert_eq!(first.successful_stages, 1);
    assert!(!executor.is_running());

    // The guard is released; the executor is usable again.
    let third = executor.execute(&PipelineContext::new()).await.unwrap();
    assert_eq!(third.total_stages, 1);
}

#[tokio::test]
async fn test_post_process_observes_recorded_result() {
    struct CheckingStage {
        observed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl PipelineStage for CheckingStage {
        fn name(&self) -> &str {
            "checking"
        }

        async fn process(&self, _ctx: &PipelineContext) -> PipelineResult {
            let mut result = PipelineResult::new("checking");
            result.set_data("marker", serde_json::json!(7));
            result
        }

        async fn post_process(&self, ctx: &PipelineContext, result: &PipelineResult) {
            let recorded = ctx.stage_result("checking").unwrap();
            let matches = recorded.get_data("marker") == result.get_data("marker")
                && recorded.duration_ms == result.duration_ms;
            self.observed.store(matches, Ordering::SeqCst);
        }
    }

    let observed = Arc::new(AtomicBool::new(false));
    let mut executor = PipelineExecutor::new();
    executor.add_stage(Arc::new(CheckingStage {
        observed: observed.clone(),
    }));

    executor.execute(&PipelineContext::new()).await.unwrap();
    assert!(observed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_executor_emits_lifecycle_events() {
    let sink = Arc::new(CollectingEventSink::new());
    let mut executor = PipelineExecutor::new();
    executor.add_stage(Arc::new(RecordingStage::new("only")));
    executor.add_stage(Arc::new(FailingStage::new("broken")));

    let ctx = PipelineContext::new().with_event_sink(sink.clone());
    executor.execute(&ctx).await.unwrap();

    let types = sink.event_types();
    assert_eq!(
        types,
        vec![
            "stage.started",
            "stage.completed",
            "stage.started",
            "stage.failed",
            "pipeline.completed",
        ]
    );
}

/// A filter that drops items below a score threshold.
struct ScoreFilter {
    minimum: i64,
}

impl ItemFilter for ScoreFilter {
    fn apply(
        &self,
        items: Vec<serde_json::Value>,
        config: &HashMap<String, serde_json::Value>,
    ) -> Vec<serde_json::Value> {
        let minimum = config
            .get("min_score")
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(self.minimum);
        items
            .into_iter()
            .filter(|item| item["score"].as_i64().unwrap_or(0) >= minimum)
            .collect()
    }

    fn criteria(&self) -> Vec<String> {
        vec!["score".to_string()]
    }
}

/// A stage that applies every enabled registry filter to the items.
struct FilterStage {
    registry: Arc<PluginRegistry>,
}

#[async_trait]
impl PipelineStage for FilterStage {
    fn name(&self) -> &str {
        "filter"
    }

    async fn process(&self, ctx: &PipelineContext) -> PipelineResult {
        let before = ctx.item_count() as u64;
        let config = HashMap::new();

        let mut items = ctx.items();
        for entry in self.registry.filters() {
            items = entry.instance.apply(items, &config);
        }
        ctx.set_items(items);

        let mut result = PipelineResult::new("filter").with_processed_count(before);
        result.set_data("remaining", serde_json::json!(ctx.item_count()));
        result
    }
}

#[tokio::test]
async fn test_plugin_contributed_filter_drives_a_stage() {
    let registry = Arc::new(PluginRegistry::new());
    let manager = PluginManager::new(registry.clone());

    struct ScoringPlugin;
    impl crate::plugins::PluginModule for ScoringPlugin {
        fn info(&self) -> crate::plugins::PluginInfo {
            crate::plugins::PluginInfo {
                name: "scoring".to_string(),
                version: "1.0.0".to_string(),
                description: "score-based filtering".to_string(),
                author: None,
                dependencies: Vec::new(),
            }
        }

        fn components(&self) -> Vec<crate::plugins::PluginComponent> {
            vec![crate::plugins::PluginComponent::Filter {
                name: "ScoreFilter".to_string(),
                priority: 50,
                filter: Arc::new(ScoreFilter { minimum: 10 }),
            }]
        }
    }

    manager.load_prebuilt(Arc::new(ScoringPlugin)).unwrap();

    let mut executor = PipelineExecutor::new();
    executor.add_stage(Arc::new(FilterStage {
        registry: registry.clone(),
    }));

    let ctx = PipelineContext::new();
    ctx.add_items(vec![
        serde_json::json!({"id": "keep", "score": 25}),
        serde_json::json!({"id": "drop", "score": 3}),
    ]);

    let metrics = executor.execute(&ctx).await.unwrap();

    assert_eq!(metrics.items_processed, 2);
    assert_eq!(ctx.item_count(), 1);
    assert_eq!(ctx.items()[0]["id"], "keep");
    assert_eq!(
        ctx.stage_result("filter").unwrap().get_data("remaining"),
        Some(&serde_json::json!(1))
    );

    // Disabling the contributing plugin makes the stage a pass-through
    // on the next run.
    manager.disable_plugin("scoring");
    let ctx2 = PipelineContext::new();
    ctx2.add_items(vec![
        serde_json::json!({"id": "keep", "score": 25}),
        serde_json::json!({"id": "low", "score": 1}),
    ]);
    executor.execute(&ctx2).await.unwrap();
    assert_eq!(ctx2.item_count(), 2);
}

#[tokio::test]
async fn test_fixture_plugin_components_reach_stage_queries() {
    let registry = Arc::new(PluginRegistry::new());
    let manager = PluginManager::new(registry.clone());
    manager
        .load_prebuilt(Arc::new(
            FixturePlugin::new("pack")
                .with_scraper("FeedScraper", "feed", 10)
                .with_scraper("PageScraper", "page", 90),
        ))
        .unwrap();

    let scrapers = registry.scrapers();
    assert_eq!(scrapers.len(), 2);
    // Ascending priority: lower numbers are tried first.
    assert_eq!(scrapers[0].component_name, "FeedScraper");
    assert!(scrapers[0].instance.can_scrape("feed", &serde_json::json!({})));
    assert!(!scrapers[0].instance.can_scrape("page", &serde_json::json!({})));
}
