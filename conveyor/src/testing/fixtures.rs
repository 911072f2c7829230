//! Concrete fixture implementations.

use crate::context::PipelineContext;
use crate::core::PipelineResult;
use crate::plugins::manifest::PluginInfo;
use crate::plugins::sandbox::{Capability, HostEnv};
use crate::plugins::traits::{
    ContentHandler, Exporter, FormatInfo, ItemFilter, PluginComponent, PluginModule, Scraper,
};
use crate::stages::PipelineStage;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A stage that counts how often each hook runs.
#[derive(Debug, Default)]
struct HookCounts {
    pre: AtomicUsize,
    process: AtomicUsize,
    post: AtomicUsize,
}

/// A stage that records its invocations and optionally fails.
#[derive(Debug)]
pub struct RecordingStage {
    name: String,
    fail: bool,
    counts: Arc<HookCounts>,
}

impl RecordingStage {
    /// Creates a succeeding recording stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fail: false,
            counts: Arc::new(HookCounts::default()),
        }
    }

    /// How many times `process` ran.
    #[must_use]
    pub fn invocations(&self) -> usize {
        self.counts.process.load(Ordering::SeqCst)
    }

    /// How many times `pre_process` ran.
    #[must_use]
    pub fn pre_invocations(&self) -> usize {
        self.counts.pre.load(Ordering::SeqCst)
    }

    /// How many times `post_process` ran.
    #[must_use]
    pub fn post_invocations(&self) -> usize {
        self.counts.post.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PipelineStage for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn pre_process(&self, _ctx: &PipelineContext) {
        self.counts.pre.fetch_add(1, Ordering::SeqCst);
    }

    async fn process(&self, _ctx: &PipelineContext) -> PipelineResult {
        self.counts.process.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            PipelineResult::failed(&self.name, "recording stage configured to fail")
        } else {
            PipelineResult::new(&self.name)
        }
    }

    async fn post_process(&self, _ctx: &PipelineContext, _result: &PipelineResult) {
        self.counts.post.fetch_add(1, Ordering::SeqCst);
    }
}

/// A stage that always fails, recording its invocations.
#[derive(Debug)]
pub struct FailingStage(RecordingStage);

impl FailingStage {
    /// Creates a failing stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let mut inner = RecordingStage::new(name);
        inner.fail = true;
        Self(inner)
    }

    /// How many times `process` ran.
    #[must_use]
    pub fn invocations(&self) -> usize {
        self.0.invocations()
    }
}

#[async_trait]
impl PipelineStage for FailingStage {
    fn name(&self) -> &str {
        self.0.name()
    }

    async fn pre_process(&self, ctx: &PipelineContext) {
        self.0.pre_process(ctx).await;
    }

    async fn process(&self, ctx: &PipelineContext) -> PipelineResult {
        self.0.process(ctx).await
    }

    async fn post_process(&self, ctx: &PipelineContext, result: &PipelineResult) {
        self.0.post_process(ctx, result).await;
    }
}

/// A content handler claiming a fixed set of content types.
#[derive(Debug, Clone)]
pub struct StaticContentHandler {
    types: Vec<String>,
}

impl StaticContentHandler {
    /// Creates a handler for the given content types.
    #[must_use]
    pub fn new(types: Vec<String>) -> Self {
        Self { types }
    }
}

#[async_trait]
impl ContentHandler for StaticContentHandler {
    fn can_handle(&self, content_type: &str, _item: &serde_json::Value) -> bool {
        self.types.iter().any(|t| t == content_type)
    }

    async fn process(
        &self,
        item: &serde_json::Value,
        _config: &HashMap<String, serde_json::Value>,
    ) -> anyhow::Result<serde_json::Value> {
        Ok(item.clone())
    }

    fn supported_types(&self) -> Vec<String> {
        self.types.clone()
    }
}

/// A filter matching a fixed criterion that passes everything through.
#[derive(Debug, Clone)]
pub struct StaticItemFilter {
    criteria: Vec<String>,
}

impl StaticItemFilter {
    /// Creates a filter with the given criteria.
    #[must_use]
    pub fn new(criteria: Vec<String>) -> Self {
        Self { criteria }
    }
}

impl ItemFilter for StaticItemFilter {
    fn apply(
        &self,
        items: Vec<serde_json::Value>,
        _config: &HashMap<String, serde_json::Value>,
    ) -> Vec<serde_json::Value> {
        items
    }

    fn criteria(&self) -> Vec<String> {
        self.criteria.clone()
    }
}

/// An exporter advertising a fixed format that writes nothing.
#[derive(Debug, Clone)]
pub struct StaticExporter {
    format_name: String,
}

impl StaticExporter {
    /// Creates an exporter for the given format name.
    #[must_use]
    pub fn new(format_name: impl Into<String>) -> Self {
        Self {
            format_name: format_name.into(),
        }
    }
}

impl Exporter for StaticExporter {
    fn export(
        &self,
        _data: &serde_json::Value,
        _output_path: &std::path::Path,
        _config: &HashMap<String, serde_json::Value>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn format(&self) -> FormatInfo {
        FormatInfo {
            name: self.format_name.clone(),
            extension: self.format_name.clone(),
            description: "fixture format".to_string(),
        }
    }
}

/// A scraper claiming fixed source types that returns no items.
#[derive(Debug, Clone)]
pub struct StaticScraper {
    sources: Vec<String>,
}

impl StaticScraper {
    /// Creates a scraper for the given source types.
    #[must_use]
    pub fn new(sources: Vec<String>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl Scraper for StaticScraper {
    fn can_scrape(&self, source_type: &str, _source_config: &serde_json::Value) -> bool {
        self.sources.iter().any(|s| s == source_type)
    }

    async fn scrape(
        &self,
        _source_config: &serde_json::Value,
    ) -> anyhow::Result<Vec<serde_json::Value>> {
        Ok(Vec::new())
    }

    fn supported_sources(&self) -> Vec<String> {
        self.sources.clone()
    }
}

/// A configurable plugin module for tests.
#[derive(Clone)]
pub struct FixturePlugin {
    info: PluginInfo,
    components: Vec<PluginComponent>,
    required_capability: Option<Capability>,
    cleanups: Arc<AtomicUsize>,
}

impl FixturePlugin {
    /// Creates an empty fixture plugin.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            info: PluginInfo {
                name: name.into(),
                version: "1.0.0".to_string(),
                description: "fixture plugin".to_string(),
                author: Some("fixtures".to_string()),
                dependencies: Vec::new(),
            },
            components: Vec::new(),
            required_capability: None,
            cleanups: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Declares a dependency on another plugin.
    #[must_use]
    pub fn with_dependency(mut self, dependency: impl Into<String>) -> Self {
        self.info.dependencies.push(dependency.into());
        self
    }

    /// Adds a content handler for one content type.
    #[must_use]
    pub fn with_content_handler(
        mut self,
        name: impl Into<String>,
        content_type: impl Into<String>,
        priority: i32,
    ) -> Self {
        self.components.push(PluginComponent::ContentHandler {
            name: name.into(),
            priority,
            handler: Arc::new(StaticContentHandler::new(vec![content_type.into()])),
        });
        self
    }

    /// Adds a filter for one criterion.
    #[must_use]
    pub fn with_filter(
        mut self,
        name: impl Into<String>,
        criterion: impl Into<String>,
        priority: i32,
    ) -> Self {
        self.components.push(PluginComponent::Filter {
            name: name.into(),
            priority,
            filter: Arc::new(StaticItemFilter::new(vec![criterion.into()])),
        });
        self
    }

    /// Adds an exporter for one format.
    #[must_use]
    pub fn with_exporter(
        mut self,
        name: impl Into<String>,
        format: impl Into<String>,
        priority: i32,
    ) -> Self {
        self.components.push(PluginComponent::Exporter {
            name: name.into(),
            priority,
            exporter: Arc::new(StaticExporter::new(format)),
        });
        self
    }

    /// Adds a scraper for one source type.
    #[must_use]
    pub fn with_scraper(
        mut self,
        name: impl Into<String>,
        source_type: impl Into<String>,
        priority: i32,
    ) -> Self {
        self.components.push(PluginComponent::Scraper {
            name: name.into(),
            priority,
            scraper: Arc::new(StaticScraper::new(vec![source_type.into()])),
        });
        self
    }

    /// Makes `initialize` request a capability from the sandbox.
    #[must_use]
    pub fn with_required_capability(mut self, capability: Capability) -> Self {
        self.required_capability = Some(capability);
        self
    }

    /// How many times `cleanup` ran.
    #[must_use]
    pub fn cleanup_count(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }
}

impl PluginModule for FixturePlugin {
    fn info(&self) -> PluginInfo {
        self.info.clone()
    }

    fn components(&self) -> Vec<PluginComponent> {
        self.components.clone()
    }

    fn initialize(&self, host: &HostEnv) -> anyhow::Result<()> {
        if let Some(capability) = self.required_capability {
            host.require(capability)?;
        }
        Ok(())
    }

    fn cleanup(&self) {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for FixturePlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixturePlugin")
            .field("name", &self.info.name)
            .field("components", &self.components.len())
            .finish()
    }
}
