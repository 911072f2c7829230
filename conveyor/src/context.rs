//! The mutable unit-of-work state carried through one pipeline run.

use crate::core::PipelineResult;
use crate::events::{EventSink, NoOpEventSink};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Shared context passed between pipeline stages.
///
/// Holds the items being processed, run configuration, cross-run session
/// state, free-form metadata for stage-to-stage signalling, and the results
/// appended by the executor after each stage. Fields are lock-guarded so
/// stages can work through a shared reference, but a context is exclusively
/// owned by one in-flight `execute()` call: no other run may mutate it
/// concurrently.
pub struct PipelineContext {
    /// Run identity, assigned at construction.
    run_id: Uuid,
    /// Optional resumption key, owned by an external state collaborator.
    session_id: RwLock<Option<String>>,
    /// When this context was created.
    started_at: DateTime<Utc>,
    /// The domain records being processed. Opaque to the core.
    items: RwLock<Vec<serde_json::Value>>,
    /// Run configuration.
    config: RwLock<HashMap<String, serde_json::Value>>,
    /// Cross-run resumption bookkeeping.
    session_state: RwLock<HashMap<String, serde_json::Value>>,
    /// Free-form stage-to-stage signalling (discovered targets, etc).
    metadata: RwLock<HashMap<String, serde_json::Value>>,
    /// Per-stage results, appended by the executor in execution order.
    stage_results: RwLock<Vec<PipelineResult>>,
    /// Event sink for emitting run events.
    event_sink: Arc<dyn EventSink>,
}

impl PipelineContext {
    /// Creates a new empty context with a fresh run id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            session_id: RwLock::new(None),
            started_at: Utc::now(),
            items: RwLock::new(Vec::new()),
            config: RwLock::new(HashMap::new()),
            session_state: RwLock::new(HashMap::new()),
            metadata: RwLock::new(HashMap::new()),
            stage_results: RwLock::new(Vec::new()),
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the run configuration.
    #[must_use]
    pub fn with_config(self, config: HashMap<String, serde_json::Value>) -> Self {
        *self.config.write() = config;
        self
    }

    /// Sets the session id.
    #[must_use]
    pub fn with_session_id(self, session_id: impl Into<String>) -> Self {
        *self.session_id.write() = Some(session_id.into());
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the session id, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    /// Returns when this context was created.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns a copy of the items.
    #[must_use]
    pub fn items(&self) -> Vec<serde_json::Value> {
        self.items.read().clone()
    }

    /// Returns the number of items.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.items.read().len()
    }

    /// Replaces the items.
    pub fn set_items(&self, items: Vec<serde_json::Value>) {
        *self.items.write() = items;
    }

    /// Appends new items.
    pub fn add_items(&self, new_items: Vec<serde_json::Value>) {
        self.items.write().extend(new_items);
    }

    /// Keeps only items matching the predicate.
    pub fn retain_items<F>(&self, predicate: F)
    where
        F: FnMut(&serde_json::Value) -> bool,
    {
        self.items.write().retain(predicate);
    }

    /// Gets a configuration value.
    #[must_use]
    pub fn get_config(&self, key: &str) -> Option<serde_json::Value> {
        self.config.read().get(key).cloned()
    }

    /// Sets a configuration value.
    pub fn set_config(&self, key: impl Into<String>, value: serde_json::Value) {
        self.config.write().insert(key.into(), value);
    }

    /// Gets a metadata value.
    #[must_use]
    pub fn get_metadata(&self, key: &str) -> Option<serde_json::Value> {
        self.metadata.read().get(key).cloned()
    }

    /// Sets a metadata value.
    pub fn set_metadata(&self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata.write().insert(key.into(), value);
    }

    /// Gets a session-state value.
    #[must_use]
    pub fn get_session_value(&self, key: &str) -> Option<serde_json::Value> {
        self.session_state.read().get(key).cloned()
    }

    /// Sets a session-state value.
    pub fn set_session_value(&self, key: impl Into<String>, value: serde_json::Value) {
        self.session_state.write().insert(key.into(), value);
    }

    /// Returns the result a named stage produced, if it has run.
    #[must_use]
    pub fn stage_result(&self, stage_name: &str) -> Option<PipelineResult> {
        self.stage_results
            .read()
            .iter()
            .find(|r| r.stage_name == stage_name)
            .cloned()
    }

    /// Returns all stage results in execution order.
    #[must_use]
    pub fn stage_results(&self) -> Vec<PipelineResult> {
        self.stage_results.read().clone()
    }

    /// Appends a stage result. Called by the executor only; stage names are
    /// validated unique before the run starts.
    pub(crate) fn record_stage_result(&self, result: PipelineResult) {
        self.stage_results.write().push(result);
    }

    /// Emits an event through the sink, enriched with run identity.
    pub fn try_emit_event(&self, event_type: &str, data: Option<serde_json::Value>) {
        let mut enriched = data.unwrap_or_else(|| serde_json::json!({}));

        if let serde_json::Value::Object(ref mut map) = enriched {
            map.insert(
                "run_id".to_string(),
                serde_json::json!(self.run_id.to_string()),
            );
            if let Some(session_id) = self.session_id() {
                map.insert("session_id".to_string(), serde_json::json!(session_id));
            }
        }

        self.event_sink.try_emit(event_type, Some(enriched));
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("run_id", &self.run_id)
            .field("items", &self.items.read().len())
            .field("stage_results", &self.stage_results.read().len())
            .finish()
    }
}
