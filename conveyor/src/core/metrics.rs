//! Run-level execution metrics.

use super::PipelineResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Aggregated metrics for one pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionMetrics {
    /// Total number of stages executed.
    pub total_stages: u64,

    /// Number of stages that completed successfully.
    pub successful_stages: u64,

    /// Number of stages that failed.
    pub failed_stages: u64,

    /// Total wall-clock time for the run in milliseconds.
    pub total_duration_ms: f64,

    /// Per-stage execution time in milliseconds.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub stage_times: HashMap<String, f64>,

    /// Total items processed across all stages.
    pub items_processed: u64,

    /// When the run started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the run finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl ExecutionMetrics {
    /// Creates empty metrics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one stage's result into the aggregates.
    pub fn record_stage(&mut self, result: &PipelineResult) {
        self.total_stages += 1;
        self.stage_times
            .insert(result.stage_name.clone(), result.duration_ms);
        self.items_processed += result.processed_count;

        if result.success {
            self.successful_stages += 1;
        } else {
            self.failed_stages += 1;
        }
    }
}
