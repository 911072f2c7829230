//! The outcome object a stage returns.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Result object returned by each pipeline stage.
///
/// Tracks success, counts, and structured errors/warnings for one stage
/// execution, plus a free-form `data` map for stage-specific output.
///
/// Two invariants are maintained automatically: `error_count` always equals
/// `errors.len()`, and `success` is forced to `false` the moment any error
/// is added.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Name of the stage that produced this result.
    pub stage_name: String,

    /// Whether the stage completed successfully.
    pub success: bool,

    /// Number of items processed.
    pub processed_count: u64,

    /// Number of errors encountered.
    pub error_count: u64,

    /// Error messages, in the order they occurred.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,

    /// Non-fatal warnings from stage execution.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    /// Stage-specific result data.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, serde_json::Value>,

    /// Wall-clock execution time in milliseconds, stamped by the executor.
    #[serde(default)]
    pub duration_ms: f64,
}

impl PipelineResult {
    /// Creates a successful empty result for the named stage.
    #[must_use]
    pub fn new(stage_name: impl Into<String>) -> Self {
        Self {
            stage_name: stage_name.into(),
            success: true,
            processed_count: 0,
            error_count: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
            data: HashMap::new(),
            duration_ms: 0.0,
        }
    }

    /// Creates a failed result carrying a single error.
    #[must_use]
    pub fn failed(stage_name: impl Into<String>, error: impl Into<String>) -> Self {
        let mut result = Self::new(stage_name);
        result.add_error(error);
        result
    }

    /// Sets the processed-item count.
    #[must_use]
    pub fn with_processed_count(mut self, count: u64) -> Self {
        self.processed_count = count;
        self
    }

    /// Adds an error, updating `error_count` and forcing `success` to false.
    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.error_count += 1;
        self.success = false;
    }

    /// Adds a non-fatal warning.
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Sets a result data value.
    pub fn set_data(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.data.insert(key.into(), value);
    }

    /// Gets a result data value.
    #[must_use]
    pub fn get_data(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_result_is_successful() {
        let result = PipelineResult::new("fetch");
        assert_eq!(result.stage_name, "fetch");
        assert!(result.success);
        assert_eq!(result.error_count, 0);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_add_error_forces_failure() {
        let mut result = PipelineResult::new("fetch");
        result.add_error("connection refused");
        result.add_error("timed out");

        assert!(!result.success);
        assert_eq!(result.error_count, 2);
        assert_eq!(result.error_count as usize, result.errors.len());
    }

    #[test]
    fn test_warnings_do_not_fail_result() {
        let mut result = PipelineResult::new("fetch");
        result.add_warning("slow response");

        assert!(result.success);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_data_round_trip() {
        let mut result = PipelineResult::new("export");
        result.set_data("written", serde_json::json!(42));

        assert_eq!(result.get_data("written"), Some(&serde_json::json!(42)));
        assert_eq!(result.get_data("missing"), None);
    }

    #[test]
    fn test_failed_constructor() {
        let result = PipelineResult::failed("fetch", "boom");
        assert!(!result.success);
        assert_eq!(result.errors, vec!["boom"]);
    }
}
