//! Core pipeline data types.
//!
//! This module provides the result type every stage returns and the
//! run-level metrics the executor aggregates from those results.

mod metrics;
mod result;

pub use metrics::ExecutionMetrics;
pub use result::PipelineResult;
