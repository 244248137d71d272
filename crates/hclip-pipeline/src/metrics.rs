//! Pipeline metrics.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const STAGE_DURATION_SECONDS: &str = "hclip_stage_duration_seconds";
    pub const PIPELINE_RUNS_TOTAL: &str = "hclip_pipeline_runs_total";
    pub const PIPELINE_RUN_DURATION_SECONDS: &str = "hclip_pipeline_run_duration_seconds";
}

/// Record how long one heavy stage held its permit.
pub fn record_stage_duration(stage: &str, duration_secs: f64) {
    let labels = [("stage", stage.to_string())];
    histogram!(names::STAGE_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a finished run. `outcome` is `success` or an error code.
pub fn record_run(outcome: &str, duration_secs: f64) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::PIPELINE_RUNS_TOTAL, &labels).increment(1);
    histogram!(names::PIPELINE_RUN_DURATION_SECONDS, &labels).record(duration_secs);
}
