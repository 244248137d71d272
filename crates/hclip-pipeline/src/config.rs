//! Pipeline configuration.

use std::path::PathBuf;

use hclip_models::DEFAULT_TARGET_DURATION;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory input videos are stored in
    pub work_dir: PathBuf,
    /// Directory clips are written to
    pub output_dir: PathBuf,
    /// Maximum heavy stages (scene scan, transcription, inference, cutting)
    /// running at once across all requests
    pub max_parallel_stages: usize,
    /// Keep normalized windows inside the source duration
    pub clamp_to_source: bool,
    /// Clip length when the caller gives none
    pub default_target_duration: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let work_dir = PathBuf::from("videos");
        Self {
            output_dir: work_dir.join("output"),
            work_dir,
            max_parallel_stages: 2,
            clamp_to_source: true,
            default_target_duration: DEFAULT_TARGET_DURATION,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let work_dir = std::env::var("PIPELINE_WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.work_dir);
        let output_dir = std::env::var("PIPELINE_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| work_dir.join("output"));

        Self {
            work_dir,
            output_dir,
            max_parallel_stages: std::env::var("PIPELINE_MAX_PARALLEL_STAGES")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_parallel_stages),
            clamp_to_source: std::env::var("PIPELINE_CLAMP_TO_SOURCE")
                .map(|v| !(v == "0" || v.eq_ignore_ascii_case("false")))
                .unwrap_or(defaults.clamp_to_source),
            default_target_duration: std::env::var("PIPELINE_DEFAULT_TARGET_DURATION")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|d: &f64| d.is_finite() && *d > 0.0)
                .unwrap_or(defaults.default_target_duration),
        }
    }
}
