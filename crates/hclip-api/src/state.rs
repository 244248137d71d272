//! Application state.

use std::sync::Arc;

use hclip_pipeline::HighlightPipeline;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pipeline: Arc<HighlightPipeline>,
    /// Executables the readiness probe looks up on PATH
    pub required_tools: Arc<Vec<String>>,
}

impl AppState {
    pub fn new(config: ApiConfig, pipeline: HighlightPipeline) -> Self {
        Self {
            config,
            pipeline: Arc::new(pipeline),
            required_tools: Arc::new(vec!["ffmpeg".to_string(), "ffprobe".to_string()]),
        }
    }

    pub fn with_required_tools(mut self, tools: Vec<String>) -> Self {
        self.required_tools = Arc::new(tools);
        self
    }
}
