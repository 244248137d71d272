//! Model configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default GGUF artifact.
pub const DEFAULT_MODEL_PATH: &str = "models/mistral-7b-instruct-v0.2.Q4_K_M.gguf";

/// Command operators run to download model artifacts.
pub const SETUP_COMMAND: &str = "./setup_models.sh";

/// Generative model configuration.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Path to the GGUF model file
    pub model_path: PathBuf,
    /// llama-server executable name or path
    pub server_binary: String,
    /// Context window in tokens
    pub context_window: u32,
    /// Layers offloaded to the GPU; negative offloads all of them
    pub gpu_layers: i32,
    /// Sampling temperature
    pub temperature: f32,
    /// How long to wait for the server to report healthy
    pub startup_timeout: Duration,
    /// Per-completion HTTP timeout; completions may run unbounded when unset
    pub request_timeout: Option<Duration>,
    /// Load the model at startup instead of on first request
    pub preload: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            server_binary: "llama-server".to_string(),
            context_window: 32768,
            gpu_layers: -1,
            temperature: 0.7,
            startup_timeout: Duration::from_secs(120),
            request_timeout: None,
            preload: false,
        }
    }
}

impl ModelConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model_path: std::env::var("LLM_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            server_binary: std::env::var("LLM_SERVER_BINARY").unwrap_or(defaults.server_binary),
            context_window: std::env::var("LLM_CONTEXT_WINDOW")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.context_window),
            gpu_layers: std::env::var("LLM_GPU_LAYERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.gpu_layers),
            temperature: std::env::var("LLM_TEMPERATURE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.temperature),
            startup_timeout: Duration::from_secs(
                std::env::var("LLM_STARTUP_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.startup_timeout.as_secs()),
            ),
            request_timeout: std::env::var("LLM_REQUEST_TIMEOUT")
                .ok()
                .map_or(defaults.request_timeout, |s| optional_secs(&s)),
            preload: std::env::var("LLM_PRELOAD")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.preload),
        }
    }

    /// `-ngl` argument for llama-server.
    pub fn gpu_layers_arg(&self) -> String {
        if self.gpu_layers < 0 {
            "999".to_string()
        } else {
            self.gpu_layers.to_string()
        }
    }
}

/// Seconds as an optional duration; `0` or garbage means no limit.
fn optional_secs(raw: &str) -> Option<Duration> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|s| *s > 0)
        .map(Duration::from_secs)
}
