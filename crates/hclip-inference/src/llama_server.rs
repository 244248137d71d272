//! llama.cpp server engine.
//!
//! The loader spawns `llama-server` on a free loopback port with the GGUF
//! artifact and waits for `/health` to report ready. Completions go through
//! the server's OpenAI-compatible `/v1/chat/completions` endpoint with the
//! answer constrained by a JSON schema.

use async_trait::async_trait;
use reqwest::Client;
use std::net::TcpListener;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::config::{ModelConfig, SETUP_COMMAND};
use crate::engine::InferenceEngine;
use crate::error::{InferenceError, InferenceResult};
use crate::handle::ModelLoader;
use crate::types::{ChatCompletionRequest, ChatCompletionResponse, CompletionRequest};

/// Interval between readiness probes during startup.
const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Bound on a single `/health` request.
const HEALTH_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Loader that starts a dedicated llama-server child process.
#[derive(Debug, Clone)]
pub struct LlamaServerLoader {
    config: ModelConfig,
}

impl LlamaServerLoader {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    fn spawn_server(&self, port: u16) -> InferenceResult<Child> {
        let child = Command::new(&self.config.server_binary)
            .arg("-m")
            .arg(&self.config.model_path)
            .arg("-c")
            .arg(self.config.context_window.to_string())
            .arg("-ngl")
            .arg(self.config.gpu_layers_arg())
            .arg("--host")
            .arg("127.0.0.1")
            .arg("--port")
            .arg(port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        Ok(child)
    }
}

/// Ask the OS for an unused loopback port.
fn free_port() -> InferenceResult<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

#[async_trait]
impl ModelLoader for LlamaServerLoader {
    async fn load(&self) -> InferenceResult<Box<dyn InferenceEngine>> {
        let path = &self.config.model_path;

        if !path.is_file() {
            return Err(InferenceError::unavailable(
                path,
                format!("Model file not found. Please run {} to download it.", SETUP_COMMAND),
            ));
        }

        which::which(&self.config.server_binary).map_err(|_| {
            InferenceError::unavailable(
                path,
                format!("'{}' not found in PATH", self.config.server_binary),
            )
        })?;

        let port = free_port()?;
        let mut child = self.spawn_server(port)?;
        let engine = LlamaServerEngine::connect(
            format!("http://127.0.0.1:{}", port),
            self.config.request_timeout,
        )?;

        info!(
            model = %path.display(),
            port = port,
            context_window = self.config.context_window,
            "Started llama-server, waiting for readiness"
        );

        let deadline = Instant::now() + self.config.startup_timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Err(InferenceError::unavailable(
                    path,
                    format!("llama-server exited during startup ({})", status),
                ));
            }
            if engine.health().await {
                break;
            }
            if Instant::now() >= deadline {
                warn!("llama-server not ready after {:?}, killing it", self.config.startup_timeout);
                let _ = child.kill().await;
                return Err(InferenceError::unavailable(
                    path,
                    format!(
                        "llama-server did not become ready within {} seconds",
                        self.config.startup_timeout.as_secs()
                    ),
                ));
            }
            tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
        }

        Ok(Box::new(engine.with_child(child)))
    }

    fn artifact(&self) -> &Path {
        &self.config.model_path
    }
}

/// Chat client for a running llama-server.
pub struct LlamaServerEngine {
    http: Client,
    base_url: String,
    /// Server process, killed when the engine is dropped
    _server: Option<Child>,
}

impl LlamaServerEngine {
    /// Connect to a server at `base_url` without owning its process.
    ///
    /// Completions wait indefinitely unless `request_timeout` is set.
    pub fn connect(
        base_url: impl Into<String>,
        request_timeout: Option<Duration>,
    ) -> InferenceResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(InferenceError::Network)?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            _server: None,
        })
    }

    /// Tie the server process lifetime to this engine.
    pub fn with_child(mut self, child: Child) -> Self {
        self._server = Some(child);
        self
    }

    /// Whether the server reports ready.
    pub async fn health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.http.get(&url).timeout(HEALTH_REQUEST_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("llama-server health check failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl InferenceEngine for LlamaServerEngine {
    async fn complete(&mut self, request: &CompletionRequest) -> InferenceResult<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        debug!("Sending chat completion to {}", url);

        let response = self
            .http
            .post(&url)
            .json(&ChatCompletionRequest::from(request))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::RequestFailed(format!(
                "llama-server returned {}: {}",
                status, body
            )));
        }

        let completion: ChatCompletionResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| InferenceError::InvalidResponse("completion has no content".to_string()))
    }

    fn name(&self) -> &str {
        "llama-server"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> CompletionRequest {
        CompletionRequest::new(
            vec![
                ChatMessage::system("You are a video editing assistant that outputs JSON."),
                ChatMessage::user("Transcript: ..."),
            ],
            0.7,
        )
        .with_schema(json!({"type": "object"}))
    }

    #[tokio::test]
    async fn test_complete_returns_message_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "response_format": {"type": "json_object", "schema": {"type": "object"}},
                "stream": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "{\"highlights\": []}"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut engine = LlamaServerEngine::connect(server.uri(), None).unwrap();
        let content = engine.complete(&request()).await.unwrap();
        assert_eq!(content, "{\"highlights\": []}");
    }

    #[tokio::test]
    async fn test_request_timeout_applies_only_when_set() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(400))
                    .set_body_json(json!({
                        "choices": [{"index": 0, "message": {"role": "assistant", "content": "{}"}}]
                    })),
            )
            .mount(&server)
            .await;

        let mut unbounded = LlamaServerEngine::connect(server.uri(), None).unwrap();
        assert_eq!(unbounded.complete(&request()).await.unwrap(), "{}");

        let mut bounded =
            LlamaServerEngine::connect(server.uri(), Some(Duration::from_millis(50))).unwrap();
        let err = bounded.complete(&request()).await.unwrap_err();
        assert!(matches!(err, InferenceError::Network(e) if e.is_timeout()));
    }

    #[tokio::test]
    async fn test_complete_maps_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("loading model"))
            .mount(&server)
            .await;

        let mut engine = LlamaServerEngine::connect(server.uri(), None).unwrap();
        let err = engine.complete(&request()).await.unwrap_err();
        assert!(matches!(err, InferenceError::RequestFailed(msg) if msg.contains("loading model")));
    }

    #[tokio::test]
    async fn test_complete_without_choices_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let mut engine = LlamaServerEngine::connect(server.uri(), None).unwrap();
        let err = engine.complete(&request()).await.unwrap_err();
        assert!(matches!(err, InferenceError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .mount(&server)
            .await;

        let engine = LlamaServerEngine::connect(server.uri(), None).unwrap();
        assert!(engine.health().await);

        let down = LlamaServerEngine::connect("http://127.0.0.1:9", None).unwrap();
        assert!(!down.health().await);
    }

    #[tokio::test]
    async fn test_missing_artifact_points_to_setup() {
        let dir = tempfile::TempDir::new().unwrap();
        let model_path = dir.path().join("absent.gguf");
        let loader = LlamaServerLoader::new(ModelConfig {
            model_path: model_path.clone(),
            ..Default::default()
        });

        let err = loader.load().await.err().unwrap();
        match err {
            InferenceError::ModelUnavailable { path, message } => {
                assert_eq!(path, model_path);
                assert!(message.contains("setup_models.sh"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
