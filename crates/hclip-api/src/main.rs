//! Axum API server binary.

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hclip_api::{create_router, metrics, ApiConfig, AppState};
use hclip_inference::{LlamaServerLoader, ModelConfig, SharedModel};
use hclip_media::{
    ClipEncoding, FfmpegClipExtractor, FfmpegSceneSegmenter, LocalAssetStore, SceneConfig,
    TranscriberConfig, WhisperCliTranscriber,
};
use hclip_pipeline::{HighlightPipeline, PipelineComponents, PipelineConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    info!("Starting hclip-api");

    let config = ApiConfig::from_env();
    info!("API config: host={}, port={}", config.host, config.port);

    let pipeline_config = PipelineConfig::from_env();
    let model_config = ModelConfig::from_env();
    let transcriber_config = TranscriberConfig::from_env();

    let required_tools = vec![
        "ffmpeg".to_string(),
        "ffprobe".to_string(),
        "yt-dlp".to_string(),
        transcriber_config.binary.clone(),
        model_config.server_binary.clone(),
    ];
    let preload = model_config.preload;
    let temperature = model_config.temperature;

    let components = PipelineComponents {
        store: Arc::new(LocalAssetStore::new(&pipeline_config.work_dir)),
        segmenter: Arc::new(FfmpegSceneSegmenter::new(SceneConfig::from_env())),
        transcriber: Arc::new(WhisperCliTranscriber::new(transcriber_config)),
        extractor: Arc::new(FfmpegClipExtractor::new(
            &pipeline_config.output_dir,
            ClipEncoding::from_env(),
        )),
        model: Arc::new(SharedModel::new(Arc::new(LlamaServerLoader::new(model_config)))),
    };
    let pipeline = HighlightPipeline::new(components, pipeline_config, temperature);
    let state = AppState::new(config.clone(), pipeline).with_required_tools(required_tools);

    if preload {
        info!("Preloading generative model");
        if let Err(e) = state.pipeline.model().acquire().await {
            // Not fatal: the first request retries the load
            warn!("Model preload failed: {}", e);
        }
    }

    let metrics_handle = if config.metrics_enabled {
        match metrics::init_metrics() {
            Ok(handle) => {
                info!("Prometheus metrics enabled at /metrics");
                Some(handle)
            }
            Err(e) => {
                error!("Failed to install Prometheus recorder: {}", e);
                None
            }
        }
    } else {
        None
    };

    let app = create_router(state, metrics_handle);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Colored output for dev, JSON when `LOG_FORMAT=json`.
fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("hclip=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Received shutdown signal");
}
