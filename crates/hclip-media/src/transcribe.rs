//! Speech transcription with the whisper.cpp CLI.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use hclip_models::{TranscriptSegment, VideoAsset};

use crate::command::{check_tool, stderr_tail, FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_media;

/// Sample rate whisper models are trained on.
const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// Computes an ordered, timestamped transcript for a video.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe the asset's speech. Inputs without audio yield an empty list.
    async fn transcribe(&self, asset: &VideoAsset) -> MediaResult<Vec<TranscriptSegment>>;
}

/// Transcriber configuration.
#[derive(Debug, Clone)]
pub struct TranscriberConfig {
    /// whisper.cpp executable name or path
    pub binary: String,
    /// Directory holding `ggml-<size>.bin` model files
    pub models_dir: PathBuf,
    /// Model size (tiny, base, small, medium, large-v3, ...)
    pub model_size: String,
    /// Spoken language hint, or `auto`
    pub language: String,
    /// Worker threads for whisper
    pub threads: usize,
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            binary: "whisper-cli".to_string(),
            models_dir: PathBuf::from("models"),
            model_size: "base".to_string(),
            language: "auto".to_string(),
            threads: 4,
        }
    }
}

impl TranscriberConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            binary: std::env::var("WHISPER_BINARY").unwrap_or(defaults.binary),
            models_dir: std::env::var("WHISPER_MODELS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.models_dir),
            model_size: std::env::var("WHISPER_MODEL_SIZE").unwrap_or(defaults.model_size),
            language: std::env::var("WHISPER_LANGUAGE").unwrap_or(defaults.language),
            threads: std::env::var("WHISPER_THREADS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|t| *t > 0)
                .unwrap_or(defaults.threads),
        }
    }

    /// Path of the ggml model file for the configured size.
    pub fn model_path(&self) -> PathBuf {
        self.models_dir.join(format!("ggml-{}.bin", self.model_size))
    }
}

/// Transcriber that shells out to `whisper-cli`.
#[derive(Debug, Clone)]
pub struct WhisperCliTranscriber {
    config: TranscriberConfig,
    runner: FfmpegRunner,
}

impl WhisperCliTranscriber {
    pub fn new(config: TranscriberConfig) -> Self {
        Self {
            config,
            runner: FfmpegRunner::new(),
        }
    }

    pub fn config(&self) -> &TranscriberConfig {
        &self.config
    }

    /// Extract a 16 kHz mono WAV track.
    async fn extract_audio(&self, input: &Path, output: &Path) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(input, output)
            .no_video()
            .pcm_mono(WHISPER_SAMPLE_RATE);
        self.runner.run(&cmd).await
    }

    async fn run_whisper(&self, audio: &Path, output_base: &Path) -> MediaResult<PathBuf> {
        let model = self.config.model_path();

        let output = Command::new(&self.config.binary)
            .arg("-m")
            .arg(&model)
            .arg("-f")
            .arg(audio)
            .arg("-l")
            .arg(&self.config.language)
            .arg("-t")
            .arg(self.config.threads.to_string())
            .arg("-oj")
            .arg("-of")
            .arg(output_base)
            .arg("-np")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::TranscriptionFailed(stderr_tail(&stderr)));
        }

        Ok(output_base.with_extension("json"))
    }
}

#[async_trait]
impl Transcriber for WhisperCliTranscriber {
    async fn transcribe(&self, asset: &VideoAsset) -> MediaResult<Vec<TranscriptSegment>> {
        let info = probe_media(asset.path()).await?;
        if !info.has_audio {
            info!(asset_id = %asset.id, "No audio stream, skipping transcription");
            return Ok(Vec::new());
        }

        let model = self.config.model_path();
        if !model.exists() {
            return Err(MediaError::model_not_found(model.display().to_string()));
        }
        check_tool(&self.config.binary)?;

        // Removed when dropped, on every exit path
        let scratch = tempfile::Builder::new().prefix("hclip-audio-").tempdir()?;
        let audio = scratch.path().join("audio.wav");

        self.extract_audio(asset.path(), &audio).await?;
        debug!(asset_id = %asset.id, audio = %audio.display(), "Audio extracted");

        let json_path = self
            .run_whisper(&audio, &scratch.path().join("transcript"))
            .await?;
        let raw = tokio::fs::read(&json_path).await?;
        let segments = parse_whisper_json(&raw)?;

        info!(
            asset_id = %asset.id,
            segments = segments.len(),
            model = %self.config.model_size,
            "Transcription complete"
        );
        Ok(segments)
    }
}

#[derive(Debug, Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    transcription: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    offsets: WhisperOffsets,
    text: String,
}

#[derive(Debug, Deserialize)]
struct WhisperOffsets {
    from: u64,
    to: u64,
}

/// Convert whisper.cpp `-oj` output into ordered transcript segments.
pub fn parse_whisper_json(raw: &[u8]) -> MediaResult<Vec<TranscriptSegment>> {
    let output: WhisperOutput = serde_json::from_slice(raw)?;

    let mut segments: Vec<TranscriptSegment> = output
        .transcription
        .into_iter()
        .filter(|s| !s.text.trim().is_empty())
        .map(|s| {
            TranscriptSegment::new(
                s.offsets.from as f64 / 1000.0,
                s.offsets.to as f64 / 1000.0,
                s.text.trim(),
            )
        })
        .collect();

    segments.sort_by(|a, b| a.start.total_cmp(&b.start));
    Ok(segments)
}
