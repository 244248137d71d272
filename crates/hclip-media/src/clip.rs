//! Clip extraction.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use hclip_models::{AssetId, VideoAsset};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{ensure_dir, remove_file_best_effort};

/// Cuts `[start, end)` out of a video into a new asset.
#[async_trait]
pub trait ClipExtractor: Send + Sync {
    async fn cut(&self, asset: &VideoAsset, start: f64, end: f64) -> MediaResult<VideoAsset>;
}

/// Encoding settings for extracted clips.
#[derive(Debug, Clone)]
pub struct ClipEncoding {
    pub codec: String,
    pub preset: String,
    pub crf: u8,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl Default for ClipEncoding {
    fn default() -> Self {
        Self {
            codec: "libx264".to_string(),
            preset: "medium".to_string(),
            crf: 23,
            audio_codec: "aac".to_string(),
            audio_bitrate: "128k".to_string(),
        }
    }
}

impl ClipEncoding {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            codec: std::env::var("CLIP_VIDEO_CODEC").unwrap_or(defaults.codec),
            preset: std::env::var("CLIP_PRESET").unwrap_or(defaults.preset),
            crf: std::env::var("CLIP_CRF")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|c| *c <= 51)
                .unwrap_or(defaults.crf),
            audio_codec: std::env::var("CLIP_AUDIO_CODEC").unwrap_or(defaults.audio_codec),
            audio_bitrate: std::env::var("CLIP_AUDIO_BITRATE").unwrap_or(defaults.audio_bitrate),
        }
    }
}

/// FFmpeg re-encoding clip extractor writing into a fixed output directory.
#[derive(Debug, Clone)]
pub struct FfmpegClipExtractor {
    output_dir: PathBuf,
    encoding: ClipEncoding,
    runner: FfmpegRunner,
}

impl FfmpegClipExtractor {
    pub fn new(output_dir: impl Into<PathBuf>, encoding: ClipEncoding) -> Self {
        Self {
            output_dir: output_dir.into(),
            encoding,
            runner: FfmpegRunner::new(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Destination for the clip of `asset`.
    pub fn output_path_for(&self, asset: &VideoAsset) -> PathBuf {
        self.output_dir.join(clip_file_name(asset))
    }

    fn build_command(&self, input: &Path, output: &Path, start: f64, end: f64) -> FfmpegCommand {
        FfmpegCommand::new(input, output)
            .seek(start)
            .duration(end - start)
            .video_codec(&self.encoding.codec)
            .preset(&self.encoding.preset)
            .crf(self.encoding.crf)
            .audio_codec(&self.encoding.audio_codec)
            .audio_bitrate(&self.encoding.audio_bitrate)
            .output_args(["-movflags", "+faststart"])
    }
}

/// `highlight_<stem>.mp4`
pub fn clip_file_name(asset: &VideoAsset) -> String {
    format!("highlight_{}.mp4", asset.stem())
}

/// Create `output` empty, failing if anything is already there.
///
/// Once claimed, the file belongs to this extraction and may be overwritten
/// or removed by it.
pub async fn claim_output(output: &Path) -> MediaResult<()> {
    match tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(output)
        .await
    {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            Err(MediaError::OutputExists(output.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Check a clip range is cuttable.
pub fn validate_range(start: f64, end: f64) -> MediaResult<()> {
    if !start.is_finite() || !end.is_finite() || start < 0.0 || end <= start {
        return Err(MediaError::InvalidRange { start, end });
    }
    Ok(())
}

#[async_trait]
impl ClipExtractor for FfmpegClipExtractor {
    async fn cut(&self, asset: &VideoAsset, start: f64, end: f64) -> MediaResult<VideoAsset> {
        validate_range(start, end)?;

        let output = self.output_path_for(asset);
        ensure_dir(&self.output_dir).await?;
        claim_output(&output).await?;

        info!(
            "Extracting clip: {} -> {} (start: {:.2}s, end: {:.2}s)",
            asset.path().display(),
            output.display(),
            start,
            end
        );

        let cmd = self.build_command(asset.path(), &output, start, end);
        if let Err(e) = self.runner.run(&cmd).await {
            warn!(error = %e, "Clip extraction failed, removing partial output");
            remove_file_best_effort(&output).await;
            return Err(e);
        }

        let written = tokio::fs::metadata(&output).await.map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            remove_file_best_effort(&output).await;
            return Err(MediaError::internal(format!(
                "FFmpeg reported success but {} is empty",
                output.display()
            )));
        }

        info!("Clip extracted: {}", output.display());
        Ok(VideoAsset::new(AssetId::new(), output))
    }
}
