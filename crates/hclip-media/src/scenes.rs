//! Scene segmentation.
//!
//! Cuts are found with FFmpeg's scene-change score: frames whose score
//! exceeds the threshold pass `select` and are reported by `showinfo` on
//! stderr. The cut timestamps, together with the start and the probed
//! duration, partition the video into scenes.

use async_trait::async_trait;
use tracing::{debug, info};

use hclip_models::{SceneBoundary, VideoAsset};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_media, MediaInfo};

/// Computes ordered scene boundaries for a video.
#[async_trait]
pub trait SceneSegmenter: Send + Sync {
    /// Detect scenes; deterministic for a given asset and configuration.
    async fn detect(&self, asset: &VideoAsset) -> MediaResult<Vec<SceneBoundary>>;

    /// Duration of the source in seconds.
    async fn source_duration(&self, asset: &VideoAsset) -> MediaResult<f64>;
}

/// Scene detection configuration.
#[derive(Debug, Clone)]
pub struct SceneConfig {
    /// Scene-change score in `[0, 1]` above which a frame starts a new scene
    pub threshold: f64,
    /// Scenes shorter than this (seconds) are merged into the previous one
    pub min_scene_len: f64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            min_scene_len: 0.5,
        }
    }
}

impl SceneConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            threshold: std::env::var("SCENE_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|t: &f64| (0.0..=1.0).contains(t))
                .unwrap_or(defaults.threshold),
            min_scene_len: std::env::var("SCENE_MIN_LEN")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|l: &f64| *l >= 0.0)
                .unwrap_or(defaults.min_scene_len),
        }
    }
}

/// FFmpeg-backed scene segmenter.
#[derive(Debug, Clone, Default)]
pub struct FfmpegSceneSegmenter {
    config: SceneConfig,
    runner: FfmpegRunner,
}

impl FfmpegSceneSegmenter {
    pub fn new(config: SceneConfig) -> Self {
        Self {
            config,
            runner: FfmpegRunner::new(),
        }
    }

    async fn probe_video(&self, asset: &VideoAsset) -> MediaResult<MediaInfo> {
        let info = probe_media(asset.path()).await?;
        if !info.has_video {
            return Err(MediaError::InvalidVideo(format!(
                "No video stream found in {}",
                asset.file_name()
            )));
        }
        Ok(info)
    }
}

#[async_trait]
impl SceneSegmenter for FfmpegSceneSegmenter {
    async fn detect(&self, asset: &VideoAsset) -> MediaResult<Vec<SceneBoundary>> {
        let info = self.probe_video(asset).await?;

        let filter = format!("select='gt(scene,{})',showinfo", self.config.threshold);
        let cmd = FfmpegCommand::analyze(asset.path())
            .video_filter(filter)
            .output_arg("-an")
            .log_level("info");

        let stderr = self.runner.run_capture(&cmd).await.map_err(|e| match e {
            MediaError::FfmpegFailed { message, .. } => {
                MediaError::InvalidVideo(format!("Failed to decode video: {}", message))
            }
            other => other,
        })?;

        let cuts = parse_cut_points(&stderr);
        debug!(asset_id = %asset.id, cuts = cuts.len(), "Parsed scene cuts");

        let scenes = build_boundaries(&cuts, info.duration, self.config.min_scene_len);
        info!(
            asset_id = %asset.id,
            scenes = scenes.len(),
            duration = info.duration,
            "Scene detection complete"
        );
        Ok(scenes)
    }

    async fn source_duration(&self, asset: &VideoAsset) -> MediaResult<f64> {
        Ok(self.probe_video(asset).await?.duration)
    }
}

/// Extract `pts_time` values from `showinfo` output, sorted and deduplicated.
pub fn parse_cut_points(stderr: &str) -> Vec<f64> {
    let mut cuts: Vec<f64> = stderr
        .lines()
        .filter(|line| line.contains("showinfo"))
        .filter_map(|line| {
            let rest = &line[line.find("pts_time:")? + "pts_time:".len()..];
            rest.split_whitespace().next()?.parse::<f64>().ok()
        })
        .filter(|t| t.is_finite() && *t >= 0.0)
        .collect();

    cuts.sort_by(|a, b| a.total_cmp(b));
    cuts.dedup();
    cuts
}

/// Partition `[0, duration]` at the given cuts.
///
/// Intervals shorter than `min_len` are folded into their predecessor.
pub fn build_boundaries(cuts: &[f64], duration: f64, min_len: f64) -> Vec<SceneBoundary> {
    if !duration.is_finite() || duration <= 0.0 {
        return Vec::new();
    }

    let mut points = Vec::with_capacity(cuts.len() + 2);
    points.push(0.0);
    points.extend(cuts.iter().copied().filter(|c| *c > 0.0 && *c < duration));
    points.push(duration);

    let mut scenes: Vec<SceneBoundary> = Vec::with_capacity(points.len());
    for pair in points.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        match scenes.last_mut() {
            Some(prev) if end - start < min_len => prev.end = end,
            _ => {
                if let Ok(scene) = SceneBoundary::new(start, end) {
                    scenes.push(scene);
                }
            }
        }
    }
    scenes
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOWINFO: &str = "\
[Parsed_showinfo_1 @ 0x55d5c8] config in time_base: 1/12800, frame_rate: 25/1
[Parsed_showinfo_1 @ 0x55d5c8] n:   0 pts: 128000 pts_time:10      duration:    512 duration_time:0.04
[Parsed_showinfo_1 @ 0x55d5c8] n:   1 pts: 320000 pts_time:25.5    duration:    512 duration_time:0.04
frame=  250 fps=0.0 q=-0.0 size=N/A time=00:00:10.00 bitrate=N/A speed=20x
[Parsed_showinfo_1 @ 0x55d5c8] n:   2 pts: 323200 pts_time:25.75   duration:    512 duration_time:0.04
";

    #[test]
    fn test_parse_cut_points() {
        let cuts = parse_cut_points(SHOWINFO);
        assert_eq!(cuts, vec![10.0, 25.5, 25.75]);
    }

    #[test]
    fn test_parse_cut_points_empty() {
        assert!(parse_cut_points("frame=1 fps=0.0").is_empty());
    }

    #[test]
    fn test_build_boundaries_covers_duration() {
        let scenes = build_boundaries(&[10.0, 25.5], 40.0, 0.5);
        assert_eq!(
            scenes,
            vec![
                SceneBoundary::new(0.0, 10.0).unwrap(),
                SceneBoundary::new(10.0, 25.5).unwrap(),
                SceneBoundary::new(25.5, 40.0).unwrap(),
            ]
        );
    }

    #[test]
    fn test_build_boundaries_merges_short_scenes() {
        let scenes = build_boundaries(&[10.0, 25.5, 25.75], 40.0, 0.5);
        assert_eq!(scenes.len(), 3);
        assert_eq!(scenes[1].end, 25.75);
        assert_eq!(scenes[2].start, 25.75);

        // Ordered and non-overlapping
        for pair in scenes.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
    }

    #[test]
    fn test_build_boundaries_ignores_out_of_range_cuts() {
        let scenes = build_boundaries(&[0.0, 50.0], 20.0, 0.5);
        assert_eq!(scenes, vec![SceneBoundary::new(0.0, 20.0).unwrap()]);
    }

    #[test]
    fn test_build_boundaries_unknown_duration() {
        assert!(build_boundaries(&[1.0], 0.0, 0.5).is_empty());
    }
}
