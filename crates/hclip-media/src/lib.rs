//! Media tooling for the highlight clip service.
//!
//! This crate wraps the external command-line tools the pipeline depends on
//! and provides the local asset store:
//! - FFmpeg command building and execution
//! - FFprobe stream inspection
//! - Scene segmentation via FFmpeg scene scores
//! - Speech transcription via the whisper.cpp CLI
//! - Clip extraction
//! - Upload persistence and URL fetch via yt-dlp

pub mod clip;
pub mod command;
pub mod download;
pub mod error;
pub mod fs_utils;
pub mod probe;
pub mod scenes;
pub mod store;
pub mod transcribe;

pub use clip::{ClipEncoding, ClipExtractor, FfmpegClipExtractor};
pub use command::{check_tool, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult, StoreError, StoreResult};
pub use probe::{probe_media, MediaInfo};
pub use scenes::{FfmpegSceneSegmenter, SceneConfig, SceneSegmenter};
pub use store::{AssetStore, ByteStream, LocalAssetStore};
pub use transcribe::{Transcriber, TranscriberConfig, WhisperCliTranscriber};
