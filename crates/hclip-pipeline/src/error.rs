//! Pipeline error taxonomy.
//!
//! Every failure a run can end with is one of these kinds. Each kind knows
//! the stage it came from, a stable machine code, a caller-facing message
//! that leaks no internals, and whether the caller or the service is at
//! fault.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use hclip_inference::InferenceError;
use hclip_media::{MediaError, StoreError};

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Pipeline stage an error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Intake,
    SceneDetection,
    Transcription,
    Selection,
    Normalization,
    Extraction,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Intake => "intake",
            Stage::SceneDetection => "scene_detection",
            Stage::Transcription => "transcription",
            Stage::Selection => "selection",
            Stage::Normalization => "normalization",
            Stage::Extraction => "extraction",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which input resource operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Remote download; the URL is the caller's
    Fetch,
    /// Local persistence
    Store,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Validation failed at {stage}: {message}")]
    Validation { stage: Stage, message: String },

    #[error("Resource error ({kind:?}): {message}")]
    Resource { kind: ResourceKind, message: String },

    #[error("Media decode failed at {stage}: {message}")]
    MediaDecode { stage: Stage, message: String },

    #[error("No audio content in input")]
    NoAudioContent,

    #[error("Model unavailable at {}: {message}", path.display())]
    ModelUnavailable {
        stage: Stage,
        path: PathBuf,
        message: String,
    },

    #[error("Could not parse model selection: {0}")]
    SelectionParse(String),

    #[error("Model returned no highlight candidates")]
    NoHighlightFound,

    #[error("Clip extraction failed: {0}")]
    Extraction(String),

    #[error("Internal error at {stage}: {message}")]
    Internal { stage: Stage, message: String },
}

impl PipelineError {
    pub fn validation(stage: Stage, message: impl Into<String>) -> Self {
        Self::Validation {
            stage,
            message: message.into(),
        }
    }

    pub fn media_decode(stage: Stage, message: impl Into<String>) -> Self {
        Self::MediaDecode {
            stage,
            message: message.into(),
        }
    }

    pub fn internal(stage: Stage, message: impl Into<String>) -> Self {
        Self::Internal {
            stage,
            message: message.into(),
        }
    }

    /// Stage the error is attributed to.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Validation { stage, .. }
            | Self::MediaDecode { stage, .. }
            | Self::ModelUnavailable { stage, .. }
            | Self::Internal { stage, .. } => *stage,
            Self::Resource { .. } => Stage::Intake,
            Self::NoAudioContent => Stage::Transcription,
            Self::SelectionParse(_) | Self::NoHighlightFound => Stage::Selection,
            Self::Extraction(_) => Stage::Extraction,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::Resource {
                kind: ResourceKind::Fetch,
                ..
            } => "fetch_failed",
            Self::Resource {
                kind: ResourceKind::Store,
                ..
            } => "store_failed",
            Self::MediaDecode { .. } => "media_decode_error",
            Self::NoAudioContent => "no_audio_content",
            Self::ModelUnavailable { .. } => "model_unavailable",
            Self::SelectionParse(_) => "selection_parse_error",
            Self::NoHighlightFound => "no_highlight_found",
            Self::Extraction(_) => "extraction_error",
            Self::Internal { .. } => "internal_error",
        }
    }

    /// Caller-facing message.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { message, .. } => message.clone(),
            Self::Resource {
                kind: ResourceKind::Fetch,
                ..
            } => "Could not download a video from the provided URL.".to_string(),
            Self::Resource {
                kind: ResourceKind::Store,
                ..
            } => "Failed to store the uploaded video.".to_string(),
            Self::MediaDecode { .. } => "The video could not be read.".to_string(),
            Self::NoAudioContent => {
                "No audio content found in video. Cannot generate highlight based on content."
                    .to_string()
            }
            Self::ModelUnavailable { .. } => "The analysis model is not available.".to_string(),
            Self::SelectionParse(_) => "The analysis model returned an invalid response.".to_string(),
            Self::NoHighlightFound => "No suitable highlight found.".to_string(),
            Self::Extraction(_) => "Failed to extract the highlight clip.".to_string(),
            Self::Internal { .. } => "Internal server error".to_string(),
        }
    }

    /// Whether the failure is attributable to the caller's input (400-class).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::Resource {
                    kind: ResourceKind::Fetch,
                    ..
                }
                | Self::NoAudioContent
                | Self::NoHighlightFound
        )
    }

    /// Map a scene detection failure.
    pub fn from_scene_error(err: MediaError) -> Self {
        if err.is_tool_missing() {
            Self::internal(Stage::SceneDetection, err.to_string())
        } else {
            Self::media_decode(Stage::SceneDetection, err.to_string())
        }
    }

    /// Map a transcription failure.
    pub fn from_transcription_error(err: MediaError) -> Self {
        match err {
            MediaError::ModelNotFound(path) => Self::ModelUnavailable {
                stage: Stage::Transcription,
                message: format!(
                    "Speech model not found. Please run {} to download it.",
                    hclip_inference::config::SETUP_COMMAND
                ),
                path: PathBuf::from(path),
            },
            MediaError::FileNotFound(_)
            | MediaError::InvalidVideo(_)
            | MediaError::FfprobeFailed { .. }
            | MediaError::FfmpegFailed { .. } => {
                Self::media_decode(Stage::Transcription, err.to_string())
            }
            other => Self::internal(Stage::Transcription, other.to_string()),
        }
    }

    /// Map an inference failure.
    pub fn from_inference_error(err: InferenceError) -> Self {
        match err {
            InferenceError::ModelUnavailable { path, message } => Self::ModelUnavailable {
                stage: Stage::Selection,
                path,
                message,
            },
            InferenceError::InvalidResponse(msg) => Self::SelectionParse(msg),
            InferenceError::Json(e) => Self::SelectionParse(e.to_string()),
            other => Self::internal(Stage::Selection, other.to_string()),
        }
    }
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MissingFilename | StoreError::InvalidUrl(_) => {
                Self::validation(Stage::Intake, err.to_string())
            }
            StoreError::FetchFailed(message) => Self::Resource {
                kind: ResourceKind::Fetch,
                message,
            },
            StoreError::ToolMissing(message) => Self::internal(Stage::Intake, message),
            StoreError::Io(e) => Self::Resource {
                kind: ResourceKind::Store,
                message: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes() {
        assert!(PipelineError::validation(Stage::Intake, "bad").is_client_error());
        assert!(PipelineError::NoAudioContent.is_client_error());
        assert!(PipelineError::NoHighlightFound.is_client_error());
        assert!(PipelineError::from(StoreError::FetchFailed("404".into())).is_client_error());

        assert!(!PipelineError::from(StoreError::Io(std::io::Error::other("disk full"))).is_client_error());
        assert!(!PipelineError::SelectionParse("x".into()).is_client_error());
        assert!(!PipelineError::Extraction("x".into()).is_client_error());
        assert!(!PipelineError::media_decode(Stage::SceneDetection, "x").is_client_error());
    }

    #[test]
    fn test_store_errors_map_to_intake() {
        let err = PipelineError::from(StoreError::MissingFilename);
        assert_eq!(err.code(), "validation_error");
        assert_eq!(err.stage(), Stage::Intake);
        assert_eq!(err.user_message(), "No filename provided");

        let err = PipelineError::from(StoreError::FetchFailed("yt-dlp failed: 404".into()));
        assert_eq!(err.code(), "fetch_failed");
        assert!(!err.user_message().contains("yt-dlp"));
    }

    #[test]
    fn test_missing_fetch_tool_is_server_fault() {
        let err = PipelineError::from(StoreError::ToolMissing("yt-dlp not found in PATH".into()));
        assert!(!err.is_client_error());
        assert_eq!(err.code(), "internal_error");
        assert_eq!(err.stage(), Stage::Intake);
        assert_eq!(err.user_message(), "Internal server error");
    }

    #[test]
    fn test_user_messages_hide_internals() {
        let err = PipelineError::internal(Stage::Extraction, "/srv/videos/secret.mp4 exploded");
        assert_eq!(err.user_message(), "Internal server error");

        let err = PipelineError::SelectionParse("expected value at line 1".into());
        assert!(!err.user_message().contains("line 1"));
    }

    #[test]
    fn test_missing_whisper_model_names_path() {
        let err = PipelineError::from_transcription_error(MediaError::model_not_found(
            "models/ggml-base.bin",
        ));
        match &err {
            PipelineError::ModelUnavailable { path, stage, .. } => {
                assert_eq!(path, &PathBuf::from("models/ggml-base.bin"));
                assert_eq!(*stage, Stage::Transcription);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_missing_tools_are_internal() {
        let err = PipelineError::from_scene_error(MediaError::FfmpegNotFound);
        assert_eq!(err.code(), "internal_error");

        let err = PipelineError::from_scene_error(MediaError::InvalidVideo("no stream".into()));
        assert_eq!(err.code(), "media_decode_error");
    }
}
