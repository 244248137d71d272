//! Inference error types.

use std::path::{Path, PathBuf};
use thiserror::Error;

pub type InferenceResult<T> = Result<T, InferenceError>;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Model unavailable at {path}: {message}")]
    ModelUnavailable { path: PathBuf, message: String },

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl InferenceError {
    /// Create a model unavailable error.
    pub fn unavailable(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::ModelUnavailable {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    /// Whether the model could not be brought up at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::ModelUnavailable { .. })
    }
}
