//! Video asset models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};

/// Unique identifier for a stored video asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct AssetId(pub String);

impl AssetId {
    /// Generate a new random asset ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AssetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AssetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AssetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle state of a video asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssetState {
    /// Persisted, not yet handed to a pipeline run
    #[default]
    Created,
    /// Owned by an in-flight pipeline run
    InUse,
    /// Run finished successfully
    Completed,
    /// Run failed
    Failed,
    /// Removed from disk
    Cleaned,
}

impl AssetState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetState::Created => "created",
            AssetState::InUse => "in_use",
            AssetState::Completed => "completed",
            AssetState::Failed => "failed",
            AssetState::Cleaned => "cleaned",
        }
    }

    /// Whether moving from `self` to `next` is a legal lifecycle step.
    pub fn can_transition_to(&self, next: AssetState) -> bool {
        use AssetState::*;
        matches!(
            (*self, next),
            (Created, InUse)
                | (InUse, Completed)
                | (InUse, Failed)
                | (Created, Completed)
                | (_, Cleaned)
        )
    }
}

impl fmt::Display for AssetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A video file on local disk owned by exactly one request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoAsset {
    /// Store-assigned identifier (also the file stem for inputs)
    pub id: AssetId,

    /// Location on disk
    pub path: PathBuf,

    /// Client-supplied file name, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,

    /// Lifecycle state
    #[serde(default)]
    pub state: AssetState,
}

impl VideoAsset {
    /// Create a new asset in the `Created` state.
    pub fn new(id: AssetId, path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            path: path.into(),
            original_name: None,
            state: AssetState::Created,
        }
    }

    /// Attach the client-supplied name.
    pub fn with_original_name(mut self, name: impl Into<String>) -> Self {
        self.original_name = Some(name.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File stem of the asset path, falling back to the asset ID.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.id.to_string())
    }

    /// File name of the asset path.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.id.to_string())
    }

    /// Move to `next`, rejecting illegal lifecycle steps.
    pub fn transition(&mut self, next: AssetState) -> ModelResult<()> {
        if self.state == next {
            return Ok(());
        }
        if !self.state.can_transition_to(next) {
            return Err(ModelError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}
