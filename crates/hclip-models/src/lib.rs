//! Shared data models for the highlight clip service.
//!
//! This crate provides Serde-serializable types for:
//! - Video assets and their lifecycle
//! - Scene boundaries and transcript segments
//! - Highlight candidates and the model-facing selection schema
//! - Highlight requests

pub mod asset;
pub mod error;
pub mod highlight;
pub mod request;
pub mod scene;
pub mod transcript;

// Re-export common types
pub use asset::{AssetId, AssetState, VideoAsset};
pub use error::{ModelError, ModelResult};
pub use highlight::{HighlightCandidate, HighlightSelectionResult};
pub use request::{HighlightRequest, DEFAULT_TARGET_DURATION};
pub use scene::SceneBoundary;
pub use transcript::TranscriptSegment;
