//! Highlight extraction pipeline.
//!
//! Sequences scene detection and transcription (concurrently), content
//! selection through the shared generative model, duration normalization
//! and clip extraction. Every temporary asset is released through a single
//! cleanup path, whatever the outcome.

pub mod cleanup;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod normalize;
pub mod orchestrator;
pub mod pool;
pub mod selector;

pub use cleanup::CleanupObligation;
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult, ResourceKind, Stage};
pub use logging::RunLogger;
pub use normalize::{normalize, normalize_within, DurationNormalizer};
pub use orchestrator::{HighlightOutput, HighlightPipeline, PipelineComponents};
pub use pool::StagePool;
pub use selector::ContentSelector;
