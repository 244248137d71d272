//! Inference engine abstraction.

use async_trait::async_trait;

use crate::error::InferenceResult;
use crate::types::CompletionRequest;

/// A loaded model able to answer chat completions.
///
/// Engines take `&mut self`: a model context serves one completion at a
/// time, and [`crate::ModelHandle`] owns the engine behind a mutex.
#[async_trait]
pub trait InferenceEngine: Send {
    /// Run one completion and return the raw assistant text.
    async fn complete(&mut self, request: &CompletionRequest) -> InferenceResult<String>;

    /// Short engine name for logs.
    fn name(&self) -> &str;
}
