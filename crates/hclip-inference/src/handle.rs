//! Process-wide model handle.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, error, info};

use crate::engine::InferenceEngine;
use crate::error::{InferenceError, InferenceResult};
use crate::types::CompletionRequest;

/// Brings a model up from its artifact.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self) -> InferenceResult<Box<dyn InferenceEngine>>;

    /// Artifact the loader reads.
    fn artifact(&self) -> &Path;
}

/// A loaded model. Immutable after construction; inference is its only use.
pub struct ModelHandle {
    artifact: PathBuf,
    engine: Mutex<Box<dyn InferenceEngine>>,
}

impl ModelHandle {
    pub fn new(artifact: impl Into<PathBuf>, engine: Box<dyn InferenceEngine>) -> Self {
        Self {
            artifact: artifact.into(),
            engine: Mutex::new(engine),
        }
    }

    pub fn artifact(&self) -> &Path {
        &self.artifact
    }

    /// Run one completion. Concurrent callers are served one at a time.
    pub async fn complete(&self, request: &CompletionRequest) -> InferenceResult<String> {
        let mut engine = self.engine.lock().await;
        let started = Instant::now();
        let result = engine.complete(request).await;
        debug!(
            engine = engine.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Completion finished"
        );
        result
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("artifact", &self.artifact)
            .finish_non_exhaustive()
    }
}

/// Lazily initialized, shared [`ModelHandle`].
///
/// The first `acquire` loads the model; concurrent first callers wait on
/// that single load. A failed load leaves the cell empty so a later call
/// retries.
pub struct SharedModel {
    cell: OnceCell<Arc<ModelHandle>>,
    loader: Arc<dyn ModelLoader>,
}

impl SharedModel {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            cell: OnceCell::new(),
            loader,
        }
    }

    /// Get the handle, loading the model on first use.
    pub async fn acquire(&self) -> InferenceResult<Arc<ModelHandle>> {
        let handle = self
            .cell
            .get_or_try_init(|| async {
                let artifact = self.loader.artifact().to_path_buf();
                info!(model = %artifact.display(), "Loading generative model");
                let started = Instant::now();

                let engine = self.loader.load().await.map_err(|e| {
                    error!(model = %artifact.display(), error = %e, "Model load failed");
                    match e {
                        InferenceError::ModelUnavailable { .. } => e,
                        other => InferenceError::unavailable(&artifact, other.to_string()),
                    }
                })?;

                info!(
                    model = %artifact.display(),
                    engine = engine.name(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Generative model ready"
                );
                Ok::<_, InferenceError>(Arc::new(ModelHandle::new(artifact, engine)))
            })
            .await?;

        Ok(Arc::clone(handle))
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    pub fn artifact(&self) -> &Path {
        self.loader.artifact()
    }
}
