//! Local video asset store.
//!
//! Inputs are written to `<root>/<uuid><ext>` so that every request owns a
//! distinct file whose stem is its asset ID.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use url::Url;

use hclip_models::{AssetId, VideoAsset};

use crate::download::{download_video, remove_download_leftovers};
use crate::error::{MediaError, StoreError, StoreResult};
use crate::fs_utils::remove_file_best_effort;

/// Byte stream of an uploaded file.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Extension used when the original name carries none.
const DEFAULT_EXTENSION: &str = ".mp4";

/// Persists input videos and hands back locatable assets.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Stream an upload to disk.
    async fn store(&self, stream: ByteStream, original_name: Option<&str>) -> StoreResult<VideoAsset>;

    /// Download a remote video.
    async fn fetch(&self, url: &str) -> StoreResult<VideoAsset>;

    /// Directory assets are written to.
    fn root(&self) -> &Path;
}

/// Asset store backed by a local directory.
#[derive(Debug, Clone)]
pub struct LocalAssetStore {
    root: PathBuf,
}

impl LocalAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn write_stream(&self, path: &Path, mut stream: ByteStream) -> io::Result<u64> {
        let mut file = tokio::fs::File::create(path).await?;
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

/// Extension (with dot) kept from the client's file name.
pub fn extension_for(original_name: &str) -> String {
    Path::new(original_name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// Check a fetch URL is absolute http(s).
pub fn validate_url(raw: &str) -> StoreResult<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| StoreError::InvalidUrl(e.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.host().is_some() => Ok(url),
        scheme => Err(StoreError::InvalidUrl(format!(
            "unsupported scheme or missing host: {}",
            scheme
        ))),
    }
}

/// Missing tooling is a server fault; anything else is the source's.
fn fetch_error(err: MediaError) -> StoreError {
    if err.is_tool_missing() {
        StoreError::ToolMissing(err.to_string())
    } else {
        StoreError::FetchFailed(err.to_string())
    }
}

#[async_trait]
impl AssetStore for LocalAssetStore {
    async fn store(&self, stream: ByteStream, original_name: Option<&str>) -> StoreResult<VideoAsset> {
        let name = original_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or(StoreError::MissingFilename)?;

        tokio::fs::create_dir_all(&self.root).await?;

        let id = AssetId::new();
        let path = self.root.join(format!("{}{}", id, extension_for(name)));

        match self.write_stream(&path, stream).await {
            Ok(bytes) => {
                info!(asset_id = %id, bytes = bytes, path = %path.display(), "Stored upload");
                Ok(VideoAsset::new(id, path).with_original_name(name))
            }
            Err(e) => {
                warn!(asset_id = %id, error = %e, "Upload failed, removing partial file");
                remove_file_best_effort(&path).await;
                Err(StoreError::Io(e))
            }
        }
    }

    async fn fetch(&self, url: &str) -> StoreResult<VideoAsset> {
        let url = validate_url(url)?;

        tokio::fs::create_dir_all(&self.root).await?;

        let id = AssetId::new();
        let path = match download_video(url.as_str(), &self.root, id.as_str()).await {
            Ok(path) => path,
            Err(e) => {
                let removed = remove_download_leftovers(&self.root, id.as_str()).await;
                warn!(asset_id = %id, error = %e, removed = removed, "Fetch failed");
                return Err(fetch_error(e));
            }
        };

        info!(asset_id = %id, path = %path.display(), "Fetched remote video");
        Ok(VideoAsset::new(id, path).with_original_name(url.as_str()))
    }

    fn root(&self) -> &Path {
        &self.root
    }
}
