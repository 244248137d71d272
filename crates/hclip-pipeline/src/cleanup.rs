//! Deferred removal of a run's temporary assets.

use tracing::{debug, info, warn};

use hclip_media::fs_utils::remove_file_best_effort;
use hclip_models::{AssetState, VideoAsset};

/// Owns the files of a finished run until they are removed.
///
/// `discharge` removes them once the clip has been handed off. If the
/// obligation is dropped first (for example the client disconnected
/// mid-download), removal is spawned onto the runtime instead. Removal is
/// best-effort and not journaled: a crash in between leaves files behind.
#[derive(Debug)]
pub struct CleanupObligation {
    assets: Vec<VideoAsset>,
    discharged: bool,
}

impl CleanupObligation {
    pub fn new(assets: Vec<VideoAsset>) -> Self {
        Self {
            assets,
            discharged: false,
        }
    }

    pub fn assets(&self) -> &[VideoAsset] {
        &self.assets
    }

    /// Remove every owned file and return the assets in their final state.
    pub async fn discharge(mut self) -> Vec<VideoAsset> {
        self.discharged = true;
        let mut assets = std::mem::take(&mut self.assets);

        let mut removed = 0usize;
        for asset in &mut assets {
            if remove_file_best_effort(asset.path()).await {
                removed += 1;
                if let Err(e) = asset.transition(AssetState::Cleaned) {
                    warn!(asset_id = %asset.id, error = %e, "Unexpected asset state during cleanup");
                }
            }
        }

        info!(removed = removed, total = assets.len(), "Cleanup complete");
        assets
    }
}

impl Drop for CleanupObligation {
    fn drop(&mut self) {
        if self.discharged || self.assets.is_empty() {
            return;
        }

        let paths: Vec<_> = self.assets.drain(..).map(|a| a.path).collect();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                debug!(count = paths.len(), "Cleanup obligation dropped, scheduling removal");
                runtime.spawn(async move {
                    for path in paths {
                        remove_file_best_effort(&path).await;
                    }
                });
            }
            Err(_) => {
                for path in paths {
                    if let Err(e) = std::fs::remove_file(&path) {
                        if e.kind() != std::io::ErrorKind::NotFound {
                            warn!("Failed to remove {}: {}", path.display(), e);
                        }
                    }
                }
            }
        }
    }
}
