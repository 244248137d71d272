//! Filesystem helpers for temporary media assets.

use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;

use crate::error::MediaResult;

/// Remove a file, logging instead of failing.
///
/// Returns `true` when the file is gone afterwards, including when it never
/// existed.
pub async fn remove_file_best_effort(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    match fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!("Removed {}", path.display());
            true
        }
        Err(e) if e.kind() == ErrorKind::NotFound => true,
        Err(e) => {
            tracing::warn!("Failed to remove {}: {}", path.display(), e);
            false
        }
    }
}

/// Create a directory and its parents if missing.
pub async fn ensure_dir(path: impl AsRef<Path>) -> MediaResult<()> {
    let path = path.as_ref();
    if !path.exists() {
        fs::create_dir_all(path).await?;
    }
    Ok(())
}

/// Whether a file can be created in `dir`.
pub async fn is_dir_writable(dir: impl AsRef<Path>) -> bool {
    let dir = dir.as_ref().to_path_buf();
    if ensure_dir(&dir).await.is_err() {
        return false;
    }
    tokio::task::spawn_blocking(move || tempfile::tempfile_in(&dir).is_ok())
        .await
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_remove_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        fs::write(&path, b"data").await.unwrap();

        assert!(remove_file_best_effort(&path).await);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_remove_missing_file_is_ok() {
        let dir = TempDir::new().unwrap();
        assert!(remove_file_best_effort(dir.path().join("gone.mp4")).await);
    }

    #[tokio::test]
    async fn test_remove_directory_reports_failure() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).await.unwrap();

        assert!(!remove_file_best_effort(&sub).await);
        assert!(sub.exists());
    }

    #[tokio::test]
    async fn test_dir_writable() {
        let dir = TempDir::new().unwrap();
        assert!(is_dir_writable(dir.path().join("nested")).await);
        assert!(dir.path().join("nested").is_dir());
    }
}
