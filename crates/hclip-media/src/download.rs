//! Video download using yt-dlp.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::command::stderr_tail;
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::remove_file_best_effort;

/// Download `url` into `dir`, naming the file `<stem>.<ext>`.
///
/// yt-dlp picks the container extension, so the final path is read back
/// from its `after_move:filepath` print.
pub async fn download_video(url: &str, dir: &Path, stem: &str) -> MediaResult<PathBuf> {
    which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)?;

    let template = dir.join(format!("{}.%(ext)s", stem));
    info!("Downloading video from {} into {}", url, dir.display());

    let output = Command::new("yt-dlp")
        .args(["-f", "best[ext=mp4]/best", "--no-playlist", "--no-progress"])
        .arg("-o")
        .arg(&template)
        .args(["--print", "after_move:filepath"])
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("yt-dlp stderr: {}", stderr);
        return Err(MediaError::download_failed(format!(
            "yt-dlp failed: {}",
            stderr_tail(&stderr)
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let path = resolve_download_path(&stdout, dir, stem)
        .await
        .ok_or_else(|| MediaError::download_failed("Output file not created"))?;

    let size = tokio::fs::metadata(&path).await?.len();
    info!(
        output = %path.display(),
        size_mb = size as f64 / (1024.0 * 1024.0),
        "Downloaded video successfully"
    );
    Ok(path)
}

/// Locate the downloaded file.
///
/// Prefers the last path yt-dlp printed, falling back to any `<stem>.*`
/// entry in `dir`.
pub async fn resolve_download_path(stdout: &str, dir: &Path, stem: &str) -> Option<PathBuf> {
    let printed = stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(PathBuf::from);

    if let Some(path) = printed {
        if path.is_file() {
            return Some(path);
        }
    }

    let prefix = format!("{}.", stem);
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&prefix) && !name.ends_with(".part") {
            return Some(entry.path());
        }
    }
    None
}

/// Remove every `<stem>.*` entry in `dir`, partial fragments included.
///
/// Returns the number of files removed.
pub async fn remove_download_leftovers(dir: &Path, stem: &str) -> usize {
    let prefix = format!("{}.", stem);
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return 0;
    };
    let mut removed = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_name().to_string_lossy().starts_with(&prefix)
            && remove_file_best_effort(entry.path()).await
        {
            removed += 1;
        }
    }
    removed
}
