//! Output file naming and the temp-file commit protocol.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

use super::error::DownloadError;

/// Where one reference id lands inside a download directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    directory: PathBuf,
    stem: String,
}

impl OutputPaths {
    pub fn new(directory: &Path, reference_id: &str) -> Self {
        Self {
            directory: directory.to_path_buf(),
            stem: format!(
                "{}_{}",
                sanitize_reference(reference_id),
                reference_hash(reference_id)
            ),
        }
    }

    /// `{directory}/{reference}_{hash}.pdf`
    pub fn final_path(&self) -> PathBuf {
        self.directory.join(format!("{}.pdf", self.stem))
    }

    /// A fresh hidden `.part` file next to the final path
    pub fn temp_path(&self) -> PathBuf {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        self.directory
            .join(format!(".{}_{}.part", self.stem, millis))
    }
}

/// First 8 hex chars of the SHA-256 of `reference_id`
pub fn reference_hash(reference_id: &str) -> String {
    let digest = Sha256::digest(reference_id.as_bytes());
    digest[..4].iter().map(|b| format!("{:02x}", b)).collect()
}

/// Reduce a reference id to characters safe in a single path component.
///
/// Separators and other punctuation become `_`, so `10.1/abc` can never
/// escape the download directory.
pub fn sanitize_reference(reference_id: &str) -> String {
    let sanitized: String = reference_id
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .take(100)
        .collect();

    if sanitized.is_empty() {
        "download".to_string()
    } else {
        sanitized
    }
}

/// Create the download directory if it does not exist
pub async fn ensure_directory(directory: &Path) -> Result<(), DownloadError> {
    tokio::fs::create_dir_all(directory)
        .await
        .map_err(|source| DownloadError::Io {
            path: directory.to_path_buf(),
            source,
        })
}

/// Size of an existing regular file at `path`, or `None`
pub async fn existing_file_size(path: &Path) -> Option<u64> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => Some(metadata.len()),
        _ => None,
    }
}

/// Atomically move a finished temp file into place
pub async fn commit(temp: &Path, target: &Path) -> std::io::Result<()> {
    tokio::fs::rename(temp, target).await?;
    debug!("Committed {} -> {}", temp.display(), target.display());
    Ok(())
}

/// Best-effort removal of a temp file after a failed attempt
pub async fn discard(temp: &Path) {
    if let Err(e) = tokio::fs::remove_file(temp).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            debug!("Failed to remove {}: {}", temp.display(), e);
        }
    }
}
