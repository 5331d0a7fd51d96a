use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

use garden_types::models::MediaKind;

const STAGING_DIR: &str = ".staging";

/// Manages on-disk storage for uploaded media.
///
/// Files live at `{root}/{photos|videos}/{stored_name}`. Uploads are first
/// written to `{root}/.staging/` and renamed into place once the whole
/// request has been validated, so a rejected upload never leaves a public file.
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub async fn new(root: PathBuf) -> Result<Self> {
        for kind in MediaKind::ALL {
            fs::create_dir_all(root.join(kind.plural())).await?;
        }
        // Leftovers from uploads cut off by a disconnect or a crash.
        let staging = root.join(STAGING_DIR);
        match fs::remove_dir_all(&staging).await {
            Ok(()) => info!("Cleared staging directory {}", staging.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::create_dir_all(&staging).await?;
        info!("Upload storage directory: {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the public files of one kind.
    pub fn kind_dir(&self, kind: MediaKind) -> PathBuf {
        self.root.join(kind.plural())
    }

    pub fn file_path(&self, kind: MediaKind, stored_name: &str) -> PathBuf {
        self.kind_dir(kind).join(stored_name)
    }

    /// Create an empty file in the staging directory for an incoming upload.
    pub async fn create_staged(&self) -> Result<(PathBuf, fs::File)> {
        let path = self.root.join(STAGING_DIR).join(Uuid::new_v4().to_string());
        let file = fs::File::create(&path).await?;
        Ok((path, file))
    }

    /// Atomically move a staged file to its public location.
    pub async fn promote(&self, staged: &Path, kind: MediaKind, stored_name: &str) -> Result<PathBuf> {
        let target = self.file_path(kind, stored_name);
        fs::rename(staged, &target).await?;
        Ok(target)
    }

    /// Best-effort removal of a file written during a failed upload.
    pub async fn discard(&self, path: &Path) {
        match fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to discard {}: {}", path.display(), e),
        }
    }

    /// Delete a stored media file from disk.
    pub async fn delete_file(&self, kind: MediaKind, stored_name: &str) -> Result<()> {
        let path = self.file_path(kind, stored_name);
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted {} file {}", kind, stored_name);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("{} file {} already gone", kind, stored_name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Name under which an upload is stored: millisecond timestamp plus a random
/// component in front of the sanitized client filename.
pub fn stored_name_for(original: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}-{:08x}-{}",
        now.timestamp_millis(),
        rand::random::<u32>(),
        sanitize_file_name(original)
    )
}

/// Keeps only the last path component and replaces anything outside
/// `[A-Za-z0-9._-]`, so a client filename can never escape the upload directory.
pub fn sanitize_file_name(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}
