//! Spool storage for inbound edit images.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use uuid::Uuid;

/// A spooled image payload that removes its backing file when dropped.
///
/// Removal is best effort: a stray spool file must never fail the request
/// it belonged to, so failures are logged and swallowed.
#[derive(Debug)]
pub struct StagedImage {
    path: PathBuf,
    len: u64,
}

impl StagedImage {
    /// Write `bytes` into `spool_dir` under a fresh name.
    pub async fn stage(spool_dir: &Path, bytes: &[u8]) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(spool_dir).await?;
        let path = spool_dir.join(format!("{}.img", Uuid::new_v4()));
        tokio::fs::write(&path, bytes).await?;
        debug!("Staged {} bytes at {}", bytes.len(), path.display());
        Ok(Self {
            path,
            len: bytes.len() as u64,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read the spooled payload back.
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}

impl Drop for StagedImage {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    "Failed to remove staged image {}: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}
