//! Clip byte storage behind a trait, so the core only ever holds opaque
//! handles. The shipped implementation writes plain files under one
//! directory; handles are file names.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store clip bytes, returning an opaque handle resolvable by `path`.
    async fn put(
        &self,
        room_code: &str,
        clip_id: &str,
        extension: &str,
        bytes: &[u8],
    ) -> Result<String, BlobError>;

    /// Filesystem path for a stored handle, for range-capable serving.
    fn path(&self, handle: &str) -> PathBuf;

    async fn delete(&self, handle: &str) -> Result<(), BlobError>;
}

pub struct DiskBlobStore {
    root: PathBuf,
}

impl DiskBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Keep only a plain alphanumeric extension; anything else becomes mp4.
    fn sanitize_extension(extension: &str) -> &str {
        let ext = extension.trim_start_matches('.');
        if !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            ext
        } else {
            "mp4"
        }
    }
}

#[async_trait]
impl BlobStore for DiskBlobStore {
    async fn put(
        &self,
        room_code: &str,
        clip_id: &str,
        extension: &str,
        bytes: &[u8],
    ) -> Result<String, BlobError> {
        let ext = Self::sanitize_extension(extension);
        let handle = format!("{}_{}.{}", room_code, clip_id, ext);
        tokio::fs::write(self.root.join(&handle), bytes).await?;
        Ok(handle)
    }

    fn path(&self, handle: &str) -> PathBuf {
        // handles are generated file names, never client-supplied paths
        self.root.join(Path::new(handle).file_name().unwrap_or_default())
    }

    async fn delete(&self, handle: &str) -> Result<(), BlobError> {
        tokio::fs::remove_file(self.path(handle)).await?;
        Ok(())
    }
}
