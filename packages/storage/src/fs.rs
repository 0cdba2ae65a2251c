//! Blob store rooted at a local directory.
//!
//! Keys map to relative paths below the root; `/` in a key creates
//! subdirectories.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::{BlobStore, StorageError};

/// A [`BlobStore`] that keeps objects as files under a directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    location: String,
}

impl FsBlobStore {
    /// Creates a store rooted at `root`. The directory is created lazily on
    /// first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let location = root.display().to_string();
        Self { root, location }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    fn location(&self) -> &str {
        &self.location
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Read {
                location: self.location.clone(),
                key: key.to_string(),
                source: Box::new(e),
            }),
        }
    }

    async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write to a sibling temp file first so readers never see a partial
        // object.
        let tmp = path.with_extension("partial");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| StorageError::Write {
                location: self.location.clone(),
                key: key.to_string(),
                source: Box::new(e),
            })?;
        tokio::fs::rename(&tmp, &path).await?;

        log::debug!("Wrote {}", path.display());
        Ok(())
    }
}
