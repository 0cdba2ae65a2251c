#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Blob storage for the crawl pipeline.
//!
//! Intermediate payloads (worker results, combined sets, processed rows)
//! are too large to pass between stages directly, so every stage writes its
//! output to a [`BlobStore`] and hands the next stage a [`BlobRef`]. The
//! master table lives in the same store.
//!
//! Implementations:
//!
//! | Store | Use |
//! |---|---|
//! | [`s3::S3BlobStore`] | S3-compatible object storage (production) |
//! | [`fs::FsBlobStore`] | A local directory (single-machine runs) |
//! | [`memory::MemoryBlobStore`] | In-process map (tests) |
//!
//! Stores are passed explicitly to every stage; nothing in the pipeline
//! holds a global client.

pub mod fs;
pub mod keys;
pub mod memory;
pub mod s3;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Errors that can occur during blob storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Missing required environment variable.
    #[error("Missing environment variable: {name}")]
    MissingEnv {
        /// Name of the missing environment variable.
        name: String,
    },

    /// Reading an object failed.
    #[error("Failed to read {location}/{key}: {source}")]
    Read {
        /// Bucket or directory the store points at.
        location: String,
        /// Object key.
        key: String,
        /// Underlying error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Writing an object failed.
    #[error("Failed to write {location}/{key}: {source}")]
    Write {
        /// Bucket or directory the store points at.
        location: String,
        /// Object key.
        key: String,
        /// Underlying error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The object exists but is not valid JSON of the expected shape.
    #[error("Invalid JSON in {key}: {source}")]
    Json {
        /// Object key.
        key: String,
        /// Underlying parse error.
        source: serde_json::Error,
    },

    /// Local filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reference to a blob written by one stage and consumed by the next.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobRef {
    /// Bucket or directory the blob lives in (informational).
    pub bucket: String,
    /// Object key within the store.
    pub key: String,
}

/// Key/value object storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Bucket name or directory this store points at.
    fn location(&self) -> &str;

    /// Reads an object. Returns `None` if the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend fails.
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Writes (creates or replaces) an object.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend fails.
    async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError>;

    /// Returns whether an object exists.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend fails.
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.read(key).await?.is_some())
    }

    /// Builds a [`BlobRef`] to `key` in this store.
    fn blob_ref(&self, key: &str) -> BlobRef {
        BlobRef {
            bucket: self.location().to_string(),
            key: key.to_string(),
        }
    }
}

/// Reads and deserializes a JSON object. Returns `None` if it is absent.
///
/// An object that exists but is zero bytes long is also treated as absent.
///
/// # Errors
///
/// Returns [`StorageError::Json`] if the object is not valid JSON for `T`,
/// or any backend error.
pub async fn read_json<T: DeserializeOwned>(
    store: &dyn BlobStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    let Some(bytes) = store.read(key).await? else {
        return Ok(None);
    };
    if bytes.is_empty() {
        return Ok(None);
    }
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| StorageError::Json {
            key: key.to_string(),
            source,
        })
}

/// Reads a JSON object, falling back to `T::default()` when it is absent.
///
/// # Errors
///
/// Same as [`read_json`].
pub async fn read_json_or_default<T: DeserializeOwned + Default>(
    store: &dyn BlobStore,
    key: &str,
) -> Result<T, StorageError> {
    Ok(read_json(store, key).await?.unwrap_or_default())
}

/// Serializes `value` as JSON and writes it to `key`.
///
/// # Errors
///
/// Returns [`StorageError::Json`] if serialization fails, or any backend
/// error.
pub async fn write_json<T: Serialize + Sync>(
    store: &dyn BlobStore,
    key: &str,
    value: &T,
) -> Result<BlobRef, StorageError> {
    let bytes = serde_json::to_vec(value).map_err(|source| StorageError::Json {
        key: key.to_string(),
        source,
    })?;
    #[allow(clippy::cast_precision_loss)] // display-only MB value
    let mb = bytes.len() as f64 / 1_048_576.0;
    store.write(key, bytes).await?;
    log::info!("Saved {}/{key} ({mb:.2} MB)", store.location());
    Ok(store.blob_ref(key))
}
