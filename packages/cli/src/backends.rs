//! Builds the concrete storage, fetcher, and history backends named in the
//! configuration.

use shelf_crawl_history::parquet::ParquetTable;
use shelf_crawl_pipeline::{HttpFetcherSource, PipelineConfig, PipelineError, StorageConfig};
use shelf_crawl_storage::fs::FsBlobStore;
use shelf_crawl_storage::s3::S3BlobStore;
use shelf_crawl_storage::{BlobStore, StorageError};

/// Opens the configured blob store.
///
/// # Errors
///
/// Returns [`StorageError::MissingEnv`] if S3 credentials are not set.
pub fn blob_store(config: &StorageConfig) -> Result<Box<dyn BlobStore>, StorageError> {
    match config {
        StorageConfig::S3 { bucket } => {
            log::info!("Using S3 bucket {bucket}");
            Ok(Box::new(S3BlobStore::from_env(bucket)?))
        }
        StorageConfig::Local { dir } => {
            log::info!("Using local blob directory {}", dir.display());
            Ok(Box::new(FsBlobStore::new(dir.clone())))
        }
    }
}

/// Loads proxy details and user agents for the HTTP fetchers.
///
/// # Errors
///
/// Returns [`PipelineError`] if a configured blob is missing or unreadable.
pub async fn fetchers(
    store: &dyn BlobStore,
    config: &PipelineConfig,
) -> Result<HttpFetcherSource, PipelineError> {
    HttpFetcherSource::load(store, config).await
}

/// Opens the parquet historical table at the configured path.
#[must_use]
pub fn history_table(config: &PipelineConfig) -> ParquetTable {
    log::info!("Historical table: {}", config.history_path.display());
    ParquetTable::new(config.history_path.clone())
}
