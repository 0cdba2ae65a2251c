#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! The crawl pipeline.
//!
//! A run is a chain of stages. Each stage takes the previous stage's output
//! verbatim (JSON-serializable values holding blob references or literal
//! partitions) and returns a value the next stage consumes, so stages can
//! run in separate processes.
//!
//! | # | Stage | Input | Output |
//! |---|-------|-------|--------|
//! | 1 | [`partition`] | [`partition::PartitionRequest`] | [`partition::PartitionOutput`] |
//! | 2 | [`scrape`] | one `Partition` | `BlobRef` |
//! | 3 | [`combine`] | `[BlobRef]` | `Option<BlobRef>` |
//! | 4 | [`update_master`] | `Option<BlobRef>` | [`update_master::UpdateMasterOutput`] |
//! | 5 | [`scrape_missed`] | one `RetryPartition` | [`scrape_missed::RetryOutput`] |
//! | 6 | [`combine_missed`] | `[RetryOutput]` | `Option<BlobRef>` |
//! | 7 | [`postprocess`] | `[Option<BlobRef>]` | `BlobRef` |
//! | 8 | [`append`] | `BlobRef` | `AppendStats` |
//!
//! [`runner`] chains all eight in one process, fanning the crawl stages out
//! across concurrent workers.

pub mod append;
pub mod combine;
pub mod combine_missed;
pub mod config;
pub mod fetchers;
pub mod partition;
pub mod postprocess;
pub mod runner;
pub mod scrape;
pub mod scrape_missed;
pub mod update_master;

#[cfg(test)]
mod testing;

use shelf_crawl_catalog_models::ResultSet;
use shelf_crawl_storage::{BlobRef, BlobStore, read_json};

pub use config::{PipelineConfig, StorageConfig};
pub use fetchers::{FetcherSource, HttpFetcherSource, SharedFetcher};

/// Errors that abort a stage.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A configuration value is out of range.
    #[error("Invalid configuration: {message}")]
    Config {
        /// What is wrong.
        message: String,
    },

    /// The configuration file is not valid TOML for [`PipelineConfig`].
    #[error("Invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    /// A blob the stage cannot do without is absent.
    #[error("Required blob {key} does not exist")]
    MissingBlob {
        /// Object key.
        key: String,
    },

    /// A partition handed to a crawl worker has an invalid page range.
    #[error("Invalid partition: {0}")]
    InvalidPartition(#[from] shelf_crawl_catalog_models::SpanError),

    /// Partition planning rejected its input.
    #[error(transparent)]
    Plan(#[from] shelf_crawl_planner::PlanError),

    /// Reconciliation refused the run.
    #[error(transparent)]
    Reconcile(#[from] shelf_crawl_reconcile::ReconcileError),

    /// Blob storage failed.
    #[error(transparent)]
    Storage(#[from] shelf_crawl_storage::StorageError),

    /// Fetching or extracting catalog pages failed.
    #[error(transparent)]
    Fetch(#[from] shelf_crawl_scraper::FetchError),

    /// Casting or appending historical rows failed.
    #[error(transparent)]
    History(#[from] shelf_crawl_history::HistoryError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads a result set written by an earlier stage.
///
/// An absent reference or a missing blob means the earlier stage produced
/// nothing: it is logged and read as an empty set.
///
/// # Errors
///
/// Returns [`PipelineError::Storage`] if the blob exists but cannot be read.
pub async fn load_result_set(
    store: &dyn BlobStore,
    blob: Option<&BlobRef>,
) -> Result<ResultSet, PipelineError> {
    let Some(blob) = blob else {
        log::warn!("No result reference from the previous stage; treating it as empty");
        return Ok(ResultSet::new());
    };

    match read_json::<ResultSet>(store, &blob.key).await? {
        Some(results) => {
            log::debug!("Loaded {} product(s) from {}", results.len(), blob.key);
            Ok(results)
        }
        None => {
            log::warn!(
                "Result blob {}/{} is missing; treating it as empty",
                blob.bucket,
                blob.key
            );
            Ok(ResultSet::new())
        }
    }
}
