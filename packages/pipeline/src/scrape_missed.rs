//! Stage 5: re-fetch missed products one detail page at a time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelf_crawl_catalog_models::{ProductId, ResultSet, RetryPartition};
use shelf_crawl_scraper::{CatalogFetcher, Pacer};
use shelf_crawl_storage::{BlobRef, BlobStore, keys, write_json};

use crate::PipelineError;

/// One retry worker's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryOutput {
    /// Products recovered from their detail pages.
    pub result: BlobRef,
    /// Ids whose detail page no longer resolves.
    pub dead: Vec<ProductId>,
}

/// Fetches the detail page of every id in `partition`.
///
/// Ids that no longer resolve are reported as dead and never retried.
/// Transport failures are logged and skipped; those ids stay in the master
/// table and come up again next run.
///
/// # Errors
///
/// Returns [`PipelineError::Storage`] if the result blob cannot be written.
pub async fn run(
    fetcher: &dyn CatalogFetcher,
    store: &dyn BlobStore,
    partition: &RetryPartition,
    pacer: &Pacer,
    now: DateTime<Utc>,
) -> Result<RetryOutput, PipelineError> {
    log::info!("Re-fetching {} missed product(s)", partition.ids.len());

    let mut results = ResultSet::new();
    let mut dead = Vec::new();

    for (i, id) in partition.ids.iter().enumerate() {
        if i > 0 {
            pacer.pause().await;
        }

        match fetcher.fetch_product_detail(id).await {
            Ok(Some(record)) => {
                log::debug!("Recovered {id}: {}", record.name);
                results.insert(record);
            }
            Ok(None) => {
                log::warn!("Product {id} no longer exists");
                dead.push(id.clone());
            }
            Err(e) => log::warn!("Detail fetch for {id} failed: {e}"),
        }
    }

    log::info!(
        "Retry worker done: {} recovered, {} dead",
        results.len(),
        dead.len()
    );

    let result = write_json(store, &keys::worker_result(now), &results).await?;
    Ok(RetryOutput { result, dead })
}
