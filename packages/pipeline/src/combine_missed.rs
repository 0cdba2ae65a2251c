//! Stage 6: merge retry results and prune dead products.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use shelf_crawl_catalog_models::{MasterTable, ProductId};
use shelf_crawl_storage::{BlobRef, BlobStore, keys, read_json, write_json};

use crate::PipelineError;
use crate::combine::load_all;
use crate::scrape_missed::RetryOutput;

/// Merges the retry workers' results and removes every reported dead id
/// from the master table and from the merged set.
///
/// The master table is written at most once, after all workers have
/// reported. Returns `None` when there were no retry workers.
///
/// # Errors
///
/// Returns [`PipelineError::Storage`] if reading or writing fails.
pub async fn run(
    store: &dyn BlobStore,
    outputs: &[RetryOutput],
    now: DateTime<Utc>,
) -> Result<Option<BlobRef>, PipelineError> {
    if outputs.is_empty() {
        log::info!("No retry results to combine");
        return Ok(None);
    }

    let blobs: Vec<BlobRef> = outputs.iter().map(|o| o.result.clone()).collect();
    let mut combined = shelf_crawl_reconcile::merge(load_all(store, &blobs).await?);

    let dead: BTreeSet<ProductId> = outputs
        .iter()
        .flat_map(|o| o.dead.iter().cloned())
        .collect();

    if !dead.is_empty() {
        let stored: Option<MasterTable> = read_json(store, keys::MASTER_KEY).await?;
        if stored.is_none() {
            log::warn!("No master table to prune {} dead product(s) from", dead.len());
        }
        let mut master = stored.unwrap_or_default();
        let stats = shelf_crawl_reconcile::prune_dead(&mut master, &mut combined, &dead);
        if stats.from_master > 0 {
            write_json(store, keys::MASTER_KEY, &master).await?;
        }
    }

    let blob = write_json(store, &keys::combined_missed(now), &combined).await?;
    Ok(Some(blob))
}
