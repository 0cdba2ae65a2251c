//! Stage 7: final combine and flattening to the processed CSV.

use chrono::{DateTime, Utc};
use shelf_crawl_storage::{BlobRef, BlobStore, keys};

use crate::{PipelineError, load_result_set};

/// Merges every combined blob (crawl and retry) and writes the flat CSV.
///
/// Absent references are skipped. On an id collision the later input wins,
/// so retry results passed after crawl results take precedence.
///
/// # Errors
///
/// Returns [`PipelineError::Storage`] if reading or writing fails, or
/// [`PipelineError::History`] if the CSV cannot be built.
pub async fn run(
    store: &dyn BlobStore,
    inputs: &[Option<BlobRef>],
    now: DateTime<Utc>,
) -> Result<BlobRef, PipelineError> {
    let mut sets = Vec::with_capacity(inputs.len());
    for blob in inputs.iter().flatten() {
        sets.push(load_result_set(store, Some(blob)).await?);
    }
    let skipped = inputs.len() - sets.len();
    if skipped > 0 {
        log::warn!("Skipping {skipped} absent combined input(s)");
    }

    let merged = shelf_crawl_reconcile::merge(sets);
    let csv = shelf_crawl_history::write_processed_csv(&merged)?;

    let key = keys::processed(now);
    store.write(&key, csv).await?;
    log::info!(
        "Wrote {} processed row(s) to {}/{key}",
        merged.len(),
        store.location()
    );
    Ok(store.blob_ref(&key))
}
