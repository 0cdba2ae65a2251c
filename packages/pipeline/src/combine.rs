//! Stage 3: merge worker results.

use chrono::{DateTime, Utc};
use shelf_crawl_catalog_models::ResultSet;
use shelf_crawl_storage::{BlobRef, BlobStore, keys, write_json};

use crate::{PipelineError, load_result_set};

/// Reads every result blob in `inputs`, in order.
///
/// # Errors
///
/// Returns [`PipelineError::Storage`] if a blob exists but cannot be read.
pub async fn load_all(
    store: &dyn BlobStore,
    inputs: &[BlobRef],
) -> Result<Vec<ResultSet>, PipelineError> {
    let mut sets = Vec::with_capacity(inputs.len());
    for blob in inputs {
        sets.push(load_result_set(store, Some(blob)).await?);
    }
    Ok(sets)
}

/// Merges the worker result blobs into one combined blob.
///
/// Returns `None` when there are no worker outputs, so the next stage sees
/// an absent input rather than an empty blob.
///
/// # Errors
///
/// Returns [`PipelineError::Storage`] if reading or writing fails.
pub async fn run(
    store: &dyn BlobStore,
    inputs: &[BlobRef],
    now: DateTime<Utc>,
) -> Result<Option<BlobRef>, PipelineError> {
    if inputs.is_empty() {
        log::warn!("No worker results to combine");
        return Ok(None);
    }

    let combined = shelf_crawl_reconcile::merge(load_all(store, inputs).await?);
    let blob = write_json(store, &keys::combined(now), &combined).await?;
    Ok(Some(blob))
}

#[cfg(test)]
mod tests {
    use shelf_crawl_catalog_models::{ProductId, ProductRecord};
    use shelf_crawl_storage::memory::MemoryBlobStore;

    use super::*;

    fn set(records: &[(&str, &str)]) -> ResultSet {
        records
            .iter()
            .map(|(id, name)| ProductRecord::new(*id, *name))
            .collect()
    }

    #[tokio::test]
    async fn no_inputs_yields_none() {
        let store = MemoryBlobStore::new("bucket");
        assert_eq!(run(&store, &[], Utc::now()).await.unwrap(), None);
        assert!(store.keys().is_empty());
    }

    #[tokio::test]
    async fn merges_inputs_and_skips_missing_blobs() {
        let store = MemoryBlobStore::new("bucket");
        let a = write_json(&store, "raw_data/a.json", &set(&[("1", "Milk"), ("2", "Eggs")]))
            .await
            .unwrap();
        let b = write_json(&store, "raw_data/b.json", &set(&[("2", "Free Range Eggs")]))
            .await
            .unwrap();
        let missing = store.blob_ref("raw_data/never-written.json");

        let blob = run(&store, &[a, missing, b], Utc::now())
            .await
            .unwrap()
            .unwrap();

        assert!(blob.key.starts_with(keys::INTERMEDIATE_PREFIX));
        let combined = load_result_set(&store, Some(&blob)).await.unwrap();
        assert_eq!(combined.len(), 2);
        assert_eq!(
            combined.get(&ProductId::new("2")).map(|r| r.name.as_str()),
            Some("Free Range Eggs")
        );
    }
}
