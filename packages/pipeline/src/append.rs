//! Stage 8: append the processed CSV to the historical table.

use chrono::NaiveDate;
use shelf_crawl_history::{AppendStats, HistoryTable};
use shelf_crawl_storage::{BlobRef, BlobStore};

use crate::PipelineError;

/// Casts the processed rows and appends them to `table`, stamped with
/// `run_date`.
///
/// A missing processed blob appends nothing. A cast failure aborts before
/// anything is written.
///
/// # Errors
///
/// Returns [`PipelineError::History`] for malformed rows or backend
/// failures, or [`PipelineError::Storage`] if the blob cannot be read.
pub async fn run(
    store: &dyn BlobStore,
    processed: &BlobRef,
    table: &mut dyn HistoryTable,
    run_date: NaiveDate,
) -> Result<AppendStats, PipelineError> {
    let Some(bytes) = store.read(&processed.key).await? else {
        log::warn!(
            "Processed blob {}/{} is missing; nothing to append",
            processed.bucket,
            processed.key
        );
        let total = table.read_table()?.len();
        return Ok(AppendStats { appended: 0, total });
    };

    Ok(shelf_crawl_history::append(table, &bytes, run_date)?)
}

#[cfg(test)]
mod tests {
    use shelf_crawl_history::{HistoryError, MemoryTable};
    use shelf_crawl_storage::memory::MemoryBlobStore;

    use super::*;

    const HEADER: &str = "id,name,price_per_unit,price_per_weight_quant,weight_quant_unit,offer,\
                          category_1,category_2,category_3,category_4\n";

    fn run_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[tokio::test]
    async fn appends_rows_with_run_date() {
        let store = MemoryBlobStore::new("bucket");
        let csv = format!("{HEADER}1,Milk,2.0,,,£1.50 Clubcard Price,dairy,,,\n");
        store
            .write("processed_data/p.csv", csv.into_bytes())
            .await
            .unwrap();
        let mut table = MemoryTable::new();

        let stats = run(&store, &store.blob_ref("processed_data/p.csv"), &mut table, run_date())
            .await
            .unwrap();

        assert_eq!(stats, AppendStats { appended: 1, total: 1 });
        assert_eq!(table.rows()[0].date, run_date());
        assert_eq!(table.rows()[0].clubcard_price, Some(1.5));
    }

    #[tokio::test]
    async fn missing_blob_appends_nothing() {
        let store = MemoryBlobStore::new("bucket");
        let mut table = MemoryTable::new();

        let stats = run(&store, &store.blob_ref("processed_data/gone.csv"), &mut table, run_date())
            .await
            .unwrap();

        assert_eq!(stats.appended, 0);
        assert!(table.rows().is_empty());
    }

    #[tokio::test]
    async fn cast_failure_writes_nothing() {
        let store = MemoryBlobStore::new("bucket");
        let csv = format!("{HEADER}1,Milk,cheap,,,,,,,\n");
        store
            .write("processed_data/p.csv", csv.into_bytes())
            .await
            .unwrap();
        let mut table = MemoryTable::new();

        let result = run(&store, &store.blob_ref("processed_data/p.csv"), &mut table, run_date()).await;

        assert!(matches!(
            result,
            Err(PipelineError::History(HistoryError::SchemaCast { .. }))
        ));
        assert!(table.rows().is_empty());
    }
}
