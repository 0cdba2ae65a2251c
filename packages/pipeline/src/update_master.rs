//! Stage 4: fold the combined results into the master table and schedule
//! retries for whatever went missing.

use serde::{Deserialize, Serialize};
use shelf_crawl_catalog_models::{MasterTable, RetryPartition};
use shelf_crawl_storage::{BlobRef, BlobStore, keys, read_json, write_json};

use crate::{PipelineConfig, PipelineError, load_result_set};

/// What the master update produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateMasterOutput {
    /// Batches of missed ids for the retry workers.
    pub retry_partitions: Vec<RetryPartition>,
    /// Number of known ids the run missed.
    pub missed: usize,
    /// Number of ids new to the master table.
    pub added: usize,
    /// Size of the master table after the update.
    pub master_size: usize,
}

/// Reconciles the combined results against the stored master table, writes
/// the updated table, and plans the retries.
///
/// An absent `combined` reference is treated as an empty run. On a
/// reconciliation anomaly nothing is written.
///
/// # Errors
///
/// * [`PipelineError::Reconcile`] if too much of the master table was
///   missed, or the retry policy is invalid.
/// * [`PipelineError::Storage`] if reading or writing fails.
pub async fn run(
    store: &dyn BlobStore,
    combined: Option<&BlobRef>,
    config: &PipelineConfig,
) -> Result<UpdateMasterOutput, PipelineError> {
    let results = load_result_set(store, combined).await?;
    let master: Option<MasterTable> = read_json(store, keys::MASTER_KEY).await?;

    let reconciliation =
        shelf_crawl_reconcile::reconcile(master, &results, config.max_missed_fraction)?;
    let retry_partitions =
        shelf_crawl_reconcile::plan_retries(&reconciliation.missed, &config.retry_policy())?;

    write_json(store, keys::MASTER_KEY, &reconciliation.master).await?;

    let output = UpdateMasterOutput {
        retry_partitions,
        missed: reconciliation.missed.len(),
        added: reconciliation.added,
        master_size: reconciliation.master.len(),
    };
    log::info!(
        "Master table now holds {} product(s) ({} new, {} missed, {} retry partition(s))",
        output.master_size,
        output.added,
        output.missed,
        output.retry_partitions.len()
    );
    Ok(output)
}
