//! Runs every stage in one process.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt as _};
use serde::{Deserialize, Serialize};
use shelf_crawl_catalog_models::{Partition, RetryPartition};
use shelf_crawl_history::{AppendStats, HistoryTable};
use shelf_crawl_storage::{BlobRef, BlobStore};

use crate::partition::PartitionRequest;
use crate::scrape_missed::RetryOutput;
use crate::{
    FetcherSource, PipelineConfig, PipelineError, append, combine, combine_missed, partition,
    postprocess, scrape, scrape_missed, update_master,
};

/// What a full run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Crawl partitions planned.
    pub partitions: usize,
    /// Crawl workers that failed outright.
    pub failed_workers: usize,
    /// Products in the master table that the crawl did not see.
    pub missed: usize,
    /// Retry partitions planned for the missed products.
    pub retry_partitions: usize,
    /// Retry workers that failed outright.
    pub failed_retry_workers: usize,
    /// Products pruned as no longer listed.
    pub dead: usize,
    /// Master table size after pruning.
    pub master_size: usize,
    /// The processed CSV handed to the append stage.
    pub processed: BlobRef,
    /// Rows appended to the historical table.
    pub appended: usize,
    /// Historical table size after the append.
    pub history_rows: usize,
}

/// Chains the eight stages, running crawl and retry workers concurrently
/// up to [`PipelineConfig::worker_concurrency`].
///
/// A worker that fails is logged and its results are left out. A
/// reconciliation anomaly aborts the run before the master table is
/// written.
///
/// # Errors
///
/// Returns the first stage-level [`PipelineError`].
pub async fn run(
    store: &dyn BlobStore,
    fetchers: &dyn FetcherSource,
    config: &PipelineConfig,
    request: &PartitionRequest,
    table: &mut dyn HistoryTable,
    now: DateTime<Utc>,
) -> Result<RunSummary, PipelineError> {
    let today = now.date_naive();

    let planned = partition::run(fetchers, config, request, today).await?;
    let (worker_results, failed_workers) =
        scrape_all(store, fetchers, config, &planned.partitions, now).await;

    let combined = combine::run(store, &worker_results, now).await?;
    let master = update_master::run(store, combined.as_ref(), config).await?;

    let (retry_outputs, failed_retry_workers) =
        scrape_missed_all(store, fetchers, config, &master.retry_partitions, now).await;
    let dead = retry_outputs.iter().map(|o| o.dead.len()).sum();
    let combined_missed = combine_missed::run(store, &retry_outputs, now).await?;

    let processed = postprocess::run(store, &[combined, combined_missed], now).await?;
    let AppendStats { appended, total } =
        append::run(store, &processed, table, today).await?;

    let summary = RunSummary {
        partitions: planned.partitions.len(),
        failed_workers,
        missed: master.missed,
        retry_partitions: master.retry_partitions.len(),
        failed_retry_workers,
        dead,
        master_size: master.master_size,
        processed,
        appended,
        history_rows: total,
    };
    log::info!("Run complete: {summary:?}");
    Ok(summary)
}

async fn scrape_all(
    store: &dyn BlobStore,
    fetchers: &dyn FetcherSource,
    config: &PipelineConfig,
    partitions: &[Partition],
    now: DateTime<Utc>,
) -> (Vec<BlobRef>, usize) {
    let pacer = config.pacer();

    let outcomes: Vec<_> = stream::iter(partitions.iter().enumerate().map(|(i, partition)| {
        async move {
            let fetcher = fetchers.worker_fetcher().map_err(|e| (i, e))?;
            scrape::run(fetcher.as_ref(), store, partition, &pacer, now)
                .await
                .map_err(|e| (i, e))
        }
    }))
    .buffer_unordered(config.worker_concurrency)
    .collect()
    .await;

    split_outcomes("Crawl", outcomes)
}

async fn scrape_missed_all(
    store: &dyn BlobStore,
    fetchers: &dyn FetcherSource,
    config: &PipelineConfig,
    partitions: &[RetryPartition],
    now: DateTime<Utc>,
) -> (Vec<RetryOutput>, usize) {
    let pacer = config.pacer();

    let outcomes: Vec<_> = stream::iter(partitions.iter().enumerate().map(|(i, partition)| {
        async move {
            let fetcher = fetchers.worker_fetcher().map_err(|e| (i, e))?;
            scrape_missed::run(fetcher.as_ref(), store, partition, &pacer, now)
                .await
                .map_err(|e| (i, e))
        }
    }))
    .buffer_unordered(config.worker_concurrency)
    .collect()
    .await;

    split_outcomes("Retry", outcomes)
}

fn split_outcomes<T>(
    kind: &str,
    outcomes: Vec<Result<T, (usize, PipelineError)>>,
) -> (Vec<T>, usize) {
    let mut succeeded = Vec::with_capacity(outcomes.len());
    let mut failed = 0;
    for outcome in outcomes {
        match outcome {
            Ok(value) => succeeded.push(value),
            Err((worker, e)) => {
                log::warn!("{kind} worker {worker} failed: {e}");
                failed += 1;
            }
        }
    }
    (succeeded, failed)
}
