//! Stage 2: crawl one partition's listing pages.

use chrono::{DateTime, Utc};
use shelf_crawl_catalog_models::{Partition, ResultSet};
use shelf_crawl_scraper::{CatalogFetcher, Pacer};
use shelf_crawl_storage::{BlobRef, BlobStore, keys, write_json};

use crate::PipelineError;

/// Fetches every page of every span in `partition` and writes the products
/// found as one result blob.
///
/// A page that fails to fetch is logged and skipped; its products surface
/// as missed items during reconciliation.
///
/// # Errors
///
/// * [`PipelineError::InvalidPartition`] if a span's page range is invalid;
///   nothing is fetched or written.
/// * [`PipelineError::Storage`] if the result blob cannot be written.
pub async fn run(
    fetcher: &dyn CatalogFetcher,
    store: &dyn BlobStore,
    partition: &Partition,
    pacer: &Pacer,
    now: DateTime<Utc>,
) -> Result<BlobRef, PipelineError> {
    partition.validate()?;

    log::info!(
        "Scraping partition of {} page(s) across {} span(s)",
        partition.total_pages(),
        partition.spans.len()
    );

    let mut results = ResultSet::new();
    let mut failed_pages = 0usize;
    let mut first = true;

    for span in &partition.spans {
        for page in span.pages() {
            if !first {
                pacer.pause().await;
            }
            first = false;

            match fetcher.fetch_catalog_page(&span.section, page).await {
                Ok(products) => {
                    log::debug!(
                        "{} page {page}: {} product(s)",
                        span.section,
                        products.len()
                    );
                    results.extend(products);
                }
                Err(e) => {
                    log::warn!("{} page {page} failed: {e}", span.section);
                    failed_pages += 1;
                }
            }
        }
    }

    log::info!(
        "Partition done: {} product(s), {failed_pages} failed page(s)",
        results.len()
    );

    Ok(write_json(store, &keys::worker_result(now), &results).await?)
}

#[cfg(test)]
mod tests {
    use shelf_crawl_catalog_models::{Section, Span};
    use shelf_crawl_storage::memory::MemoryBlobStore;

    use super::*;
    use crate::load_result_set;
    use crate::testing::{FakeFetcher, product_id};

    #[tokio::test]
    async fn writes_products_from_every_page_in_the_partition() {
        let fetcher = FakeFetcher::default()
            .with_section("bakery", 100)
            .with_section("frozen", 10);
        let store = MemoryBlobStore::new("bucket");
        let partition = Partition::new(vec![
            Span::new(Section::new("bakery"), 2, 3),
            Span::new(Section::new("frozen"), 1, 1),
        ]);

        let blob = run(&fetcher, &store, &partition, &Pacer::disabled(), Utc::now())
            .await
            .unwrap();

        assert!(blob.key.starts_with(keys::RAW_PREFIX));
        let results = load_result_set(&store, Some(&blob)).await.unwrap();
        assert_eq!(results.len(), 100 - 48 + 10);
        assert!(results.contains(&product_id("bakery", 48)));
        assert!(!results.contains(&product_id("bakery", 47)));
        assert_eq!(
            fetcher.page_requests(),
            vec![
                ("bakery".to_string(), 2),
                ("bakery".to_string(), 3),
                ("frozen".to_string(), 1),
            ]
        );
    }

    #[tokio::test]
    async fn failed_page_is_skipped() {
        let fetcher = FakeFetcher::default()
            .with_section("bakery", 96)
            .with_failing_page("bakery", 1);
        let store = MemoryBlobStore::new("bucket");
        let partition = Partition::new(vec![Span::new(Section::new("bakery"), 1, 2)]);

        let blob = run(&fetcher, &store, &partition, &Pacer::disabled(), Utc::now())
            .await
            .unwrap();

        let results = load_result_set(&store, Some(&blob)).await.unwrap();
        assert_eq!(results.len(), 48);
        assert!(results.contains(&product_id("bakery", 95)));
    }

    #[tokio::test]
    async fn invalid_span_is_rejected_before_any_fetch() {
        let fetcher = FakeFetcher::default().with_section("bakery", 96);
        let store = MemoryBlobStore::new("bucket");

        for span in [
            Span::new(Section::new("bakery"), 5, 3),
            Span::new(Section::new("bakery"), 0, 1),
        ] {
            let partition = Partition::new(vec![span]);
            let result = run(&fetcher, &store, &partition, &Pacer::disabled(), Utc::now()).await;
            assert!(matches!(result, Err(PipelineError::InvalidPartition(_))));
        }

        assert!(fetcher.page_requests().is_empty());
        assert!(store.keys().is_empty());
    }
}
