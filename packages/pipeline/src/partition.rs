//! Stage 1: discover sections, size them, and plan crawl partitions.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use shelf_crawl_catalog_models::{Partition, Section, SectionPages};

use crate::{FetcherSource, PipelineConfig, PipelineError};

/// Per-run overrides for the partition stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionRequest {
    /// Overrides [`PipelineConfig::pages_per_partition`].
    pub pages_per_partition: Option<u32>,
    /// Overrides [`PipelineConfig::test_limit`].
    pub test_limit: Option<usize>,
}

/// Item and page counts for one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionCount {
    /// Section the counts belong to.
    pub section: Section,
    /// Items the section's listing reports.
    pub items: u64,
    /// Listing pages needed to show every item.
    pub pages: u32,
}

/// Planned partitions plus the section sizes they were planned from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionOutput {
    /// One entry per crawl worker.
    pub partitions: Vec<Partition>,
    /// Sizes of every section that was planned, in discovery order.
    pub section_item_counts: Vec<SectionCount>,
}

/// Runs the partition stage.
///
/// # Errors
///
/// * [`PipelineError::Fetch`] if the proxy has expired or a section cannot
///   be sized.
/// * [`PipelineError::Plan`] if planning rejects the input.
pub async fn run(
    fetchers: &dyn FetcherSource,
    config: &PipelineConfig,
    request: &PartitionRequest,
    today: NaiveDate,
) -> Result<PartitionOutput, PipelineError> {
    fetchers.check_ready(today)?;
    let fetcher = fetchers.worker_fetcher()?;

    let mut sections = fetcher.list_sections().await?;
    log::info!(
        "Catalog sections: {}",
        sections
            .iter()
            .map(Section::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    );

    if let Some(limit) = request.test_limit.or(config.test_limit) {
        sections.truncate(limit);
        log::info!("Test mode: restricted to {} section(s)", sections.len());
    }

    let mut counts = Vec::with_capacity(sections.len());
    for section in sections {
        let size = fetcher.fetch_page_count(&section).await?;
        log::info!("{section}: {} item(s) over {} page(s)", size.items, size.pages);
        counts.push(SectionCount {
            section,
            items: size.items,
            pages: size.pages,
        });
    }

    let pages_per_partition = request
        .pages_per_partition
        .unwrap_or(config.pages_per_partition);
    let section_pages: Vec<SectionPages> = counts
        .iter()
        .map(|c| SectionPages::new(c.section.clone(), c.pages))
        .collect();

    let partitions = shelf_crawl_planner::plan(&section_pages, pages_per_partition)?;
    log::info!(
        "Planned {} partition(s) of up to {pages_per_partition} page(s)",
        partitions.len()
    );

    Ok(PartitionOutput {
        partitions,
        section_item_counts: counts,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use shelf_crawl_catalog_models::Span;

    use super::*;
    use crate::SharedFetcher;
    use crate::testing::FakeFetcher;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn source() -> SharedFetcher {
        let fetcher = FakeFetcher::default()
            .with_section("fresh-food", 3 * 48)
            .with_section("bakery", 48 + 1)
            .with_section("frozen", 0);
        SharedFetcher(Arc::new(fetcher))
    }

    #[tokio::test]
    async fn plans_partitions_from_section_sizes() {
        let request = PartitionRequest {
            pages_per_partition: Some(4),
            test_limit: None,
        };
        let output = run(&source(), &PipelineConfig::default(), &request, today())
            .await
            .unwrap();

        assert_eq!(
            output.partitions,
            vec![
                Partition::new(vec![
                    Span::new(Section::new("fresh-food"), 1, 3),
                    Span::new(Section::new("bakery"), 2, 2),
                ]),
                Partition::new(vec![Span::new(Section::new("bakery"), 1, 1)]),
            ]
        );
        assert_eq!(output.section_item_counts.len(), 3);
        assert_eq!(output.section_item_counts[1].items, 49);
        assert_eq!(output.section_item_counts[2].pages, 0);
    }

    #[tokio::test]
    async fn test_limit_keeps_leading_sections() {
        let request = PartitionRequest {
            pages_per_partition: None,
            test_limit: Some(1),
        };
        let output = run(&source(), &PipelineConfig::default(), &request, today())
            .await
            .unwrap();

        assert_eq!(output.section_item_counts.len(), 1);
        assert_eq!(
            output.partitions,
            vec![Partition::new(vec![Span::new(
                Section::new("fresh-food"),
                1,
                3
            )])]
        );
    }
}
