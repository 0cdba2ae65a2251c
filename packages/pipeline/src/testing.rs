//! Scripted fetcher for stage tests.

use std::collections::BTreeSet;
use std::sync::Mutex;

use async_trait::async_trait;
use shelf_crawl_catalog_models::{PageCount, ProductId, ProductRecord, Section};
use shelf_crawl_scraper::{CatalogFetcher, DEFAULT_ITEMS_PER_PAGE, FetchError, SectionSize};

/// A catalog of generated products.
///
/// Section `s` with `n` items lists products `s-0000` through `s-{n-1}`,
/// 48 to a page. Hidden ids are left off listing pages but still resolve on
/// detail pages; dead ids resolve nowhere.
#[derive(Debug, Default)]
pub struct FakeFetcher {
    sections: Vec<(Section, u64)>,
    hidden: BTreeSet<ProductId>,
    dead: BTreeSet<ProductId>,
    failing_pages: BTreeSet<(String, PageCount)>,
    failing_details: BTreeSet<ProductId>,
    page_requests: Mutex<Vec<(String, PageCount)>>,
}

pub fn product_id(section: &str, index: u64) -> ProductId {
    ProductId::new(format!("{section}-{index:04}"))
}

impl FakeFetcher {
    pub fn with_section(mut self, name: &str, items: u64) -> Self {
        self.sections.push((Section::new(name), items));
        self
    }

    pub fn with_hidden(mut self, id: &ProductId) -> Self {
        self.hidden.insert(id.clone());
        self
    }

    pub fn with_dead(mut self, id: &ProductId) -> Self {
        self.dead.insert(id.clone());
        self
    }

    pub fn with_failing_page(mut self, section: &str, page: PageCount) -> Self {
        self.failing_pages.insert((section.to_string(), page));
        self
    }

    pub fn with_failing_detail(mut self, id: &ProductId) -> Self {
        self.failing_details.insert(id.clone());
        self
    }

    pub fn page_requests(&self) -> Vec<(String, PageCount)> {
        self.page_requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn items(&self, section: &Section) -> u64 {
        self.sections
            .iter()
            .find(|(s, _)| s == section)
            .map_or(0, |(_, items)| *items)
    }
}

fn record(section: &str, index: u64) -> ProductRecord {
    let mut record = ProductRecord::new(
        product_id(section, index),
        format!("{section} product {index}"),
    );
    #[allow(clippy::cast_precision_loss)]
    let price = 1.0 + index as f64 / 100.0;
    record.price_per_unit = Some(price);
    record.category_path = vec![section.to_string()];
    record
}

#[async_trait]
impl CatalogFetcher for FakeFetcher {
    async fn list_sections(&self) -> Result<Vec<Section>, FetchError> {
        Ok(self.sections.iter().map(|(s, _)| s.clone()).collect())
    }

    async fn fetch_page_count(&self, section: &Section) -> Result<SectionSize, FetchError> {
        Ok(SectionSize::from_items(
            self.items(section),
            DEFAULT_ITEMS_PER_PAGE,
        ))
    }

    async fn fetch_catalog_page(
        &self,
        section: &Section,
        page: PageCount,
    ) -> Result<Vec<ProductRecord>, FetchError> {
        let key = (section.as_str().to_string(), page);
        if let Ok(mut requests) = self.page_requests.lock() {
            requests.push(key.clone());
        }
        if self.failing_pages.contains(&key) {
            return Err(FetchError::Parse(format!("scripted failure for {section} page {page}")));
        }

        let per_page = u64::from(DEFAULT_ITEMS_PER_PAGE);
        let start = u64::from(page.saturating_sub(1)) * per_page;
        let end = (start + per_page).min(self.items(section));
        Ok((start..end)
            .map(|i| record(section.as_str(), i))
            .filter(|r| !self.hidden.contains(&r.id))
            .collect())
    }

    async fn fetch_product_detail(
        &self,
        id: &ProductId,
    ) -> Result<Option<ProductRecord>, FetchError> {
        if self.failing_details.contains(id) {
            return Err(FetchError::Status {
                url: format!("/products/{id}"),
                status: 503,
            });
        }
        if self.dead.contains(id) {
            return Ok(None);
        }
        let parsed = id
            .as_str()
            .rsplit_once('-')
            .and_then(|(section, index)| Some((section, index.parse::<u64>().ok()?)));
        Ok(parsed.map(|(section, index)| record(section, index)))
    }
}
