#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Fetch-and-extract for the grocery catalog.
//!
//! [`CatalogFetcher`] is the seam between the pipeline and the website: it
//! lists sections, sizes them, and turns listing and product pages into
//! [`ProductRecord`]s. [`http::HttpCatalogFetcher`] implements it over
//! `reqwest` with CSS selectors from [`selectors::SelectorConfig`]; the
//! HTML parsing lives in [`extract`] so it can be tested on fixtures.
//!
//! Fetchers never sleep. Callers pace consecutive requests with a
//! [`pacer::Pacer`].

pub mod extract;
pub mod http;
pub mod pacer;
pub mod proxy;
pub mod selectors;
pub mod user_agents;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shelf_crawl_catalog_models::{PageCount, ProductId, ProductRecord, Section};

pub use http::{FetcherConfig, HttpCatalogFetcher};
pub use pacer::Pacer;
pub use proxy::ProxyDetails;
pub use user_agents::UserAgents;

/// Listing pages show this many products each.
pub const DEFAULT_ITEMS_PER_PAGE: u32 = 48;

/// Errors that can occur while fetching or extracting catalog pages.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// An HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an unexpected status.
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// A page did not contain what the selectors expect.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A configured CSS selector is invalid.
    #[error("Invalid CSS selector '{selector}': {message}")]
    Selector {
        /// The selector text.
        selector: String,
        /// Parser message.
        message: String,
    },

    /// The configured proxy is past its expiry date.
    #[error("Proxy expired on {expiry}; renew it before crawling")]
    ProxyExpired {
        /// Expiry date from the proxy details.
        expiry: chrono::NaiveDate,
    },
}

/// Size of one catalog section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSize {
    /// Products listed in the section.
    pub items: u64,
    /// Listing pages needed to show them.
    pub pages: PageCount,
}

impl SectionSize {
    /// Derives the page count from an item count.
    #[must_use]
    pub fn from_items(items: u64, items_per_page: u32) -> Self {
        let pages = items.div_ceil(u64::from(items_per_page.max(1)));
        Self {
            items,
            pages: PageCount::try_from(pages).unwrap_or(PageCount::MAX),
        }
    }
}

/// Fetch-and-extract collaborator used by the crawl stages.
#[async_trait]
pub trait CatalogFetcher: Send + Sync {
    /// Lists the catalog's sections in site order.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the landing page cannot be fetched.
    async fn list_sections(&self) -> Result<Vec<Section>, FetchError>;

    /// Counts the items and listing pages in `section`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the section page cannot be fetched or has
    /// no item count.
    async fn fetch_page_count(&self, section: &Section) -> Result<SectionSize, FetchError>;

    /// Fetches one listing page (1-based) of `section`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the page cannot be fetched.
    async fn fetch_catalog_page(
        &self,
        section: &Section,
        page: PageCount,
    ) -> Result<Vec<ProductRecord>, FetchError>;

    /// Fetches a product's detail page. `None` means the product is gone:
    /// the page is missing or yields no name.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] for transport failures.
    async fn fetch_product_detail(
        &self,
        id: &ProductId,
    ) -> Result<Option<ProductRecord>, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(SectionSize::from_items(0, 48).pages, 0);
        assert_eq!(SectionSize::from_items(1, 48).pages, 1);
        assert_eq!(SectionSize::from_items(48, 48).pages, 1);
        assert_eq!(SectionSize::from_items(49, 48).pages, 2);
        assert_eq!(SectionSize::from_items(1234, 48).pages, 26);
    }
}
