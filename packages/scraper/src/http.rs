//! [`CatalogFetcher`] over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use shelf_crawl_catalog_models::{PageCount, ProductId, ProductRecord, Section};

use crate::proxy::ProxyDetails;
use crate::selectors::SelectorConfig;
use crate::{CatalogFetcher, DEFAULT_ITEMS_PER_PAGE, FetchError, SectionSize, extract};

/// Where and how to fetch the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Site root, without a trailing slash.
    pub base_url: String,
    /// Path fragment that marks section links.
    pub shop_path: String,
    /// Sections never crawled.
    pub excluded_sections: Vec<String>,
    /// Products per listing page.
    pub items_per_page: u32,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// CSS selectors used to extract listings and detail pages.
    pub selectors: SelectorConfig,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.tesco.com/groceries/en-GB".to_owned(),
            shop_path: "/groceries/en-GB/shop/".to_owned(),
            excluded_sections: [
                "easter",
                "baby",
                "health-and-beauty",
                "pets",
                "household",
                "home-and-ents",
            ]
            .into_iter()
            .map(str::to_owned)
            .collect(),
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
            timeout_secs: 30,
            selectors: SelectorConfig::default(),
        }
    }
}

/// Fetches catalog pages with `reqwest` and extracts them with
/// [`extract`].
#[derive(Debug, Clone)]
pub struct HttpCatalogFetcher {
    client: reqwest::Client,
    config: FetcherConfig,
}

impl HttpCatalogFetcher {
    /// Builds a fetcher presenting `user_agent`, routed through `proxy` when
    /// one is given.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Selector`] if a configured selector is invalid,
    /// or [`FetchError::Http`] if the client cannot be built.
    pub fn new(
        config: FetcherConfig,
        proxy: Option<&ProxyDetails>,
        user_agent: &str,
    ) -> Result<Self, FetchError> {
        config.selectors.validate()?;

        let mut builder = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(config.timeout_secs));

        if let Some(proxy) = proxy {
            log::debug!("Routing requests through {}:{}", proxy.address, proxy.port);
            builder = builder.proxy(reqwest::Proxy::all(proxy.proxy_url())?);
        }

        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    fn section_url(&self, section: &Section) -> String {
        format!(
            "{}/shop/{section}/all?count={}",
            self.config.base_url, self.config.items_per_page
        )
    }

    fn page_url(&self, section: &Section, page: PageCount) -> String {
        format!(
            "{}/shop/{section}/all?page={page}&count={}",
            self.config.base_url, self.config.items_per_page
        )
    }

    fn detail_url(&self, id: &ProductId) -> String {
        format!("{}/products/{id}", self.config.base_url)
    }

    /// GETs `url` and returns the body, or `None` for 404/410.
    async fn get_text(&self, url: &str) -> Result<Option<String>, FetchError> {
        log::debug!("GET {url}");
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }

        Ok(Some(response.text().await?))
    }

    async fn get_required(&self, url: &str) -> Result<String, FetchError> {
        self.get_text(url).await?.ok_or_else(|| FetchError::Status {
            url: url.to_owned(),
            status: StatusCode::NOT_FOUND.as_u16(),
        })
    }
}

#[async_trait]
impl CatalogFetcher for HttpCatalogFetcher {
    async fn list_sections(&self) -> Result<Vec<Section>, FetchError> {
        let url = format!("{}/shop", self.config.base_url);
        let body = self.get_required(&url).await?;
        let sections = extract::sections(
            &body,
            &self.config.shop_path,
            &self.config.excluded_sections,
        )?;
        log::info!("Found {} catalog section(s)", sections.len());
        Ok(sections)
    }

    async fn fetch_page_count(&self, section: &Section) -> Result<SectionSize, FetchError> {
        let body = self.get_required(&self.section_url(section)).await?;
        let items = extract::item_count(&body, &self.config.selectors)?;
        let size = SectionSize::from_items(items, self.config.items_per_page);
        log::debug!("{section}: {} item(s), {} page(s)", size.items, size.pages);
        Ok(size)
    }

    async fn fetch_catalog_page(
        &self,
        section: &Section,
        page: PageCount,
    ) -> Result<Vec<ProductRecord>, FetchError> {
        let body = self.get_required(&self.page_url(section, page)).await?;
        extract::listing(&body, &self.config.selectors, &self.config.shop_path)
    }

    async fn fetch_product_detail(
        &self,
        id: &ProductId,
    ) -> Result<Option<ProductRecord>, FetchError> {
        let Some(body) = self.get_text(&self.detail_url(id)).await? else {
            return Ok(None);
        };
        extract::detail(&body, id, &self.config.selectors, &self.config.shop_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher() -> HttpCatalogFetcher {
        HttpCatalogFetcher::new(FetcherConfig::default(), None, "test-agent").unwrap()
    }

    #[test]
    fn builds_catalog_urls() {
        let fetcher = fetcher();
        let section = Section::new("fresh-food");

        assert_eq!(
            fetcher.section_url(&section),
            "https://www.tesco.com/groceries/en-GB/shop/fresh-food/all?count=48"
        );
        assert_eq!(
            fetcher.page_url(&section, 3),
            "https://www.tesco.com/groceries/en-GB/shop/fresh-food/all?page=3&count=48"
        );
        assert_eq!(
            fetcher.detail_url(&ProductId::new("254656543")),
            "https://www.tesco.com/groceries/en-GB/products/254656543"
        );
    }

    #[test]
    fn rejects_invalid_selector_config() {
        let mut config = FetcherConfig::default();
        config.selectors.detail_title = ":::".to_owned();
        assert!(matches!(
            HttpCatalogFetcher::new(config, None, "test-agent"),
            Err(FetchError::Selector { .. })
        ));
    }

    #[test]
    fn default_exclusions_cover_non_grocery_sections() {
        let config = FetcherConfig::default();
        assert!(config.excluded_sections.iter().any(|s| s == "pets"));
        assert_eq!(config.excluded_sections.len(), 6);
    }
}
