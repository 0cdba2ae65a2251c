//! Per-worker fetcher construction.
//!
//! Each crawl worker presents its own randomly chosen user agent, so stages
//! ask a [`FetcherSource`] for a fresh fetcher per worker instead of sharing
//! one client.

use std::sync::Arc;

use chrono::NaiveDate;
use shelf_crawl_scraper::{
    CatalogFetcher, FetcherConfig, HttpCatalogFetcher, ProxyDetails, UserAgents,
};
use shelf_crawl_storage::{BlobStore, read_json};

use crate::{PipelineConfig, PipelineError};

/// Hands out fetchers to crawl workers.
pub trait FetcherSource: Send + Sync {
    /// Builds the fetcher for one worker.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the fetcher cannot be built.
    fn worker_fetcher(&self) -> Result<Arc<dyn CatalogFetcher>, PipelineError>;

    /// Checks the source can be used on `today`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if crawling must not start.
    fn check_ready(&self, _today: NaiveDate) -> Result<(), PipelineError> {
        Ok(())
    }
}

/// Builds [`HttpCatalogFetcher`]s from the stored proxy details and user
/// agent pool.
#[derive(Debug, Clone)]
pub struct HttpFetcherSource {
    config: FetcherConfig,
    proxy: Option<ProxyDetails>,
    user_agents: UserAgents,
}

impl HttpFetcherSource {
    /// Creates a source from already-loaded parts.
    #[must_use]
    pub const fn new(
        config: FetcherConfig,
        proxy: Option<ProxyDetails>,
        user_agents: UserAgents,
    ) -> Self {
        Self {
            config,
            proxy,
            user_agents,
        }
    }

    /// Loads the proxy details and user agent pool named in `config` from
    /// `store`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingBlob`] if a configured key is absent,
    /// or any storage error.
    pub async fn load(
        store: &dyn BlobStore,
        config: &PipelineConfig,
    ) -> Result<Self, PipelineError> {
        let proxy = match &config.proxy_details_key {
            Some(key) => {
                let details: ProxyDetails =
                    read_json(store, key)
                        .await?
                        .ok_or_else(|| PipelineError::MissingBlob { key: key.clone() })?;
                log::info!("Loaded proxy details ({}:{})", details.address, details.port);
                Some(details)
            }
            None => {
                log::warn!("No proxy configured; requests go out directly");
                None
            }
        };

        let user_agents = match &config.user_agents_key {
            Some(key) => {
                let pool: UserAgents = read_json(store, key)
                    .await?
                    .ok_or_else(|| PipelineError::MissingBlob { key: key.clone() })?;
                if pool.is_empty() {
                    log::warn!("User agent pool {key} is empty; workers use the fallback agent");
                } else {
                    log::info!("Loaded {} user agent(s)", pool.len());
                }
                pool
            }
            None => UserAgents::default(),
        };

        Ok(Self::new(config.fetcher.clone(), proxy, user_agents))
    }
}

impl FetcherSource for HttpFetcherSource {
    fn worker_fetcher(&self) -> Result<Arc<dyn CatalogFetcher>, PipelineError> {
        let fetcher = HttpCatalogFetcher::new(
            self.config.clone(),
            self.proxy.as_ref(),
            self.user_agents.choose(),
        )?;
        Ok(Arc::new(fetcher))
    }

    fn check_ready(&self, today: NaiveDate) -> Result<(), PipelineError> {
        if let Some(proxy) = &self.proxy {
            proxy.check_expiry(today)?;
        }
        Ok(())
    }
}

/// Gives every worker the same fetcher.
#[derive(Clone)]
pub struct SharedFetcher(pub Arc<dyn CatalogFetcher>);

impl FetcherSource for SharedFetcher {
    fn worker_fetcher(&self) -> Result<Arc<dyn CatalogFetcher>, PipelineError> {
        Ok(Arc::clone(&self.0))
    }
}
