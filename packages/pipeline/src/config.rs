//! Pipeline configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file is a valid configuration:
//!
//! ```toml
//! pages_per_partition = 20
//! seconds_per_item = 13.0
//! budget_minutes = 12.5
//! max_missed_fraction = 0.333
//! delay_secs = [8.0, 12.0]
//! worker_concurrency = 4
//! history_path = "data/history.parquet"
//! proxy_details_key = "config/proxy_details.json"
//! user_agents_key = "config/user_agents.json"
//!
//! [storage]
//! backend = "s3"
//! bucket = "shelf-crawl-data"
//!
//! [fetcher]
//! excluded_sections = ["pets", "baby"]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shelf_crawl_reconcile::{DEFAULT_MAX_MISSED_FRACTION, RetryPolicy};
use shelf_crawl_scraper::{FetcherConfig, Pacer};

use crate::PipelineError;

/// Where blobs are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageConfig {
    /// An S3-compatible bucket; credentials come from the environment.
    S3 {
        /// Bucket name.
        bucket: String,
    },
    /// A local directory.
    Local {
        /// Root directory.
        dir: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Local {
            dir: PathBuf::from("data/blobs"),
        }
    }
}

/// Settings shared by every stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pages per crawl partition.
    pub pages_per_partition: u32,
    /// Seconds one worker needs per product detail page.
    pub seconds_per_item: f64,
    /// Minutes of work per retry worker.
    pub budget_minutes: f64,
    /// Largest fraction of the master table a run may miss.
    pub max_missed_fraction: f64,
    /// Jittered delay range between fetches, in seconds.
    pub delay_secs: [f64; 2],
    /// Workers the local runner keeps in flight.
    pub worker_concurrency: usize,
    /// Only crawl the first N sections.
    pub test_limit: Option<usize>,
    /// Where stage blobs and the master table live.
    pub storage: StorageConfig,
    /// Parquet file holding the historical table.
    pub history_path: PathBuf,
    /// Catalog site, request timeout and extraction selectors.
    pub fetcher: FetcherConfig,
    /// Blob key of the proxy details; no proxy when unset.
    pub proxy_details_key: Option<String>,
    /// Blob key of the user agent pool; a fallback agent when unset.
    pub user_agents_key: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            pages_per_partition: 20,
            seconds_per_item: retry.seconds_per_item,
            budget_minutes: retry.budget_minutes,
            max_missed_fraction: DEFAULT_MAX_MISSED_FRACTION,
            delay_secs: [8.0, 12.0],
            worker_concurrency: 4,
            test_limit: None,
            storage: StorageConfig::default(),
            history_path: PathBuf::from("data/history.parquet"),
            fetcher: FetcherConfig::default(),
            proxy_details_key: None,
            user_agents_key: None,
        }
    }
}

impl PipelineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Toml`] for malformed TOML, or
    /// [`PipelineError::Config`] if a value is out of range.
    pub fn from_toml_str(text: &str) -> Result<Self, PipelineError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Io`] if the file cannot be read, otherwise
    /// as [`Self::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        log::debug!("Loading configuration from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Rejects non-positive numeric knobs.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] naming the first bad value.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.pages_per_partition == 0 {
            return Err(config_error("pages_per_partition must be at least 1"));
        }
        if self.worker_concurrency == 0 {
            return Err(config_error("worker_concurrency must be at least 1"));
        }
        if !(self.max_missed_fraction.is_finite() && self.max_missed_fraction > 0.0) {
            return Err(config_error(format!(
                "max_missed_fraction must be positive (got {})",
                self.max_missed_fraction
            )));
        }
        let [low, high] = self.delay_secs;
        if !(low.is_finite() && high.is_finite() && low >= 0.0 && low <= high) {
            return Err(config_error(format!(
                "delay_secs must be an ordered non-negative range (got [{low}, {high}])"
            )));
        }
        if self.fetcher.items_per_page == 0 {
            return Err(config_error("fetcher.items_per_page must be at least 1"));
        }
        self.retry_policy()
            .validate()
            .map_err(|e| config_error(e.to_string()))?;
        Ok(())
    }

    /// Retry throughput model built from the config.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            seconds_per_item: self.seconds_per_item,
            budget_minutes: self.budget_minutes,
        }
    }

    /// Fetch pacing built from [`Self::delay_secs`].
    #[must_use]
    pub fn pacer(&self) -> Pacer {
        Pacer::new(self.delay_secs[0], self.delay_secs[1])
    }
}

fn config_error(message: impl Into<String>) -> PipelineError {
    PipelineError::Config {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.pages_per_partition, 20);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn parses_storage_and_fetcher_sections() {
        let config = PipelineConfig::from_toml_str(
            r#"
            pages_per_partition = 10
            test_limit = 2
            delay_secs = [0.0, 0.5]
            proxy_details_key = "config/proxy.json"

            [storage]
            backend = "s3"
            bucket = "crawl-bucket"

            [fetcher]
            excluded_sections = ["pets"]

            [fetcher.selectors]
            detail_title = "h1.title"
            "#,
        )
        .unwrap();

        assert_eq!(config.pages_per_partition, 10);
        assert_eq!(config.test_limit, Some(2));
        assert_eq!(
            config.storage,
            StorageConfig::S3 {
                bucket: "crawl-bucket".to_string()
            }
        );
        assert_eq!(config.fetcher.excluded_sections, vec!["pets"]);
        assert_eq!(config.fetcher.selectors.detail_title, "h1.title");
        assert_eq!(config.fetcher.items_per_page, 48);
        assert_eq!(config.proxy_details_key.as_deref(), Some("config/proxy.json"));
    }

    #[test]
    fn rejects_zero_partition_size() {
        assert!(matches!(
            PipelineConfig::from_toml_str("pages_per_partition = 0"),
            Err(PipelineError::Config { .. })
        ));
    }

    #[test]
    fn rejects_non_positive_retry_knobs() {
        assert!(matches!(
            PipelineConfig::from_toml_str("seconds_per_item = 0.0"),
            Err(PipelineError::Config { .. })
        ));
        assert!(matches!(
            PipelineConfig::from_toml_str("budget_minutes = -1.0"),
            Err(PipelineError::Config { .. })
        ));
    }

    #[test]
    fn rejects_reversed_delay_range() {
        assert!(matches!(
            PipelineConfig::from_toml_str("delay_secs = [5.0, 1.0]"),
            Err(PipelineError::Config { .. })
        ));
    }

    #[test]
    fn malformed_toml_is_reported() {
        assert!(matches!(
            PipelineConfig::from_toml_str("pages_per_partition = \"many\""),
            Err(PipelineError::Toml(_))
        ));
    }
}
