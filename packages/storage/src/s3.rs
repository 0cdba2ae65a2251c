//! S3-compatible object storage.
//!
//! # Environment Variables
//!
//! | Variable | Required | Description |
//! |---|---|---|
//! | `AWS_ACCESS_KEY_ID` | Yes | Access key |
//! | `AWS_SECRET_ACCESS_KEY` | Yes | Secret key |
//! | `AWS_REGION` | No | Region (defaults to `auto`) |
//! | `SHELF_CRAWL_S3_ENDPOINT` | No | Custom endpoint for S3-compatible providers |

use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::{Credentials, StalledStreamProtectionConfig};
use aws_sdk_s3::operation::get_object::GetObjectError;

use crate::{BlobStore, StorageError};

/// Environment variable naming a custom S3 endpoint.
pub const ENDPOINT_ENV: &str = "SHELF_CRAWL_S3_ENDPOINT";

/// [`BlobStore`] backed by one S3 bucket.
pub struct S3BlobStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl std::fmt::Debug for S3BlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3BlobStore")
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl S3BlobStore {
    /// Creates a client for `bucket` from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::MissingEnv`] if a credential variable is
    /// unset.
    pub fn from_env(bucket: &str) -> Result<Self, StorageError> {
        let access_key = require_env("AWS_ACCESS_KEY_ID")?;
        let secret_key = require_env("AWS_SECRET_ACCESS_KEY")?;
        let region = std::env::var("AWS_REGION").unwrap_or_else(|_| "auto".to_string());
        let endpoint = std::env::var(ENDPOINT_ENV).ok();

        let creds = Credentials::new(&access_key, &secret_key, None, None, "shelf-crawl-env");

        let mut builder = aws_sdk_s3::Config::builder()
            .region(Region::new(region))
            .credentials_provider(creds)
            .stalled_stream_protection(StalledStreamProtectionConfig::disabled());

        if let Some(endpoint) = &endpoint {
            log::debug!("Using S3 endpoint {endpoint}");
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
            bucket: bucket.to_string(),
        })
    }

    fn read_error(
        &self,
        key: &str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> StorageError {
        StorageError::Read {
            location: self.bucket.clone(),
            key: key.to_string(),
            source: Box::new(source),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    fn location(&self) -> &str {
        &self.bucket
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        log::debug!("Reading s3://{}/{key}", self.bucket);

        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                if err
                    .as_service_error()
                    .is_some_and(GetObjectError::is_no_such_key)
                {
                    log::debug!("  s3://{}/{key} not found", self.bucket);
                    return Ok(None);
                }
                return Err(self.read_error(key, err));
            }
        };

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| self.read_error(key, e))?;

        Ok(Some(bytes.into_bytes().to_vec()))
    }

    async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        #[allow(clippy::cast_precision_loss)] // display-only MB value
        let mb = bytes.len() as f64 / 1_048_576.0;
        log::info!("Pushing s3://{}/{key} ({mb:.2} MB)", self.bucket);

        let content_type = if std::path::Path::new(key)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        {
            "text/csv"
        } else {
            "application/json"
        };

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(aws_sdk_s3::primitives::ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::Write {
                location: self.bucket.clone(),
                key: key.to_string(),
                source: Box::new(e),
            })?;

        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                if err
                    .as_service_error()
                    .is_some_and(aws_sdk_s3::operation::head_object::HeadObjectError::is_not_found)
                {
                    return Ok(false);
                }
                Err(self.read_error(key, err))
            }
        }
    }
}

/// Reads a required environment variable.
fn require_env(name: &str) -> Result<String, StorageError> {
    std::env::var(name).map_err(|_| StorageError::MissingEnv {
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credentials_are_reported_by_name() {
        let err = require_env("SHELF_CRAWL_TEST_UNSET_VARIABLE").unwrap_err();
        assert!(
            matches!(err, StorageError::MissingEnv { ref name } if name == "SHELF_CRAWL_TEST_UNSET_VARIABLE")
        );
        assert_eq!(
            err.to_string(),
            "Missing environment variable: SHELF_CRAWL_TEST_UNSET_VARIABLE"
        );
    }
}
