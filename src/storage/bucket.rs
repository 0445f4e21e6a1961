use anyhow::{Context, Result};
use async_trait::async_trait;
use s3::creds::Credentials;
use s3::region::Region;
use s3::Bucket;
use tracing::debug;

use super::CorpusStore;
use crate::config::Config;

/// Stores corpora in an S3-compatible bucket.
#[derive(Clone)]
pub struct S3CorpusStore {
    bucket: Box<Bucket>,
}

impl S3CorpusStore {
    /// Create a store from configuration.
    ///
    /// Credentials come from `AWS_ACCESS_KEY_ID` and `AWS_SECRET_ACCESS_KEY`.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials are missing or the bucket handle
    /// cannot be created.
    pub fn new(config: &Config) -> Result<Self> {
        let bucket_name = config
            .s3_bucket
            .as_deref()
            .context("S3_BUCKET not set")?;
        let access_key = std::env::var("AWS_ACCESS_KEY_ID").context("AWS_ACCESS_KEY_ID not set")?;
        let secret_key =
            std::env::var("AWS_SECRET_ACCESS_KEY").context("AWS_SECRET_ACCESS_KEY not set")?;

        let credentials = Credentials::new(Some(&access_key), Some(&secret_key), None, None, None)
            .context("Failed to create S3 credentials")?;

        let region = if let Some(ref endpoint) = config.s3_endpoint {
            Region::Custom {
                region: config.s3_region.clone(),
                endpoint: endpoint.clone(),
            }
        } else {
            config.s3_region.parse().unwrap_or(Region::UsEast1)
        };

        let bucket =
            Bucket::new(bucket_name, region, credentials).context("Failed to create S3 bucket")?;

        // Use path-style for custom endpoints (MinIO, R2, GCS interop, etc.)
        let bucket = if config.s3_endpoint.is_some() {
            bucket.with_path_style()
        } else {
            bucket
        };

        Ok(Self { bucket })
    }
}

#[async_trait]
impl CorpusStore for S3CorpusStore {
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<()> {
        debug!(key = %key, content_type = %content_type, bytes = data.len(), "Uploading corpus to S3");

        let response = self
            .bucket
            .put_object_with_content_type(key, data, content_type)
            .await
            .context("Failed to upload corpus to S3")?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            anyhow::bail!("S3 upload of {key} failed with status {status}");
        }

        Ok(())
    }

    fn location(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket.name(), key)
    }
}

impl std::fmt::Debug for S3CorpusStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3CorpusStore")
            .field("bucket", &self.bucket.name())
            .finish()
    }
}
