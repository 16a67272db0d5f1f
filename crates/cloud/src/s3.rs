//! S3 implementation of [`ObjectStore`].
//!
//! The store is enabled only when both `AWS_S3_BUCKET` and `AWS_REGION`
//! are set. When disabled, every fetch fails with
//! [`ObjectStoreError::NotConfigured`] so jobs addressed by key are dropped
//! while path-addressed jobs keep working.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use tokio::io::AsyncWriteExt;
use yolo_core::error::ObjectStoreError;
use yolo_core::traits::ObjectStore;

/// Prefix of the temporary file a download is streamed into.
const TEMP_PREFIX: &str = ".download-";

/// Bucket and region of the upload store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
}

impl S3Config {
    /// Read `AWS_S3_BUCKET` and `AWS_REGION`. Returns `None` unless both
    /// are set and non-empty.
    pub fn from_env() -> Option<Self> {
        Self::from_values(
            std::env::var("AWS_S3_BUCKET").ok(),
            std::env::var("AWS_REGION").ok(),
        )
    }

    fn from_values(bucket: Option<String>, region: Option<String>) -> Option<Self> {
        let bucket = bucket.filter(|b| !b.trim().is_empty())?;
        let region = region.filter(|r| !r.trim().is_empty())?;
        Some(Self { bucket, region })
    }
}

/// Object store backed by one S3 bucket.
pub struct S3ObjectStore {
    inner: Option<Bucket>,
}

struct Bucket {
    client: aws_sdk_s3::Client,
    name: String,
}

impl S3ObjectStore {
    /// Build a client for `config`, loading credentials from the standard
    /// AWS provider chain.
    pub async fn new(config: S3Config) -> Self {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        tracing::info!(bucket = %config.bucket, region = %config.region, "S3 object store configured");

        Self {
            inner: Some(Bucket {
                client: aws_sdk_s3::Client::new(&sdk_config),
                name: config.bucket,
            }),
        }
    }

    /// A store that rejects every fetch.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Configure from the environment, falling back to [`Self::disabled`].
    pub async fn from_env() -> Self {
        match S3Config::from_env() {
            Some(config) => Self::new(config).await,
            None => {
                tracing::warn!("AWS_S3_BUCKET/AWS_REGION not set, object-store inputs are disabled");
                Self::disabled()
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn fetch(&self, key: &str, dest: &Path) -> Result<(), ObjectStoreError> {
        let bucket = self.inner.as_ref().ok_or(ObjectStoreError::NotConfigured)?;

        let parent = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        tokio::fs::create_dir_all(parent).await?;

        let response = bucket
            .client
            .get_object()
            .bucket(&bucket.name)
            .key(key)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Download {
                key: key.to_owned(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        // Stream into a temp file next to the destination, then rename, so a
        // failed download never leaves a truncated image at `dest`.
        let temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(parent)?;
        let mut file = tokio::fs::File::create(temp.path()).await?;
        let mut body = response.body;
        let mut bytes_written = 0usize;

        while let Some(chunk) = body.try_next().await.map_err(|e| ObjectStoreError::Download {
            key: key.to_owned(),
            message: e.to_string(),
        })? {
            file.write_all(&chunk).await?;
            bytes_written += chunk.len();
        }
        file.flush().await?;
        drop(file);

        temp.persist(dest).map_err(|e| ObjectStoreError::Io(e.error))?;

        tracing::debug!(key, dest = %dest.display(), bytes_written, "Object downloaded");
        Ok(())
    }
}
