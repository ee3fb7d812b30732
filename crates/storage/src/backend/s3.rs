//! S3-compatible storage backend.
//!
//! Used to read provider documents out of S3-compatible object stores such
//! as Cloudflare R2, MinIO, or AWS S3 itself.
//!
//! # Credentials
//!
//! Credentials are always static (key id + secret) and supplied by the
//! caller. The SDK's default credential chain is never consulted.

use crate::{
    StorageBackend,
    error::{ErrorKind, Result},
    validate_path,
};
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, retry::RetryConfig},
    error::DisplayErrorContext,
};
use std::path::Path;

/// Read-only S3-compatible storage backend.
///
/// Reads objects from the root of a single bucket. Write, delete and rename
/// fail with [`ErrorKind::Unsupported`].
///
/// # Examples
///
/// ```no_run
/// use seedmirror_storage::backend::S3Backend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = S3Backend::new(
///     "r2",
///     "my-bucket",
///     "auto",
///     Some("https://0123456789abcdef.r2.cloudflarestorage.com"),
///     "access_key_id",
///     "secret_access_key",
/// );
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3Backend {
    name: String,
    client: Client,
    bucket: String,
}

impl S3Backend {
    /// Create a new S3 storage backend.
    ///
    /// # Arguments
    /// * `name` - A name for this backend (used in logging)
    /// * `bucket` - S3 bucket name
    /// * `region` - Provider-specific region (`"auto"` for R2)
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    /// * `key_id` - Access key ID
    /// * `key_secret` - Secret access key
    pub fn new(
        name: impl Into<String>,
        bucket: impl Into<String>,
        region: impl Into<String>,
        endpoint: Option<impl Into<String>>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Self {
        let credentials = Credentials::new(key_id, key_secret, None, None, "seedmirror");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region.into()))
            // One attempt per request; callers move on to the next provider instead.
            .retry_config(RetryConfig::disabled())
            // Path-style addressing for S3-compatible services (R2, MinIO, etc.)
            .force_path_style(true);
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        Self::from_client(name, Client::from_conf(config_builder.build()), bucket)
    }

    /// Wrap an already configured client.
    pub fn from_client(name: impl Into<String>, client: Client, bucket: impl Into<String>) -> Self {
        Self { name: name.into(), client, bucket: bucket.into() }
    }

    /// Bucket this backend reads from.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn key(path: &Path) -> Result<String> {
        Ok(validate_path(path)?.to_string_lossy().into_owned())
    }

    fn network_error(err: impl std::error::Error) -> ErrorKind {
        ErrorKind::Network(DisplayErrorContext(err).to_string())
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let key = Self::key(path)?;
        match self.client.head_object().bucket(&self.bucket).key(&key).send().await {
            Ok(_) => Ok(true),
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(false),
            Err(err) => exn::bail!(Self::network_error(err)),
        }
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let key = Self::key(path)?;
        tracing::debug!(backend = %self.name, bucket = %self.bucket, key = %key, "Fetching object");
        let output = match self.client.get_object().bucket(&self.bucket).key(&key).send().await {
            Ok(output) => output,
            Err(err) if err.as_service_error().is_some_and(|e| e.is_no_such_key()) => {
                exn::bail!(ErrorKind::NotFound(path.to_path_buf()))
            },
            Err(err) => exn::bail!(Self::network_error(err)),
        };
        let body = output.body.collect().await.map_err(Self::network_error)?;
        Ok(body.into_bytes().to_vec())
    }

    async fn write(&self, _path: &Path, _data: &[u8]) -> Result<()> {
        exn::bail!(ErrorKind::Unsupported("write"))
    }

    async fn delete(&self, _path: &Path) -> Result<()> {
        exn::bail!(ErrorKind::Unsupported("delete"))
    }

    async fn rename(&self, _from: &Path, _to: &Path) -> Result<()> {
        exn::bail!(ErrorKind::Unsupported("rename"))
    }
}
