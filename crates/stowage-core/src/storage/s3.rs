//! S3-compatible storage backend.
//!
//! Works with AWS S3, MinIO, and other S3-compatible services.
//!
//! # Example
//!
//! ```rust,no_run
//! use stowage_core::config::{CannedAcl, S3Config};
//! use stowage_core::storage::{S3Storage, Storage};
//!
//! # async fn example() -> stowage_core::Result<()> {
//! // Connect to AWS S3 with credentials from the environment
//! let storage = S3Storage::from_env("my-bucket", "uploads/").await?;
//!
//! // Or connect to MinIO (local testing)
//! let config = S3Config::new("my-bucket", "us-east-1")
//!     .with_endpoint("http://localhost:9000")
//!     .with_credentials("minio", "minio123")
//!     .with_acl(CannedAcl::PublicRead);
//! let storage = S3Storage::with_config(&config).await?;
//! storage.save_bytes("hello.txt", "hi".into()).await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;
use tracing::debug;

use super::{ReadHandle, Storage};
use crate::config::{lookup_region, S3Config};
use crate::content_type;
use crate::error::{Result, StorageError};
use crate::path::Location;
use crate::stat::Stat;

const NOT_FOUND: u16 = 404;

/// S3-compatible storage backend.
pub struct S3Storage {
    bucket: Box<Bucket>,
    location: Location,
}

impl S3Storage {
    /// Create a new S3 storage backend from a validated config.
    ///
    /// Empty credentials in the config are read from the environment.
    pub async fn with_config(config: &S3Config) -> Result<Self> {
        config.validate()?;

        let region = match &config.endpoint {
            Some(endpoint) => Region::Custom {
                region: config.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => Region::try_from(lookup_region(&config.region)?)?,
        };

        let credentials = if config.access_key_id.is_empty() {
            Credentials::from_env()
        } else {
            Credentials::new(
                Some(config.access_key_id.as_str()),
                Some(config.secret_access_key.as_str()),
                None,
                None,
                None,
            )
        }
        .map_err(|e| StorageError::Config(format!("Failed to load credentials: {}", e)))?;

        let mut bucket = Bucket::new(&config.bucket, region, credentials)
            .map_err(|e| StorageError::Config(format!("Failed to create bucket: {}", e)))?;

        // Custom endpoints rarely support virtual-hosted style
        if config.endpoint.is_some() {
            bucket = bucket.with_path_style();
        }
        if let Some(acl) = config.acl {
            bucket.add_header("x-amz-acl", acl.as_str());
        }

        Ok(Self {
            bucket,
            location: Location::new(&config.prefix),
        })
    }

    /// Create from environment variables.
    ///
    /// Reads AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY, AWS_REGION, and optionally
    /// AWS_ENDPOINT_URL for custom endpoints.
    pub async fn from_env(bucket_name: &str, prefix: &str) -> Result<Self> {
        let region = std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string());
        let mut config = S3Config::new(bucket_name, region).with_prefix(prefix);
        if let Ok(endpoint) = std::env::var("AWS_ENDPOINT_URL") {
            config = config.with_endpoint(endpoint);
        }
        Self::with_config(&config).await
    }

    /// Bucket name.
    #[must_use]
    pub fn bucket_name(&self) -> String {
        self.bucket.name()
    }

    fn classify(op: &'static str, path: &str, err: S3Error) -> StorageError {
        match err {
            S3Error::HttpFailWithBody(NOT_FOUND, _) => StorageError::not_exist(path),
            other => StorageError::unavailable(op, path, other),
        }
    }

    fn check_status(op: &'static str, path: &str, status: u16) -> Result<()> {
        match status {
            200..=299 => Ok(()),
            NOT_FOUND => Err(StorageError::not_exist(path)),
            other => Err(StorageError::unavailable(
                op,
                path,
                format!("unexpected HTTP status {other}"),
            )),
        }
    }
}

fn parse_last_modified(path: &str, value: Option<&str>) -> Result<DateTime<Utc>> {
    let value =
        value.ok_or_else(|| StorageError::unavailable("stat", path, "missing Last-Modified"))?;
    DateTime::parse_from_rfc2822(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::unavailable("stat", path, e))
}

impl Storage for S3Storage {
    async fn save<R>(&self, key: &str, content: R) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        let path = self.location.object(key)?;
        let (content_type, mut body) = content_type::detect(&path, content)
            .await
            .map_err(|e| StorageError::unavailable("save", &path, e))?;

        let response = self
            .bucket
            .put_object_stream_with_content_type(&mut body, &path, &content_type)
            .await
            .map_err(|e| Self::classify("save", &path, e))?;
        Self::check_status("save", &path, response.status_code())?;

        debug!(key = %key, path = %path, content_type = %content_type, "Saved object");
        Ok(())
    }

    async fn stat(&self, key: &str) -> Result<Stat> {
        let path = self.location.object(key)?;
        let (head, status) = self
            .bucket
            .head_object(&path)
            .await
            .map_err(|e| Self::classify("stat", &path, e))?;
        Self::check_status("stat", &path, status)?;

        let size = head.content_length.unwrap_or_default().max(0) as u64;
        let modified = parse_last_modified(&path, head.last_modified.as_deref())?;
        Ok(Stat::new(modified, size))
    }

    async fn open(&self, key: &str) -> Result<ReadHandle> {
        let path = self.location.object(key)?;
        let response = self
            .bucket
            .get_object_stream(&path)
            .await
            .map_err(|e| Self::classify("open", &path, e))?;
        Self::check_status("open", &path, response.status_code)?;

        let stream = response.bytes.map_err(std::io::Error::other);
        debug!(key = %key, path = %path, "Opened object");
        Ok(ReadHandle::new(StreamReader::new(stream)))
    }

    /// S3 streams carry no metadata, so this is a HEAD followed by a GET.
    async fn open_with_stat(&self, key: &str) -> Result<(ReadHandle, Stat)> {
        let stat = self.stat(key).await?;
        let handle = self.open(key).await?;
        Ok((handle, stat))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.location.object(key)?;
        match self.bucket.delete_object(&path).await {
            Ok(_) => {
                debug!(key = %key, path = %path, "Deleted object");
                Ok(())
            }
            Err(e) => match Self::classify("delete", &path, e) {
                StorageError::NotExist { .. } => Ok(()),
                other => Err(other),
            },
        }
    }

    fn path(&self, key: &str) -> String {
        self.location.resolve(key)
    }
}

impl fmt::Debug for S3Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Storage")
            .field("bucket", &self.bucket.name())
            .field("prefix", &self.location.root())
            .finish()
    }
}
