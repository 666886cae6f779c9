//! Google Cloud Storage backend.
//!
//! Works with GCS and the fake-gcs-server emulator for local testing.
//!
//! # Example
//!
//! ```rust,no_run
//! use stowage_core::config::GcsConfig;
//! use stowage_core::storage::GcsStorage;
//!
//! # async fn example() -> stowage_core::Result<()> {
//! // Connect to GCS (uses GOOGLE_APPLICATION_CREDENTIALS)
//! let storage = GcsStorage::with_config(&GcsConfig::new("my-bucket").with_prefix("media/")).await?;
//!
//! // Or connect to emulator (local testing)
//! // Set STORAGE_EMULATOR_HOST=http://localhost:4443
//! let storage = GcsStorage::from_emulator("my-bucket", "test/").await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;

use cloud_storage::{Client, Error as GcsError};
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use super::{ReadHandle, Storage};
use crate::config::GcsConfig;
use crate::content_type;
use crate::error::{Result, StorageError};
use crate::path::Location;
use crate::stat::Stat;

const NOT_FOUND: u16 = 404;

/// Variables naming a service account key file, in lookup order.
const CREDENTIAL_FILE_VARS: &[&str] = &["SERVICE_ACCOUNT", "GOOGLE_APPLICATION_CREDENTIALS"];

/// Variables holding a service account key inline, in lookup order.
const CREDENTIAL_JSON_VARS: &[&str] = &["SERVICE_ACCOUNT_JSON", "GOOGLE_APPLICATION_CREDENTIALS_JSON"];

/// Fields the client requires from a service account key.
#[derive(Deserialize)]
#[allow(dead_code)]
struct ServiceAccountKey {
    #[serde(rename = "type")]
    account_type: String,
    project_id: String,
    private_key_id: String,
    private_key: String,
    client_email: String,
    client_id: String,
    auth_uri: String,
    token_uri: String,
    auth_provider_x509_cert_url: String,
    client_x509_cert_url: String,
}

/// Check that a usable service account key is configured.
///
/// The client loads its key on first request and panics when it is missing
/// or malformed, so the key is read and parsed up front here.
fn check_credentials(var: impl Fn(&str) -> Option<String>) -> Result<()> {
    let from_file = CREDENTIAL_FILE_VARS
        .iter()
        .find_map(|name| var(name).map(|path| (*name, path)));
    let (source, json) = match from_file {
        Some((name, path)) => {
            let json = std::fs::read_to_string(&path).map_err(|e| {
                StorageError::Config(format!("Cannot read {name} key file {path}: {e}"))
            })?;
            (name, json)
        }
        None => CREDENTIAL_JSON_VARS
            .iter()
            .find_map(|name| var(name).map(|json| (*name, json)))
            .ok_or_else(|| {
                StorageError::Config(
                    "GCS credentials missing: set SERVICE_ACCOUNT(_JSON) or \
                     GOOGLE_APPLICATION_CREDENTIALS(_JSON)"
                        .into(),
                )
            })?,
    };
    serde_json::from_str::<ServiceAccountKey>(&json)
        .map_err(|e| StorageError::Config(format!("Invalid service account key in {source}: {e}")))?;
    Ok(())
}

/// Google Cloud Storage backend.
///
/// The client library has no borrowed streaming upload or download, so
/// `save` buffers the content and `open` buffers the object before handing
/// out a reader.
pub struct GcsStorage {
    client: Client,
    bucket: String,
    location: Location,
}

impl GcsStorage {
    /// Create a new GCS storage backend.
    ///
    /// Uses GOOGLE_APPLICATION_CREDENTIALS for authentication. Fails with a
    /// configuration error when no readable service account key is set.
    pub async fn with_config(config: &GcsConfig) -> Result<Self> {
        config.validate()?;
        check_credentials(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))?;
        Ok(Self {
            client: Client::default(),
            bucket: config.bucket.clone(),
            location: Location::new(&config.prefix),
        })
    }

    /// Create from emulator environment.
    ///
    /// Reads STORAGE_EMULATOR_HOST environment variable.
    pub async fn from_emulator(bucket: &str, prefix: &str) -> Result<Self> {
        // cloud-storage picks up STORAGE_EMULATOR_HOST on its own
        Self::with_config(&GcsConfig::new(bucket).with_prefix(prefix)).await
    }

    /// Bucket name.
    #[must_use]
    pub fn bucket_name(&self) -> &str {
        &self.bucket
    }

    fn classify(op: &'static str, path: &str, err: GcsError) -> StorageError {
        if is_not_found(&err) {
            StorageError::not_exist(path)
        } else {
            StorageError::unavailable(op, path, err)
        }
    }
}

fn is_not_found(err: &GcsError) -> bool {
    match err {
        GcsError::Google(response) => response.error.code == NOT_FOUND,
        GcsError::Reqwest(e) => e.status().map(|s| s.as_u16()) == Some(NOT_FOUND),
        _ => false,
    }
}

impl Storage for GcsStorage {
    async fn save<R>(&self, key: &str, content: R) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        let path = self.location.object(key)?;
        let mut data = Vec::new();
        let mut content = content;
        content
            .read_to_end(&mut data)
            .await
            .map_err(|e| StorageError::unavailable("save", &path, e))?;

        let mime = content_type::from_extension(&path)
            .unwrap_or_else(|| content_type::sniff(&data).to_string());
        let size = data.len();
        self.client
            .object()
            .create(&self.bucket, data, &path, &mime)
            .await
            .map_err(|e| Self::classify("save", &path, e))?;

        debug!(key = %key, path = %path, bytes = size, content_type = %mime, "Saved object");
        Ok(())
    }

    async fn stat(&self, key: &str) -> Result<Stat> {
        let path = self.location.object(key)?;
        let object = self
            .client
            .object()
            .read(&self.bucket, &path)
            .await
            .map_err(|e| Self::classify("stat", &path, e))?;
        Ok(Stat::new(object.updated, object.size))
    }

    async fn open(&self, key: &str) -> Result<ReadHandle> {
        let path = self.location.object(key)?;
        let data = self
            .client
            .object()
            .download(&self.bucket, &path)
            .await
            .map_err(|e| Self::classify("open", &path, e))?;
        debug!(key = %key, path = %path, bytes = data.len(), "Opened object");
        Ok(ReadHandle::from_bytes(data.into()))
    }

    /// Metadata and media are separate GCS requests.
    async fn open_with_stat(&self, key: &str) -> Result<(ReadHandle, Stat)> {
        let stat = self.stat(key).await?;
        let handle = self.open(key).await?;
        Ok((handle, stat))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.location.object(key)?;
        match self.client.object().delete(&self.bucket, &path).await {
            Ok(()) => {
                debug!(key = %key, path = %path, "Deleted object");
                Ok(())
            }
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(StorageError::unavailable("delete", &path, e)),
        }
    }

    fn path(&self, key: &str) -> String {
        self.location.resolve(key)
    }
}

impl fmt::Debug for GcsStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcsStorage")
            .field("bucket", &self.bucket)
            .field("prefix", &self.location.root())
            .finish()
    }
}
