//! Storage backend abstraction.
//!
//! Provides a unified interface for saving and reading named blobs:
//! - Local filesystem (always available)
//! - In-memory and no-op stores (always available)
//! - S3-compatible storage (with `s3` feature)
//! - Google Cloud Storage (with `gcs` feature)
//!
//! Every backend resolves keys through [`crate::path::Location`] and maps
//! medium errors onto [`crate::error::ErrorKind`] before returning.

mod any;
mod handle;
mod local;
mod memory;
mod noop;
mod public;

#[cfg(feature = "s3")]
mod s3;

#[cfg(feature = "gcs")]
mod gcs;

pub use any::AnyStorage;
pub use handle::ReadHandle;
pub use local::LocalStorage;
pub use memory::MemoryStorage;
pub use noop::NoopStorage;
pub use public::PublicStorage;

#[cfg(feature = "s3")]
pub use s3::S3Storage;

#[cfg(feature = "gcs")]
pub use gcs::GcsStorage;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::io::AsyncRead;

use crate::error::Result;
use crate::stat::Stat;

/// Trait for storage backends.
///
/// All data methods are async. Dropping a returned future cancels the
/// operation; wrap calls in `tokio::time::timeout` to bound them. Local
/// filesystem syscalls already in flight run to completion.
///
/// Deleting a key that holds no object succeeds on every backend.
#[allow(async_fn_in_trait)]
pub trait Storage: Send + Sync {
    /// Write the whole of `content` to `key`, replacing any existing object.
    ///
    /// Intermediate directories or prefixes are created as needed. The
    /// stream is consumed to the end before success is reported.
    async fn save<R>(&self, key: &str, content: R) -> Result<()>
    where
        R: AsyncRead + Unpin + Send;

    /// Write an in-memory buffer to `key`.
    async fn save_bytes(&self, key: &str, data: Bytes) -> Result<()> {
        self.save(key, &data[..]).await
    }

    /// Size and modification time of the object at `key`.
    async fn stat(&self, key: &str) -> Result<Stat>;

    /// Open the object at `key` for reading from offset 0.
    async fn open(&self, key: &str) -> Result<ReadHandle>;

    /// Open the object at `key` together with its metadata.
    async fn open_with_stat(&self, key: &str) -> Result<(ReadHandle, Stat)>;

    /// Remove the object at `key`.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Whether `stat(key)` currently succeeds.
    async fn exists(&self, key: &str) -> bool {
        self.stat(key).await.is_ok()
    }

    /// Last modification time of the object at `key`.
    async fn modified_time(&self, key: &str) -> Result<DateTime<Utc>> {
        Ok(self.stat(key).await?.modified_time)
    }

    /// Size in bytes of the object at `key`.
    async fn size(&self, key: &str) -> Result<u64> {
        Ok(self.stat(key).await?.size)
    }

    /// Storage path `key` resolves to. Pure; performs no I/O.
    fn path(&self, key: &str) -> String;

    /// Public URL for `key`, or an empty string when none is configured.
    fn url(&self, _key: &str) -> String {
        String::new()
    }

    /// Whether [`Storage::url`] produces non-empty URLs.
    fn has_base_url(&self) -> bool {
        false
    }
}
