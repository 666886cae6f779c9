//! Runtime backend selection.

use tokio::io::AsyncRead;

use super::{LocalStorage, MemoryStorage, NoopStorage, ReadHandle, Storage};
use crate::error::Result;
use crate::stat::Stat;

#[cfg(feature = "gcs")]
use super::GcsStorage;
#[cfg(feature = "s3")]
use super::S3Storage;

/// Any compiled-in backend, chosen at runtime from configuration.
///
/// Lets callers hold one concrete type whatever backend the deployment
/// selects, without boxing the async trait.
#[derive(Debug)]
pub enum AnyStorage {
    /// Local filesystem.
    Local(LocalStorage),
    /// In-memory store.
    Memory(MemoryStorage),
    /// Discards everything.
    Noop(NoopStorage),
    /// S3-compatible object store.
    #[cfg(feature = "s3")]
    S3(S3Storage),
    /// Google Cloud Storage.
    #[cfg(feature = "gcs")]
    Gcs(GcsStorage),
}

macro_rules! dispatch {
    ($self:expr, $backend:ident => $call:expr) => {
        match $self {
            AnyStorage::Local($backend) => $call,
            AnyStorage::Memory($backend) => $call,
            AnyStorage::Noop($backend) => $call,
            #[cfg(feature = "s3")]
            AnyStorage::S3($backend) => $call,
            #[cfg(feature = "gcs")]
            AnyStorage::Gcs($backend) => $call,
        }
    };
}

impl AnyStorage {
    /// Backend name, matching the config `type`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Local(_) => "fs",
            Self::Memory(_) => "memory",
            Self::Noop(_) => "noop",
            #[cfg(feature = "s3")]
            Self::S3(_) => "s3",
            #[cfg(feature = "gcs")]
            Self::Gcs(_) => "gcs",
        }
    }
}

impl Storage for AnyStorage {
    async fn save<R>(&self, key: &str, content: R) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        dispatch!(self, s => s.save(key, content).await)
    }

    async fn stat(&self, key: &str) -> Result<Stat> {
        dispatch!(self, s => s.stat(key).await)
    }

    async fn open(&self, key: &str) -> Result<ReadHandle> {
        dispatch!(self, s => s.open(key).await)
    }

    async fn open_with_stat(&self, key: &str) -> Result<(ReadHandle, Stat)> {
        dispatch!(self, s => s.open_with_stat(key).await)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        dispatch!(self, s => s.delete(key).await)
    }

    fn path(&self, key: &str) -> String {
        dispatch!(self, s => s.path(key))
    }
}

impl From<LocalStorage> for AnyStorage {
    fn from(storage: LocalStorage) -> Self {
        Self::Local(storage)
    }
}

impl From<MemoryStorage> for AnyStorage {
    fn from(storage: MemoryStorage) -> Self {
        Self::Memory(storage)
    }
}

impl From<NoopStorage> for AnyStorage {
    fn from(storage: NoopStorage) -> Self {
        Self::Noop(storage)
    }
}
