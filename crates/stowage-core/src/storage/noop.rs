//! No-op storage backend for disabled storage and tests.

use chrono::{DateTime, Utc};
use tokio::io::AsyncRead;

use super::{ReadHandle, Storage};
use crate::error::Result;
use crate::path::Location;
use crate::stat::Stat;

/// Storage that discards writes and reports every key as an empty object.
///
/// `stat` succeeds with a zero-sized [`Stat`] at the Unix epoch and `open`
/// yields an empty handle, so `exists` is always `true`. Saved content is
/// not read.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStorage;

impl NoopStorage {
    /// Create a new no-op storage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn empty_stat() -> Stat {
        Stat::new(DateTime::<Utc>::UNIX_EPOCH, 0)
    }
}

impl Storage for NoopStorage {
    async fn save<R>(&self, _key: &str, _content: R) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        Ok(())
    }

    async fn stat(&self, _key: &str) -> Result<Stat> {
        Ok(Self::empty_stat())
    }

    async fn open(&self, _key: &str) -> Result<ReadHandle> {
        Ok(ReadHandle::empty())
    }

    async fn open_with_stat(&self, _key: &str) -> Result<(ReadHandle, Stat)> {
        Ok((ReadHandle::empty(), Self::empty_stat()))
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    fn path(&self, key: &str) -> String {
        Location::default().resolve(key)
    }
}
