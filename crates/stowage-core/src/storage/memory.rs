//! In-memory storage backend.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use super::{ReadHandle, Storage};
use crate::content_type;
use crate::error::{Result, StorageError};
use crate::path::Location;
use crate::stat::Stat;

#[derive(Debug, Clone)]
struct MemoryObject {
    data: Bytes,
    content_type: String,
    modified_time: DateTime<Utc>,
}

/// In-memory, `HashMap`-based storage.
///
/// Intended for tests and embedding. The map is the medium itself; it is
/// held behind a `RwLock` so the store can be shared across tasks.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    location: Location,
    objects: RwLock<HashMap<String, MemoryObject>>,
}

impl MemoryStorage {
    /// Create a new empty store with keys at the top level.
    #[must_use]
    pub fn new() -> Self {
        Self::with_prefix("")
    }

    /// Create a new empty store whose keys live below `prefix`.
    #[must_use]
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            location: Location::new(prefix),
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Content type recorded when `key` was saved.
    pub fn content_type(&self, key: &str) -> Option<String> {
        let path = self.location.object(key).ok()?;
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&path)
            .map(|obj| obj.content_type.clone())
    }

    fn get(&self, path: &str) -> Result<MemoryObject> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::not_exist(path))
    }
}

impl Storage for MemoryStorage {
    async fn save<R>(&self, key: &str, content: R) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        let path = self.location.object(key)?;
        let (content_type, mut reader) = content_type::detect(&path, content)
            .await
            .map_err(|e| StorageError::unavailable("save", &path, e))?;
        let mut data = Vec::new();
        reader
            .read_to_end(&mut data)
            .await
            .map_err(|e| StorageError::unavailable("save", &path, e))?;

        debug!(key = %key, bytes = data.len(), content_type = %content_type, "Saved object");
        let object = MemoryObject {
            data: Bytes::from(data),
            content_type,
            modified_time: Utc::now(),
        };
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path, object);
        Ok(())
    }

    async fn stat(&self, key: &str) -> Result<Stat> {
        let path = self.location.object(key)?;
        let object = self.get(&path)?;
        Ok(Stat::new(object.modified_time, object.data.len() as u64))
    }

    async fn open(&self, key: &str) -> Result<ReadHandle> {
        let path = self.location.object(key)?;
        Ok(ReadHandle::from_bytes(self.get(&path)?.data))
    }

    async fn open_with_stat(&self, key: &str) -> Result<(ReadHandle, Stat)> {
        let path = self.location.object(key)?;
        let object = self.get(&path)?;
        let stat = Stat::new(object.modified_time, object.data.len() as u64);
        Ok((ReadHandle::from_bytes(object.data), stat))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.location.object(key)?;
        let removed = self
            .objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&path);
        debug!(key = %key, existed = removed.is_some(), "Deleted object");
        Ok(())
    }

    fn path(&self, key: &str) -> String {
        self.location.resolve(key)
    }
}
