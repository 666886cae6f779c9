//! Public URL decorator.

use tokio::io::AsyncRead;

use super::{ReadHandle, Storage};
use crate::error::Result;
use crate::stat::Stat;

/// Wraps a backend and publishes its objects under a base URL.
///
/// The base URL is independent of where the backend stores data; URLs are
/// built as `{base_url}/{path(key)}`. An empty base URL disables URLs and
/// [`Storage::url`] returns an empty string.
#[derive(Debug)]
pub struct PublicStorage<S> {
    inner: S,
    base_url: String,
}

impl<S: Storage> PublicStorage<S> {
    /// Wrap `inner`, publishing it under `base_url`.
    pub fn new(inner: S, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { inner, base_url }
    }

    /// Wrap `inner` without a base URL.
    pub fn unpublished(inner: S) -> Self {
        Self::new(inner, "")
    }

    /// The configured base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Borrow the wrapped backend.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Unwrap the backend.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Storage> Storage for PublicStorage<S> {
    async fn save<R>(&self, key: &str, content: R) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.inner.save(key, content).await
    }

    async fn stat(&self, key: &str) -> Result<Stat> {
        self.inner.stat(key).await
    }

    async fn open(&self, key: &str) -> Result<ReadHandle> {
        self.inner.open(key).await
    }

    async fn open_with_stat(&self, key: &str) -> Result<(ReadHandle, Stat)> {
        self.inner.open_with_stat(key).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }

    fn path(&self, key: &str) -> String {
        self.inner.path(key)
    }

    fn url(&self, key: &str) -> String {
        if !self.has_base_url() {
            return String::new();
        }
        let path = self.inner.path(key);
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn has_base_url(&self) -> bool {
        !self.base_url.is_empty()
    }
}
