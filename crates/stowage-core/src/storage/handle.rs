//! Read handles returned by `open`.

use std::fmt;
use std::io::Cursor;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

/// Forward-only byte stream over one stored object.
///
/// Owned by the caller. Dropping the handle closes the underlying file
/// descriptor or connection, on error paths as well.
pub struct ReadHandle {
    inner: Pin<Box<dyn AsyncRead + Send>>,
}

impl ReadHandle {
    /// Wrap any async reader.
    pub fn new(reader: impl AsyncRead + Send + 'static) -> Self {
        Self {
            inner: Box::pin(reader),
        }
    }

    /// Handle over an in-memory buffer.
    #[must_use]
    pub fn from_bytes(data: Bytes) -> Self {
        Self::new(Cursor::new(data))
    }

    /// Handle that is immediately at end of stream.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(tokio::io::empty())
    }

    /// Read the remaining content and close the handle.
    pub async fn read_to_bytes(mut self) -> std::io::Result<Bytes> {
        let mut buf = Vec::new();
        self.read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }
}

impl AsyncRead for ReadHandle {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        self.get_mut().inner.as_mut().poll_read(cx, buf)
    }
}

impl fmt::Debug for ReadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadHandle").finish_non_exhaustive()
    }
}
