//! Error types for stowage.

use std::fmt;

use thiserror::Error;

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Boxed underlying cause kept for logging.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Coarse classification every storage error falls into.
///
/// Callers branch on the kind, never on the backend that produced the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No object at the requested key.
    NotExist,
    /// The medium is unreachable, refused the request, or failed mid-transfer.
    Unavailable,
    /// Malformed key or configuration.
    Invalid,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotExist => "not exist",
            Self::Unavailable => "unavailable",
            Self::Invalid => "invalid",
        };
        f.write_str(s)
    }
}

/// Errors that can occur in storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Object not found
    #[error("Object does not exist: {key}")]
    NotExist {
        /// Resolved storage path of the missing object.
        key: String,
    },

    /// Medium failure, passed through with context
    #[error("Storage unavailable during {op} of {key}: {source}")]
    Unavailable {
        /// Operation name (`save`, `stat`, ...).
        op: &'static str,
        /// Resolved storage path the operation targeted.
        key: String,
        /// Medium-specific cause.
        #[source]
        source: BoxError,
    },

    /// Malformed object key
    #[error("Invalid key {key:?}: {reason}")]
    InvalidKey {
        /// Key as supplied by the caller.
        key: String,
        /// Why the key was rejected.
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotExist { .. } => ErrorKind::NotExist,
            Self::Unavailable { .. } => ErrorKind::Unavailable,
            Self::InvalidKey { .. } | Self::Config(_) => ErrorKind::Invalid,
        }
    }

    /// `true` when no object exists at the requested key.
    #[must_use]
    pub fn is_not_exist(&self) -> bool {
        self.kind() == ErrorKind::NotExist
    }

    pub(crate) fn not_exist(key: impl Into<String>) -> Self {
        Self::NotExist { key: key.into() }
    }

    pub(crate) fn unavailable(
        op: &'static str,
        key: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        let err = Self::Unavailable {
            op,
            key: key.into(),
            source: source.into(),
        };
        tracing::warn!(error = %err, "storage operation failed");
        err
    }

    pub(crate) fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Map an I/O error, turning `NotFound` into [`StorageError::NotExist`].
    pub(crate) fn from_io(op: &'static str, key: impl Into<String>, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::not_exist(key)
        } else {
            Self::unavailable(op, key, err)
        }
    }
}
