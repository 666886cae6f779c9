//! # stowage-core
//!
//! Uniform blob storage for application media.
//!
//! Provides one contract for saving, reading, inspecting and deleting named
//! blobs, over:
//! - Local filesystem (always available)
//! - In-memory and no-op stores (always available)
//! - S3-compatible object storage (`s3` feature)
//! - Google Cloud Storage (`gcs` feature)
//!
//! Failures are classified into [`ErrorKind::NotExist`],
//! [`ErrorKind::Unavailable`] and [`ErrorKind::Invalid`] regardless of the
//! backend. Public URLs come from wrapping a backend in [`PublicStorage`].
//!
//! ```rust,no_run
//! use stowage_core::{Storage, StorageConfig};
//!
//! # async fn example() -> stowage_core::Result<()> {
//! let storage = StorageConfig::from_env()?.connect().await?;
//! storage.save_bytes("avatars/1.png", "...".into()).await?;
//! println!("{}", storage.url("avatars/1.png"));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod content_type;
pub mod error;
pub mod path;
pub mod stat;
pub mod storage;

pub use config::{BackendConfig, StorageConfig};
pub use error::{ErrorKind, Result, StorageError};
pub use path::Location;
pub use stat::Stat;
#[cfg(feature = "gcs")]
pub use storage::GcsStorage;
#[cfg(feature = "s3")]
pub use storage::S3Storage;
pub use storage::{
    AnyStorage, LocalStorage, MemoryStorage, NoopStorage, PublicStorage, ReadHandle, Storage,
};
