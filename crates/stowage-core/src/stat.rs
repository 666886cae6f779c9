//! Object metadata.

use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata snapshot for a stored object.
///
/// Produced fresh by every `stat` / `open_with_stat` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    /// Last modification time reported by the medium.
    pub modified_time: DateTime<Utc>,
    /// Object size in bytes.
    pub size: u64,
}

impl Stat {
    /// Create a new stat record.
    #[must_use]
    pub fn new(modified_time: impl Into<DateTime<Utc>>, size: u64) -> Self {
        Self {
            modified_time: modified_time.into(),
            size,
        }
    }

    /// Build from a filesystem modification time.
    #[must_use]
    pub fn from_system_time(modified: SystemTime, size: u64) -> Self {
        Self::new(DateTime::<Utc>::from(modified), size)
    }
}
