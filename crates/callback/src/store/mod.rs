//! Durable `pgtIou → pgt` storage with at-most-once retrieval.
//!
//! Entry lifecycle: absent → stored (`put`) → consumed (`pop`, terminal).

pub mod file;
pub mod in_memory;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use file::FilePgtStore;
pub use in_memory::InMemoryPgtStore;

/// A PGT waiting to be retrieved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPgt {
    pub pgt: String,
    pub received_at: DateTime<Utc>,
}

impl StoredPgt {
    pub fn new(pgt: impl Into<String>) -> Self {
        Self {
            pgt: pgt.into(),
            received_at: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("pgt store I/O failed at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("pgt store at {} is unreadable: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode pgt store: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("pgt store unavailable: {0}")]
    Unavailable(String),
}

/// Shared PGT store.
///
/// Implementations must make `pop` atomic: for concurrent pops of one key,
/// exactly one caller receives the PGT.
pub trait PgtStore: Send + Sync {
    /// Store `pgt` under `pgt_iou`, replacing any previous entry.
    fn put(&self, pgt_iou: &str, pgt: &str) -> Result<(), StoreError>;

    /// Remove and return the PGT stored under `pgt_iou`.
    fn pop(&self, pgt_iou: &str) -> Result<Option<String>, StoreError>;

    /// Drop entries received more than `age` ago; returns how many were dropped.
    fn purge_older_than(&self, age: Duration) -> Result<usize, StoreError>;
}

impl<S> PgtStore for Arc<S>
where
    S: PgtStore + ?Sized,
{
    fn put(&self, pgt_iou: &str, pgt: &str) -> Result<(), StoreError> {
        (**self).put(pgt_iou, pgt)
    }

    fn pop(&self, pgt_iou: &str) -> Result<Option<String>, StoreError> {
        (**self).pop(pgt_iou)
    }

    fn purge_older_than(&self, age: Duration) -> Result<usize, StoreError> {
        (**self).purge_older_than(age)
    }
}
