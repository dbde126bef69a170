use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{Duration, Utc};

use super::{PgtStore, StoreError, StoredPgt};

/// In-memory PGT store.
///
/// Intended for tests/dev: entries do not survive a restart.
#[derive(Debug, Default)]
pub struct InMemoryPgtStore {
    entries: Mutex<HashMap<String, StoredPgt>>,
}

impl InMemoryPgtStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, StoredPgt>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }
}

impl PgtStore for InMemoryPgtStore {
    fn put(&self, pgt_iou: &str, pgt: &str) -> Result<(), StoreError> {
        self.entries()?.insert(pgt_iou.to_string(), StoredPgt::new(pgt));
        Ok(())
    }

    fn pop(&self, pgt_iou: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries()?.remove(pgt_iou).map(|e| e.pgt))
    }

    fn purge_older_than(&self, age: Duration) -> Result<usize, StoreError> {
        let Some(cutoff) = Utc::now().checked_sub_signed(age) else {
            return Ok(0);
        };
        let mut entries = self.entries()?;
        let before = entries.len();
        entries.retain(|_, e| e.received_at >= cutoff);
        Ok(before - entries.len())
    }
}
