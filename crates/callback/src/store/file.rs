use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use fs2::FileExt;
use tempfile::NamedTempFile;

use super::{PgtStore, StoreError, StoredPgt};

type Entries = BTreeMap<String, StoredPgt>;

/// PGT store kept in a JSON file.
///
/// Every operation holds an exclusive advisory lock on a sidecar `.lock` file
/// for its whole read-modify-write cycle, so several processes (or several
/// handles in one process) may share the same path. Writes go to a temporary
/// file in the same directory which then replaces the store file.
#[derive(Debug, Clone)]
pub struct FilePgtStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FilePgtStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let mut lock_name = OsString::from(path.as_os_str());
        lock_name.push(".lock");
        let lock_path = PathBuf::from(lock_name);
        let store = Self { path, lock_path };

        let dir = store.directory().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io { path: dir, source })?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn directory(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn io_error(&self, path: &Path) -> impl FnOnce(std::io::Error) -> StoreError {
        let path = path.to_path_buf();
        move |source| StoreError::Io { path, source }
    }

    /// Run `f` against the current entries under the lock; entries are
    /// written back only when `f` reports a change.
    fn with_entries<T>(&self, f: impl FnOnce(&mut Entries) -> (T, bool)) -> Result<T, StoreError> {
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .map_err(self.io_error(&self.lock_path))?;
        lock.lock_exclusive().map_err(self.io_error(&self.lock_path))?;

        let result = self.load().and_then(|mut entries| {
            let (value, changed) = f(&mut entries);
            if changed {
                self.save(&entries)?;
            }
            Ok(value)
        });

        if let Err(err) = FileExt::unlock(&lock) {
            tracing::warn!(path = %self.lock_path.display(), error = %err, "failed to release pgt store lock");
        }
        result
    }

    fn load(&self) -> Result<Entries, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(Entries::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Entries::new()),
            Err(err) => Err(self.io_error(&self.path)(err)),
        }
    }

    fn save(&self, entries: &Entries) -> Result<(), StoreError> {
        let encoded = serde_json::to_vec_pretty(entries).map_err(StoreError::Encode)?;

        let mut tmp = NamedTempFile::new_in(self.directory()).map_err(self.io_error(self.directory()))?;
        tmp.write_all(&encoded).map_err(self.io_error(tmp.path()))?;
        tmp.as_file().sync_all().map_err(self.io_error(tmp.path()))?;
        tmp.persist(&self.path)
            .map_err(|err| self.io_error(&self.path)(err.error))?;
        Ok(())
    }
}

impl PgtStore for FilePgtStore {
    fn put(&self, pgt_iou: &str, pgt: &str) -> Result<(), StoreError> {
        self.with_entries(|entries| {
            entries.insert(pgt_iou.to_string(), StoredPgt::new(pgt));
            ((), true)
        })
    }

    fn pop(&self, pgt_iou: &str) -> Result<Option<String>, StoreError> {
        self.with_entries(|entries| {
            let pgt = entries.remove(pgt_iou).map(|e| e.pgt);
            let changed = pgt.is_some();
            (pgt, changed)
        })
    }

    fn purge_older_than(&self, age: Duration) -> Result<usize, StoreError> {
        // An age reaching past the earliest representable time purges nothing.
        let Some(cutoff) = Utc::now().checked_sub_signed(age) else {
            return Ok(0);
        };
        self.with_entries(|entries| {
            let before = entries.len();
            entries.retain(|_, e| e.received_at >= cutoff);
            let purged = before - entries.len();
            (purged, purged > 0)
        })
    }
}
