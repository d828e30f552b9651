//! Durable key-value storage for persisted board state.
//!
//! # Directory Structure
//!
//! ```text
//! <data-dir>/
//!   taskboard.toml                 # Configuration (see config.rs)
//!   taskboard.lock                 # Held across a whole load/mutate/save
//!   task-storage.json              # Task store envelope
//!   task-storage.json.lock         # Advisory lock for the above
//!   custom-fields-storage.json     # Field registry envelope
//!   taskboard-prefs.json           # View preferences envelope
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::lock::{self, FileLock, DEFAULT_LOCK_TIMEOUT_MS};

const STORE_LOCK: &str = "taskboard.lock";

/// String-valued storage addressed by key
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// One `<key>.json` file per key inside a data directory
#[derive(Debug, Clone)]
pub struct FileKv {
    dir: PathBuf,
    lock_timeout_ms: u64,
}

impl FileKv {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    pub fn with_lock_timeout(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Exclusive lock over the whole directory, released when dropped.
    ///
    /// Per-key locks only cover a single read or write; a caller that loads,
    /// mutates and saves holds this one for the whole span.
    pub fn lock(&self) -> Result<FileLock> {
        FileLock::acquire(self.dir.join(STORE_LOCK), self.lock_timeout_ms)
    }

    /// Path of the file backing `key`
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KvStore for FileKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        lock::read_locked_str(&self.path_for(key)?, self.lock_timeout_ms)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock::write_atomic_locked(&self.path_for(key)?, value.as_bytes(), self.lock_timeout_ms)
    }

    fn remove(&self, key: &str) -> Result<()> {
        lock::remove_locked(&self.path_for(key)?, self.lock_timeout_ms)
    }
}

/// In-process storage; clones share the same map
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<T>(&self, f: impl FnOnce(&mut HashMap<String, String>) -> T) -> T {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut entries)
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.with_entries(|entries| entries.get(key).cloned()))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.with_entries(|entries| entries.insert(key.to_string(), value.to_string()));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.with_entries(|entries| entries.remove(key));
        Ok(())
    }
}

/// Keys become file names, so only `[A-Za-z0-9_-]` is accepted.
fn validate_key(key: &str) -> Result<()> {
    let ok = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!("invalid storage key: {key:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn directory_lock_is_exclusive_until_dropped() {
        let dir = TempDir::new().unwrap();
        let kv = FileKv::new(dir.path());
        let other = FileKv::new(dir.path()).with_lock_timeout(50);

        let guard = kv.lock().unwrap();
        assert!(matches!(other.lock(), Err(Error::LockFailed(_))));
        // single-key access is not blocked by the directory lock
        other.set("task-storage", "{}").unwrap();

        drop(guard);
        assert!(other.lock().is_ok());
    }

    #[test]
    fn file_kv_round_trips_and_removes() {
        let dir = TempDir::new().unwrap();
        let kv = FileKv::new(dir.path());

        assert!(kv.get("task-storage").unwrap().is_none());
        kv.set("task-storage", "{\"version\":1}").unwrap();
        assert_eq!(
            kv.get("task-storage").unwrap().as_deref(),
            Some("{\"version\":1}")
        );
        assert!(dir.path().join("task-storage.json").exists());

        kv.remove("task-storage").unwrap();
        assert!(kv.get("task-storage").unwrap().is_none());
    }

    #[test]
    fn file_kv_rejects_path_like_keys() {
        let dir = TempDir::new().unwrap();
        let kv = FileKv::new(dir.path());
        for key in ["", "../escape", "a/b", "with space"] {
            assert!(matches!(kv.set(key, "x"), Err(Error::InvalidArgument(_))), "{key}");
        }
    }

    #[test]
    fn memory_kv_clones_share_entries() {
        let kv = MemoryKv::new();
        let other = kv.clone();
        kv.set("k", "v").unwrap();
        assert_eq!(other.get("k").unwrap().as_deref(), Some("v"));
        other.remove("k").unwrap();
        assert!(kv.get("k").unwrap().is_none());
    }
}
