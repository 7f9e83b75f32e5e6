//! Key/value storage media.

use crate::Error;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// A string key/value medium, like a browser's `localStorage`.
///
/// Operations are infallible from the caller's point of view; a medium
/// that can fail to persist logs the failure instead.
pub trait Storage: Send + Sync {
    /// Read the value stored under `key`.
    fn get_item(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str);

    /// Remove `key`. Removing a missing key is a no-op.
    fn remove_item(&self, key: &str);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process storage that lives as long as the value does.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        lock(&self.items).len()
    }

    /// Check if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        lock(&self.items).get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        lock(&self.items).insert(key.into(), value.into());
    }

    fn remove_item(&self, key: &str) {
        lock(&self.items).remove(key);
    }
}

/// Durable storage backed by a JSON object file.
///
/// The whole file is rewritten on every mutation, through a temporary file
/// in the same directory that is renamed over the target.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    items: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open the storage file at `path`, loading existing content.
    ///
    /// The file itself is created on first write, but its parent directory
    /// must already exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();

        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => {
                return Err(Error::Environment(format!(
                    "storage directory {} does not exist",
                    parent.display()
                )));
            }
            _ => {}
        }

        let items = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), items = items.len(), "opened file storage");

        Ok(Self {
            path,
            items: Mutex::new(items),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, items: &BTreeMap<String, String>) {
        let result = serde_json::to_vec_pretty(items)
            .map_err(Error::from)
            .and_then(|bytes| write_atomic(&self.path, &bytes));

        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "failed to persist storage");
        }
    }
}

/// Replace the file at `path` with `bytes`. Readers see either the old
/// content or the new content, never a partial write.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Error> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        lock(&self.items).get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        let mut items = lock(&self.items);
        items.insert(key.into(), value.into());
        self.persist(&items);
    }

    fn remove_item(&self, key: &str) {
        let mut items = lock(&self.items);
        if items.remove(key).is_some() {
            self.persist(&items);
        }
    }
}
