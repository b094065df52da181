//! Client-side key/value storage backends

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::errors::StorageError;

/// Script-readable key/value storage, the equivalent of `localStorage`
///
/// Writes are synchronous and infallible from the caller's point of view;
/// backends log their own I/O failures.
pub trait ClientStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Process-local storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every entry, for inspection
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        read_entries(&self.entries).clone()
    }
}

impl ClientStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        read_entries(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        write_entries(&self.entries).insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        write_entries(&self.entries).remove(key);
    }
}

/// Storage persisted as a JSON object, written through on every change
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open `path`, starting empty when the file does not exist yet
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or is not a
    /// JSON object of strings
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|source| StorageError::Io {
                path: path.display().to_string(),
                source,
            })?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content).map_err(|source| StorageError::Corrupt {
                    path: path.display().to_string(),
                    source,
                })?
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) {
        let result = serde_json::to_string_pretty(entries)
            .map_err(std::io::Error::other)
            .and_then(|json| std::fs::write(&self.path, json));
        if let Err(e) = result {
            log::error!("Failed to persist client storage to {}: {e}", self.path.display());
        }
    }
}

impl ClientStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        read_entries(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = write_entries(&self.entries);
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries);
    }

    fn remove(&self, key: &str) {
        let mut entries = write_entries(&self.entries);
        if entries.remove(key).is_some() {
            self.persist(&entries);
        }
    }
}

fn read_entries(
    lock: &RwLock<BTreeMap<String, String>>,
) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, String>> {
    lock.read().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn write_entries(
    lock: &RwLock<BTreeMap<String, String>>,
) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, String>> {
    lock.write().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_basic_operations() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("email"), None);

        storage.set("email", "a@b.com");
        assert_eq!(storage.get("email").as_deref(), Some("a@b.com"));

        storage.remove("email");
        assert!(storage.snapshot().is_empty());
    }

    #[test]
    fn test_file_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let storage = FileStorage::open(&path).unwrap();
        storage.set("userId", "42");
        storage.set("role", "ADMIN");
        storage.remove("role");
        drop(storage);

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.get("userId").as_deref(), Some("42"));
        assert_eq!(reopened.get("role"), None);
    }

    #[test]
    fn test_file_storage_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        assert!(matches!(
            FileStorage::open(&path),
            Err(StorageError::Corrupt { .. })
        ));
    }
}
