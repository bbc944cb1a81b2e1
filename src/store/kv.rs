//! Synchronous string key-value storage, the only persistence the tracker needs.

use std::{
    cell::RefCell,
    collections::HashMap,
    fs::File,
    io::{ErrorKind, Read, Write},
    ops::Deref,
    path::PathBuf,
};

use fs4::fs_std::FileExt;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage quota exceeded: {requested} bytes requested, {limit} allowed")]
    QuotaExceeded { requested: usize, limit: usize },
    #[error("invalid storage key {0:?}")]
    InvalidKey(String),
    #[error("failed to encode value: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("storage io failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Callback notified when a value couldn't be written.
pub type PersistHook = Box<dyn FnMut(&StorageError)>;

/// Interface for abstracting the storage medium. Calls complete before returning.
#[cfg_attr(test, mockall::automock)]
pub trait KeyValueStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

impl<T: Deref> KeyValueStorage for T
where
    T::Target: KeyValueStorage,
{
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.deref().get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.deref().set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.deref().remove(key)
    }
}

/// In-process storage. A quota limits the total number of bytes held by keys and values.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: RefCell<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            values: RefCell::default(),
            quota: Some(quota),
        }
    }

    fn used_without(&self, key: &str) -> usize {
        self.values
            .borrow()
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(limit) = self.quota {
            let requested = self.used_without(key) + key.len() + value.len();
            if requested > limit {
                return Err(StorageError::QuotaExceeded { requested, limit });
            }
        }
        self.values
            .borrow_mut()
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.values.borrow_mut().remove(key);
        Ok(())
    }
}

/// Stores every key in its own file inside a directory. Reads take a shared lock and writes an
/// exclusive one, so two running instances never observe a half-written value.
#[derive(Debug)]
pub struct FileStorage {
    dir: PathBuf,
    max_value_bytes: Option<usize>,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&dir)?;

        Ok(Self {
            dir,
            max_value_bytes: None,
        })
    }

    pub fn with_max_value_bytes(self, limit: usize) -> Self {
        Self {
            max_value_bytes: Some(limit),
            ..self
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_owned()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        debug!("Reading {path:?}");
        FileExt::lock_shared(&file)?;
        let mut value = String::new();
        let result = file.read_to_string(&mut value);
        FileExt::unlock(&file)?;
        result?;
        Ok(Some(value))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        if let Some(limit) = self.max_value_bytes {
            if value.len() > limit {
                return Err(StorageError::QuotaExceeded {
                    requested: value.len(),
                    limit,
                });
            }
        }
        debug!("Writing {} bytes into {path:?}", value.len());
        let mut file = File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        // Truncation happens under the lock, opening with truncate would race readers.
        FileExt::lock_exclusive(&file)?;
        let result = file
            .set_len(0)
            .and_then(|_| file.write_all(value.as_bytes()))
            .and_then(|_| file.flush());
        FileExt::unlock(&file)?;
        result?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use anyhow::Result;
    use tempfile::tempdir;

    use super::{FileStorage, KeyValueStorage, MemoryStorage, StorageError};

    #[test]
    fn memory_storage_basic() -> Result<()> {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("missing")?, None);
        storage.set("key", "value")?;
        assert_eq!(storage.get("key")?.as_deref(), Some("value"));
        storage.remove("key")?;
        storage.remove("key")?;
        assert_eq!(storage.get("key")?, None);
        Ok(())
    }

    #[test]
    fn memory_storage_quota_keeps_previous_value() -> Result<()> {
        let storage = MemoryStorage::with_quota(10);
        storage.set("k", "12345")?;
        let result = storage.set("k", "123456789012");
        assert!(matches!(
            result,
            Err(StorageError::QuotaExceeded { limit: 10, .. })
        ));
        assert_eq!(storage.get("k")?.as_deref(), Some("12345"));
        Ok(())
    }

    #[test]
    fn memory_storage_quota_counts_other_keys() -> Result<()> {
        let storage = MemoryStorage::with_quota(12);
        storage.set("a", "12345")?;
        // Overwriting the same key only counts the new value.
        storage.set("a", "1234567")?;
        assert!(storage.set("b", "12345").is_err());
        Ok(())
    }

    #[test]
    fn shared_handles_see_same_values() -> Result<()> {
        let storage = Rc::new(MemoryStorage::new());
        let other = storage.clone();
        storage.set("key", "value")?;
        assert_eq!(other.get("key")?.as_deref(), Some("value"));
        Ok(())
    }

    #[test]
    fn file_storage_basic() -> Result<()> {
        let dir = tempdir()?;
        let storage = FileStorage::new(dir.path().join("storage"))?;
        assert_eq!(storage.get("entries")?, None);

        storage.set("entries", "a much longer first value")?;
        storage.set("entries", "short")?;
        assert_eq!(storage.get("entries")?.as_deref(), Some("short"));

        let reopened = FileStorage::new(dir.path().join("storage"))?;
        assert_eq!(reopened.get("entries")?.as_deref(), Some("short"));

        storage.remove("entries")?;
        storage.remove("entries")?;
        assert_eq!(storage.get("entries")?, None);
        Ok(())
    }

    #[test]
    fn file_storage_rejects_path_like_keys() -> Result<()> {
        let dir = tempdir()?;
        let storage = FileStorage::new(dir.path().to_owned())?;
        assert!(matches!(
            storage.set("../escape", "x"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(storage.get(""), Err(StorageError::InvalidKey(_))));
        Ok(())
    }

    #[test]
    fn file_storage_value_limit() -> Result<()> {
        let dir = tempdir()?;
        let storage = FileStorage::new(dir.path().to_owned())?.with_max_value_bytes(4);
        storage.set("k", "1234")?;
        assert!(matches!(
            storage.set("k", "12345"),
            Err(StorageError::QuotaExceeded { requested: 5, limit: 4 })
        ));
        assert_eq!(storage.get("k")?.as_deref(), Some("1234"));
        Ok(())
    }
}
