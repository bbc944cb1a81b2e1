//! Storage is organized through [EntryStore].
//! The basic idea is:
//!  - The store owns the list of entries and is the only thing that mutates it.
//!  - Every mutation writes the whole list back into a [kv::KeyValueStorage].
//!  - Only `{id, timestamp}` is written, everything else is derived when needed.
//!  - Storage failures never reach the caller. The in-memory list stays authoritative.

pub mod entities;
pub mod kv;
pub mod migration;

use chrono::{DateTime, Utc};
use entities::{Entry, EntryId};
use kv::{KeyValueStorage, PersistHook, StorageError};
use migration::{decode_entries, encode_entries, migrate_legacy, ENTRIES_KEY};
use tracing::{debug, info, warn};

pub struct EntryStore<S> {
    storage: S,
    entries: Vec<Entry>,
    persist_failure: Option<PersistHook>,
}

impl<S: KeyValueStorage> EntryStore<S> {
    /// Creates a store with no entries. Nothing is read until [EntryStore::load].
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            entries: vec![],
            persist_failure: None,
        }
    }

    /// Creates a store and immediately restores persisted entries.
    pub fn open(storage: S) -> Self {
        let mut store = Self::new(storage);
        store.load();
        store
    }

    /// Replaces the in-memory list with whatever is persisted. Missing or unreadable data results
    /// in an empty list.
    pub fn load(&mut self) {
        self.entries = match self.storage.get(ENTRIES_KEY) {
            Ok(Some(raw)) => decode_entries(&raw),
            Ok(None) => migrate_legacy(&self.storage).unwrap_or_default(),
            Err(e) => {
                warn!("Failed to read entries, starting empty: {e}");
                vec![]
            }
        };
        info!("Loaded {} entries", self.entries.len());
    }

    /// Registers a callback notified whenever a write to storage fails.
    pub fn on_persist_failure(&mut self, hook: impl FnMut(&StorageError) + 'static) {
        self.persist_failure = Some(Box::new(hook));
    }

    /// Entries in insertion order, newest insertion first. Use [crate::aggregate] for a
    /// chronological view.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &EntryId) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.id == *id)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn add(&mut self, timestamp: DateTime<Utc>) -> EntryId {
        let mut entry = Entry::new(timestamp);
        while self.get(&entry.id).is_some() {
            entry.id = EntryId::generate();
        }
        let id = entry.id.clone();
        debug!("Adding entry {id} at {timestamp}");
        self.entries.insert(0, entry);
        self.persist();
        id
    }

    /// Removes the entry with `id`. Returns whether it existed, an unknown id is not an error.
    pub fn remove(&mut self, id: &EntryId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != *id);
        let removed = self.entries.len() != before;
        debug!("Removing entry {id}, existed: {removed}");
        self.persist();
        removed
    }

    /// Drops every entry. Asking the user is up to the caller.
    pub fn clear(&mut self) {
        debug!("Clearing {} entries", self.entries.len());
        self.entries.clear();
        self.persist();
    }

    fn persist(&mut self) {
        let result =
            encode_entries(&self.entries).and_then(|raw| self.storage.set(ENTRIES_KEY, &raw));
        if let Err(e) = result {
            warn!("Failed to persist {} entries: {e}", self.entries.len());
            if let Some(hook) = self.persist_failure.as_mut() {
                hook(&e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use anyhow::Result;
    use chrono::{Duration, TimeZone, Utc};

    use crate::utils::logging::TEST_LOGGING;

    use super::{
        entities::EntryId,
        kv::{KeyValueStorage, MemoryStorage, MockKeyValueStorage, StorageError},
        migration::{ENTRIES_KEY, LEGACY_ENTRY_KEYS},
        EntryStore,
    };

    #[test]
    fn load_without_data_is_empty() {
        *TEST_LOGGING;
        let store = EntryStore::open(MemoryStorage::new());
        assert!(store.is_empty());
    }

    #[test]
    fn load_corrupt_data_is_empty() -> Result<()> {
        let storage = MemoryStorage::new();
        storage.set(ENTRIES_KEY, "{broken")?;
        let store = EntryStore::open(storage);
        assert!(store.is_empty());
        Ok(())
    }

    #[test]
    fn reload_keeps_exact_timestamp() {
        let storage = Rc::new(MemoryStorage::new());
        let t1 = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap()
            + Duration::nanoseconds(987_654_321);

        let mut store = EntryStore::open(storage.clone());
        let id = store.add(t1);

        let reloaded = EntryStore::open(storage);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.entries()[0].id, id);
        assert_eq!(reloaded.entries()[0].timestamp, t1);
    }

    #[test]
    fn add_prepends() {
        let mut store = EntryStore::open(MemoryStorage::new());
        let now = Utc::now();
        let first = store.add(now);
        let second = store.add(now - Duration::hours(1));
        assert_eq!(store.entries()[0].id, second);
        assert_eq!(store.entries()[1].id, first);
    }

    #[test]
    fn remove_missing_id_is_noop() {
        let mut store = EntryStore::open(MemoryStorage::new());
        let id = store.add(Utc::now());
        let before = store.entries().to_vec();

        assert!(!store.remove(&EntryId::from("missing")));
        assert_eq!(store.entries(), before.as_slice());

        assert!(store.remove(&id));
        assert!(store.is_empty());
    }

    #[test]
    fn clear_is_persisted() {
        let storage = Rc::new(MemoryStorage::new());
        let mut store = EntryStore::open(storage.clone());
        store.add(Utc::now());
        store.add(Utc::now());
        store.clear();
        assert!(store.is_empty());
        assert!(EntryStore::open(storage).is_empty());
    }

    #[test]
    fn every_mutation_writes_once() {
        let mut storage = MockKeyValueStorage::new();
        storage
            .expect_get()
            .withf(|key| key == ENTRIES_KEY)
            .returning(|_| Ok(Some("[]".into())));
        storage
            .expect_set()
            .withf(|key, _| key == ENTRIES_KEY)
            .times(4)
            .returning(|_, _| Ok(()));

        let mut store = EntryStore::open(storage);
        let id = store.add(Utc::now());
        store.remove(&id);
        store.remove(&id);
        store.clear();
    }

    #[test]
    fn write_failure_keeps_memory_and_notifies() {
        let storage = MemoryStorage::with_quota(16);
        let failures = Rc::new(RefCell::new(0));

        let mut store = EntryStore::open(storage);
        let counter = failures.clone();
        store.on_persist_failure(move |e| {
            assert!(matches!(e, StorageError::QuotaExceeded { .. }));
            *counter.borrow_mut() += 1;
        });

        let id = store.add(Utc::now());
        assert_eq!(store.len(), 1);
        assert!(store.get(&id).is_some());
        assert_eq!(*failures.borrow(), 1);
    }

    #[test]
    fn read_failure_is_empty() {
        let mut storage = MockKeyValueStorage::new();
        storage
            .expect_get()
            .returning(|_| Err(StorageError::Io(std::io::ErrorKind::PermissionDenied.into())));
        let store = EntryStore::open(storage);
        assert!(store.is_empty());
    }

    #[test]
    fn legacy_entries_are_loaded() -> Result<()> {
        let storage = Rc::new(MemoryStorage::new());
        storage.set(
            LEGACY_ENTRY_KEYS[1],
            r#"[{"id":"1704149400000","iso":"2024-01-01T22:50:00.000Z","pretty":"x","dayKey":"2024-01-01"}]"#,
        )?;

        let store = EntryStore::open(storage.clone());
        assert_eq!(store.len(), 1);
        assert_eq!(store.entries()[0].id.as_str(), "1704149400000");
        assert!(storage.get(ENTRIES_KEY)?.is_some());
        Ok(())
    }

    #[test]
    fn duplicate_ids_are_dropped_on_load() -> Result<()> {
        let storage = MemoryStorage::new();
        storage.set(
            ENTRIES_KEY,
            r#"[{"id":"a","timestamp":"2024-01-01T10:00:00Z"},{"id":"a","timestamp":"2024-01-01T11:00:00Z"}]"#,
        )?;
        let store = EntryStore::open(storage);
        assert_eq!(store.len(), 1);
        Ok(())
    }
}
