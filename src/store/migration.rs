//! Storage layout versions.
//!
//! Version 4 keeps a JSON array of `{id, timestamp}` under [ENTRIES_KEY]. Versions 1-3 used their
//! own keys and stored `{id, iso, pretty, dayKey}` records. When the current key is missing the
//! newest legacy key found is converted and written under the current key, so history survives the
//! upgrade instead of being silently abandoned. The legacy key is removed only when every record in
//! it was converted, otherwise its bytes stay where they were.

use serde_json::Value;
use tracing::{info, warn};

use super::{
    entities::{dedup_ids, instant_ser, Entry, EntryId, LegacyEntryEntity},
    kv::{KeyValueStorage, StorageError},
};

pub const ENTRIES_KEY: &str = "sticks_entries_v4";

/// Newest first.
pub const LEGACY_ENTRY_KEYS: [&str; 3] = [
    "smoked_sticks_entries_v3",
    "smoked_sticks_entries_v2",
    "smoked_sticks_entries_v1",
];

pub fn encode_entries(entries: &[Entry]) -> Result<String, StorageError> {
    Ok(serde_json::to_string(entries)?)
}

/// Parses the current layout. Anything that isn't a JSON array yields nothing, individual
/// malformed records are skipped.
pub fn decode_entries(raw: &str) -> Vec<Entry> {
    decode_with(raw, |value| {
        serde_json::from_value::<Entry>(value).map_err(|e| e.to_string())
    })
    .entries
}

/// Result of decoding a stored list.
#[derive(Debug)]
pub struct Decoded {
    pub entries: Vec<Entry>,
    /// The list parsed and no record was skipped or dropped as a duplicate.
    pub complete: bool,
}

/// Parses the layout used by versions 1-3.
pub fn decode_legacy(raw: &str) -> Decoded {
    decode_with(raw, |value| {
        let legacy =
            serde_json::from_value::<LegacyEntryEntity>(value).map_err(|e| e.to_string())?;
        let timestamp = instant_ser::parse(&legacy.iso).map_err(|e| e.to_string())?;
        let id = legacy
            .id
            .filter(|id| !id.is_empty())
            .map(EntryId::from)
            .unwrap_or_else(EntryId::generate);
        Ok(Entry { id, timestamp })
    })
}

fn decode_with(raw: &str, mut parse: impl FnMut(Value) -> Result<Entry, String>) -> Decoded {
    let broken = Decoded {
        entries: vec![],
        complete: false,
    };
    let records = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(records)) => records,
        Ok(other) => {
            warn!("Stored entries are not a list, found {other}");
            return broken;
        }
        Err(e) => {
            warn!("Stored entries are not valid json: {e}");
            return broken;
        }
    };
    let total = records.len();

    let entries = records
        .into_iter()
        .filter_map(|record| {
            let shown = record.to_string();
            // ignore illegal values, the rest of the history is still useful
            parse(record)
                .inspect_err(|e| warn!("Skipping malformed entry {shown}: {e}"))
                .ok()
        })
        .collect();
    let entries = dedup_ids(entries);
    Decoded {
        complete: entries.len() == total,
        entries,
    }
}

/// Looks for data written under a legacy key and moves it to [ENTRIES_KEY]. Returns `None` when no
/// legacy data exists.
pub fn migrate_legacy(storage: &impl KeyValueStorage) -> Option<Vec<Entry>> {
    for key in LEGACY_ENTRY_KEYS {
        let raw = match storage.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => continue,
            Err(e) => {
                warn!("Failed to read legacy key {key}: {e}");
                continue;
            }
        };

        let Decoded { entries, complete } = decode_legacy(&raw);
        info!("Migrating {} entries from {key}", entries.len());

        match encode_entries(&entries).and_then(|encoded| storage.set(ENTRIES_KEY, &encoded)) {
            Ok(()) if !complete => {
                warn!("Some records of {key} couldn't be converted, keeping it untouched");
            }
            Ok(()) => {
                if let Err(e) = storage.remove(key) {
                    warn!("Migrated {key} but failed to remove it: {e}");
                }
            }
            // Legacy data stays in place so the next start can try again.
            Err(e) => warn!("Failed to store migrated entries from {key}: {e}"),
        }
        return Some(entries);
    }
    None
}
