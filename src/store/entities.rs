use std::{collections::HashSet, fmt::Display, sync::Arc};

use chrono::{DateTime, NaiveDate, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of an [Entry]. Stable for the whole life of the entry and used as the removal
/// key.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize, Clone)]
#[serde(transparent)]
pub struct EntryId(Arc<str>);

impl EntryId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string().into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntryId {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl From<String> for EntryId {
    fn from(value: String) -> Self {
        Self(value.into())
    }
}

impl Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One logged event. The instant is the only stored time information, day and hour are always
/// derived from it in the zone of the viewer.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct Entry {
    pub id: EntryId,
    #[serde(with = "instant_ser")]
    pub timestamp: DateTime<Utc>,
}

impl Entry {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            id: EntryId::generate(),
            timestamp,
        }
    }

    pub fn with_id(id: impl Into<EntryId>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            timestamp,
        }
    }

    /// Calendar date of the entry as seen in `tz`.
    pub fn local_date<Tz: TimeZone>(&self, tz: &Tz) -> NaiveDate {
        self.timestamp.with_timezone(tz).date_naive()
    }

    /// Hour of day (0-23) of the entry as seen in `tz`.
    pub fn local_hour<Tz: TimeZone>(&self, tz: &Tz) -> usize {
        self.timestamp.with_timezone(tz).hour() as usize
    }
}

/// Drops entries whose id was already seen, keeping the first occurrence.
pub fn dedup_ids(entries: Vec<Entry>) -> Vec<Entry> {
    let mut seen = HashSet::with_capacity(entries.len());
    entries
        .into_iter()
        .filter(|entry| seen.insert(entry.id.clone()))
        .collect()
}

/// Record layout written by the first generations of the tracker. `pretty` and `dayKey` were
/// derived values and are ignored on read.
#[derive(Debug, Deserialize)]
pub struct LegacyEntryEntity {
    #[serde(default)]
    pub id: Option<String>,
    pub iso: String,
}

pub(crate) mod instant_ser {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{self, de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(instant: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&instant.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(D::Error::custom)
    }

    pub fn parse(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        DateTime::parse_from_rfc3339(s).map(|v| v.with_timezone(&Utc))
    }
}
