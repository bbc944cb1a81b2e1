//! Derived views over the entry list. Nothing here is persisted: groups and histograms are rebuilt
//! from the instants on every change.
//!
//! Days are calendar dates in the zone passed in, which is [chrono::Local] for real use. Keying by
//! UTC date would put an entry logged at 00:10 local time into the previous day for anyone east of
//! Greenwich.

use std::collections::BTreeMap;

use chrono::{NaiveDate, TimeZone};
use tracing::instrument;

use crate::{store::entities::Entry, utils::time::day_key};

pub const HOURS_IN_DAY: usize = 24;

/// Entries of one calendar day, most recent first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayGroup {
    pub day: NaiveDate,
    pub entries: Vec<Entry>,
}

impl DayGroup {
    /// `YYYY-MM-DD`
    pub fn key(&self) -> String {
        day_key(self.day)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Count of entries per hour of the day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HourHistogram {
    pub counts: [usize; HOURS_IN_DAY],
    /// Largest bucket, never below 1 so it can always be used as a divisor.
    pub max_count: usize,
}

impl HourHistogram {
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Height of the bucket relative to the largest one, in `0.0..=1.0`.
    pub fn proportion(&self, hour: usize) -> f64 {
        self.counts[hour] as f64 / self.max_count as f64
    }
}

/// A day group together with its histogram. This is what gets rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayView {
    pub group: DayGroup,
    pub histogram: HourHistogram,
}

/// Partitions entries by calendar date in `tz`. Groups come out newest day first, entries inside a
/// group newest first. The order of the input doesn't matter.
pub fn group_by_day<Tz: TimeZone>(entries: &[Entry], tz: &Tz) -> Vec<DayGroup> {
    let mut days = BTreeMap::<NaiveDate, Vec<Entry>>::new();
    for entry in entries {
        days.entry(entry.local_date(tz))
            .or_default()
            .push(entry.clone());
    }

    days.into_iter()
        .rev()
        .map(|(day, mut entries)| {
            // id breaks ties so equal instants don't depend on input order
            entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
            DayGroup { day, entries }
        })
        .collect()
}

/// Buckets the entries of a group by hour of day in `tz`. Must be the zone the group was built in.
pub fn histogram<Tz: TimeZone>(group: &DayGroup, tz: &Tz) -> HourHistogram {
    let mut counts = [0; HOURS_IN_DAY];
    for entry in &group.entries {
        counts[entry.local_hour(tz)] += 1;
    }
    let max_count = counts.iter().copied().max().unwrap_or(0).max(1);
    HourHistogram { counts, max_count }
}

#[instrument(skip_all, fields(entries = entries.len()))]
pub fn day_views<Tz: TimeZone>(entries: &[Entry], tz: &Tz) -> Vec<DayView> {
    group_by_day(entries, tz)
        .into_iter()
        .map(|group| {
            let histogram = histogram(&group, tz);
            DayView { group, histogram }
        })
        .collect()
}
