use std::fmt::Display;

use chrono::{DateTime, Local, TimeZone, Utc};
use chrono_english::parse_date_string;
use clap::ValueEnum;
use thiserror::Error;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntryTimeError {
    #[error("Can't understand date {input:?}: {reason}")]
    Unparsable { input: String, reason: String },
    #[error("{0} is in the future")]
    InFuture(String),
}

/// Parses the time of a manually added entry, relative to `now` in the local zone.
pub fn parse_entry_time(
    input: &str,
    now: DateTime<Utc>,
    style: DateStyle,
) -> Result<DateTime<Utc>, EntryTimeError> {
    parse_entry_time_in(input, now.with_timezone(&Local), style)
}

/// Same as [parse_entry_time] with an explicit zone for the relative expressions.
pub fn parse_entry_time_in<Tz: TimeZone>(
    input: &str,
    now: DateTime<Tz>,
    style: DateStyle,
) -> Result<DateTime<Utc>, EntryTimeError>
where
    Tz::Offset: Copy,
{
    let parsed = parse_date_string(input, now.clone(), style.into()).map_err(|e| {
        EntryTimeError::Unparsable {
            input: input.to_owned(),
            reason: e.to_string(),
        }
    })?;
    if parsed > now {
        return Err(EntryTimeError::InFuture(parsed.naive_local().to_string()));
    }
    Ok(parsed.to_utc())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, FixedOffset, NaiveDate, TimeZone};

    use super::{parse_entry_time_in, DateStyle, EntryTimeError};

    #[test]
    fn relative_times() {
        let tz = FixedOffset::east_opt(3 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap();

        assert_eq!(
            parse_entry_time_in("1 hour ago", now, DateStyle::Uk),
            Ok(now.to_utc() - Duration::hours(1))
        );
    }

    #[test]
    fn dialect_changes_day_month_order() {
        let tz = FixedOffset::east_opt(0).unwrap();
        let now = tz.with_ymd_and_hms(2024, 12, 31, 12, 0, 0).unwrap();

        assert_eq!(
            parse_entry_time_in("03/04/2024", now, DateStyle::Uk).map(|v| v.date_naive()),
            Ok(NaiveDate::from_ymd_opt(2024, 4, 3).unwrap())
        );
        assert_eq!(
            parse_entry_time_in("03/04/2024", now, DateStyle::Us).map(|v| v.date_naive()),
            Ok(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap())
        );
    }

    #[test]
    fn rejects_garbage_and_future() {
        let tz = FixedOffset::east_opt(0).unwrap();
        let now = tz.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap();

        assert!(matches!(
            parse_entry_time_in("whenever", now, DateStyle::Uk),
            Err(EntryTimeError::Unparsable { .. })
        ));
        assert!(matches!(
            parse_entry_time_in("tomorrow", now, DateStyle::Uk),
            Err(EntryTimeError::InFuture(_))
        ));
    }
}
