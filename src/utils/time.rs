use chrono::{DateTime, Duration, NaiveDate, TimeZone};
use now::DateTimeNow;

/// This is the standard way of converting a calendar day to a string in sticks.
pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Start of the day `days_back` days before the day of `date`, in the zone of `date`. `None` when
/// that day is out of the representable range.
pub fn days_back_start<Tz: TimeZone>(
    date: DateTime<Tz>,
    days_back: u32,
) -> Option<DateTime<Tz>> {
    date.beginning_of_day()
        .checked_sub_signed(Duration::days(days_back as i64))
}

/// Formats a duration the way it is printed in the terminal, e.g. `1h5m0s`. Negative durations
/// get a leading `-`.
pub fn format_duration(v: Duration) -> String {
    if v < Duration::zero() {
        return format!("-{}", format_duration(v.abs()));
    }
    if v.num_hours() > 0 {
        format!(
            "{}h{}m{}s",
            v.num_hours(),
            v.num_minutes() % 60,
            v.num_seconds() % 60
        )
    } else if v.num_minutes() > 0 {
        format!("{}m{}s", v.num_minutes() % 60, v.num_seconds() % 60)
    } else {
        format!("{}s", v.num_seconds() % 60)
    }
}
