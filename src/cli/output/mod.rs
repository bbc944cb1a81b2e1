//! Terminal rendering of the day views and interval checks.

use std::fmt::Write;

use ansi_term::Colour;
use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};

use crate::{
    aggregate::{DayView, HourHistogram},
    interval::{IntervalCheck, IntervalMinutes},
    store::entities::EntryId,
    utils::time::{days_back_start, format_duration},
};

const BARS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Keeps the views of the last `days` calendar days, today included. Views must be newest first.
/// A range reaching past the earliest representable date keeps everything.
pub fn last_days<Tz: TimeZone>(
    views: &[DayView],
    now: DateTime<Tz>,
    days: Option<u32>,
) -> &[DayView] {
    let Some(days) = days else {
        return views;
    };
    if days == 0 {
        return &views[..0];
    }
    let Some(first_day) = days_back_start(now, days - 1).map(|v| v.date_naive()) else {
        return views;
    };
    let end = views
        .iter()
        .take_while(|view| view.group.day >= first_day)
        .count();
    &views[..end]
}

/// One character per hour, height relative to the busiest hour. Any non-zero hour is visible.
pub fn histogram_bar(histogram: &HourHistogram) -> String {
    histogram
        .counts
        .iter()
        .map(|count| BARS[(count * (BARS.len() - 1)).div_ceil(histogram.max_count)])
        .collect()
}

pub fn render_days<Tz: TimeZone>(
    views: &[DayView],
    total: usize,
    collapsed: bool,
    tz: &Tz,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let mut out = String::new();
    // Writing into a String can't fail.
    let _ = writeln!(out, "Entries: {total}");
    if views.is_empty() {
        let _ = writeln!(out, "{}", Colour::Fixed(8).paint("No entries"));
        return out;
    }

    for view in views {
        let group = &view.group;
        let _ = writeln!(
            out,
            "{}",
            Colour::Cyan
                .bold()
                .paint(format!("{}. Count: {}", group.key(), group.len()))
        );
        let _ = writeln!(out, "  |{}|", histogram_bar(&view.histogram));
        let _ = writeln!(out, "   0     6     12    18    ");
        if collapsed {
            continue;
        }
        for (i, entry) in group.entries.iter().enumerate() {
            let local = entry.timestamp.with_timezone(tz);
            let _ = writeln!(
                out,
                "  {:>3}  {}  {}  {}",
                group.len() - i,
                local.format("%H:%M:%S"),
                entry.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
                Colour::Fixed(8).paint(entry.id.as_str())
            );
        }
    }
    out
}

pub fn added(id: &EntryId, timestamp: DateTime<Utc>) -> String {
    format!(
        "Added {} at {}",
        Colour::Fixed(8).paint(id.as_str()),
        timestamp
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
    )
}

pub fn warning(message: &str) -> String {
    Colour::Yellow.paint(message).to_string()
}

pub fn check_message(check: &IntervalCheck, interval: IntervalMinutes) -> String {
    match check {
        IntervalCheck::Empty => "No entries yet, nothing to wait for".to_string(),
        IntervalCheck::Allowed { elapsed } => Colour::Green
            .paint(format!(
                "Go ahead: {} since the last one (interval {interval} min)",
                format_duration(*elapsed)
            ))
            .to_string(),
        IntervalCheck::Wait {
            elapsed,
            remaining_minutes,
        } if *elapsed < Duration::zero() => Colour::Red
            .paint(format!(
                "Wait {remaining_minutes} more minutes: the last entry is {} in the future (interval {interval} min)",
                format_duration(-*elapsed)
            ))
            .to_string(),
        IntervalCheck::Wait {
            elapsed,
            remaining_minutes,
        } => {
            let remaining = match remaining_minutes {
                0 => "less than a minute".to_string(),
                1 => "1 more minute".to_string(),
                v => format!("{v} more minutes"),
            };
            Colour::Red
                .paint(format!(
                    "Wait {remaining}: {} since the last one (interval {interval} min)",
                    format_duration(*elapsed)
                ))
                .to_string()
        }
    }
}
