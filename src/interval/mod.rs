//! Minimum time between two events and the check against the most recent entry.

use std::{fmt::Display, num::NonZeroU32, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::store::{
    entities::Entry,
    kv::{KeyValueStorage, PersistHook, StorageError},
};

pub const INTERVAL_KEY: &str = "sticks_interval_minutes";

/// A day. Anything longer is almost certainly a typo.
pub const MAX_INTERVAL_MINUTES: u32 = 24 * 60;

const DEFAULT_INTERVAL_MINUTES: NonZeroU32 = match NonZeroU32::new(60) {
    Some(v) => v,
    None => unreachable!(),
};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IntervalError {
    #[error("interval must be a whole number of minutes, got {0:?}")]
    NotANumber(String),
    #[error("interval must be positive, got {0}")]
    NotPositive(i64),
    #[error("interval can't be longer than {max} minutes, got {0}", max = MAX_INTERVAL_MINUTES)]
    TooLong(i64),
}

/// Positive number of minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IntervalMinutes(NonZeroU32);

impl IntervalMinutes {
    pub fn new(minutes: i64) -> Result<Self, IntervalError> {
        if minutes <= 0 {
            return Err(IntervalError::NotPositive(minutes));
        }
        if minutes > MAX_INTERVAL_MINUTES as i64 {
            return Err(IntervalError::TooLong(minutes));
        }
        u32::try_from(minutes)
            .ok()
            .and_then(NonZeroU32::new)
            .map(Self)
            .ok_or(IntervalError::NotPositive(minutes))
    }

    pub fn get(&self) -> u32 {
        self.0.get()
    }

    pub fn as_duration(&self) -> Duration {
        Duration::minutes(self.get() as i64)
    }
}

impl Default for IntervalMinutes {
    fn default() -> Self {
        Self(DEFAULT_INTERVAL_MINUTES)
    }
}

impl Display for IntervalMinutes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for IntervalMinutes {
    type Err = IntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let minutes = trimmed
            .parse::<i64>()
            .map_err(|_| IntervalError::NotANumber(trimmed.to_owned()))?;
        Self::new(minutes)
    }
}

/// Holds the configured interval and keeps it persisted under [INTERVAL_KEY], separately from the
/// entries.
pub struct IntervalConfig<S> {
    storage: S,
    current: IntervalMinutes,
    persist_failure: Option<PersistHook>,
}

impl<S: KeyValueStorage> IntervalConfig<S> {
    /// Reads the persisted interval. Missing or invalid values fall back to the default.
    pub fn load(storage: S) -> Self {
        let current = match storage.get(INTERVAL_KEY) {
            Ok(Some(raw)) => raw.parse::<IntervalMinutes>().unwrap_or_else(|e| {
                warn!("Stored interval {raw:?} is invalid, using default: {e}");
                IntervalMinutes::default()
            }),
            Ok(None) => IntervalMinutes::default(),
            Err(e) => {
                warn!("Failed to read interval, using default: {e}");
                IntervalMinutes::default()
            }
        };
        Self {
            storage,
            current,
            persist_failure: None,
        }
    }

    /// Registers a callback notified whenever the interval can't be written.
    pub fn on_persist_failure(&mut self, hook: impl FnMut(&StorageError) + 'static) {
        self.persist_failure = Some(Box::new(hook));
    }

    pub fn get(&self) -> IntervalMinutes {
        self.current
    }

    /// Updates the interval for this session. Returns whether it was persisted as well, a failed
    /// write is reported to the failure hook.
    pub fn set(&mut self, value: IntervalMinutes) -> bool {
        debug!("Setting interval to {value} minutes");
        self.current = value;
        match self.storage.set(INTERVAL_KEY, &value.to_string()) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to persist interval {value}: {e}");
                if let Some(hook) = self.persist_failure.as_mut() {
                    hook(&e);
                }
                false
            }
        }
    }

    /// Parses user input. Rejected input leaves the previous value in place.
    pub fn set_from_input(&mut self, input: &str) -> Result<IntervalMinutes, IntervalError> {
        let value = input
            .parse::<IntervalMinutes>()
            .inspect_err(|e| debug!("Rejected interval input {input:?}: {e}"))?;
        self.set(value);
        Ok(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalCheck {
    /// Nothing logged yet.
    Empty,
    Allowed { elapsed: Duration },
    Wait {
        elapsed: Duration,
        /// Whole minutes left, rounded down.
        remaining_minutes: i64,
    },
}

impl IntervalCheck {
    pub fn is_allowed(&self) -> bool {
        matches!(self, IntervalCheck::Allowed { .. })
    }
}

/// Compares the time since the most recent entry against `interval`.
pub fn check_interval(
    entries: &[Entry],
    interval: IntervalMinutes,
    now: DateTime<Utc>,
) -> IntervalCheck {
    let Some(latest) = entries.iter().map(|entry| entry.timestamp).max() else {
        return IntervalCheck::Empty;
    };

    let elapsed = now - latest;
    let required = interval.as_duration();
    if elapsed >= required {
        IntervalCheck::Allowed { elapsed }
    } else {
        let left = required - elapsed;
        let remaining_minutes = left.num_milliseconds().div_euclid(60_000);
        IntervalCheck::Wait {
            elapsed,
            remaining_minutes,
        }
    }
}
