//! [Tracker] is the state object a front end talks to. It owns the entry store, the interval
//! configuration and a clock, and rebuilds the day views after every change to the entries.

use std::{cell::RefCell, rc::Rc};

use chrono::{DateTime, Local, TimeZone, Utc};
use tracing::{debug, info};

use crate::{
    aggregate::{day_views, DayView},
    interval::{check_interval, IntervalCheck, IntervalConfig, IntervalError, IntervalMinutes},
    store::{
        entities::EntryId,
        kv::{KeyValueStorage, StorageError},
        EntryStore,
    },
    utils::clock::Clock,
};

/// Asks the user to confirm a destructive action.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F: FnMut(&str) -> bool> Confirm for F {
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

pub const CLEAR_PROMPT: &str = "Remove every entry? This can't be undone.";

/// Something the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    AddNow,
    AddAt(DateTime<Utc>),
    Remove(EntryId),
    Clear,
    SetInterval(String),
    CheckInterval,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Added(EntryId),
    Removed { id: EntryId, existed: bool },
    Cleared(bool),
    IntervalSet(Result<IntervalMinutes, IntervalError>),
    Checked(IntervalCheck),
}

pub struct Tracker<S: KeyValueStorage, Tz: TimeZone = Local> {
    entries: EntryStore<Rc<S>>,
    interval: IntervalConfig<Rc<S>>,
    clock: Box<dyn Clock>,
    tz: Tz,
    view: Vec<DayView>,
}

impl<S: KeyValueStorage> Tracker<S, Local> {
    pub fn open(storage: S, clock: Box<dyn Clock>) -> Self {
        Self::open_in(storage, clock, Local)
    }
}

impl<S: KeyValueStorage, Tz: TimeZone> Tracker<S, Tz> {
    /// Restores entries and interval from `storage`, grouping days in `tz`.
    pub fn open_in(storage: S, clock: Box<dyn Clock>, tz: Tz) -> Self {
        let storage = Rc::new(storage);
        let entries = EntryStore::open(storage.clone());
        let interval = IntervalConfig::load(storage);
        let mut tracker = Self {
            entries,
            interval,
            clock,
            tz,
            view: vec![],
        };
        tracker.recompute();
        tracker
    }

    /// Registers a callback notified whenever entries or the interval can't be written.
    pub fn on_persist_failure(&mut self, hook: impl FnMut(&StorageError) + 'static) {
        let shared = Rc::new(RefCell::new(hook));
        let for_entries = shared.clone();
        self.entries
            .on_persist_failure(move |e| (*for_entries.borrow_mut())(e));
        self.interval
            .on_persist_failure(move |e| (*shared.borrow_mut())(e));
    }

    pub fn entries(&self) -> &EntryStore<Rc<S>> {
        &self.entries
    }

    /// Day groups with histograms, newest day first.
    pub fn view(&self) -> &[DayView] {
        &self.view
    }

    pub fn interval(&self) -> IntervalMinutes {
        self.interval.get()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.time()
    }

    pub fn add_now(&mut self) -> EntryId {
        let now = self.clock.time();
        self.add_at(now)
    }

    pub fn add_at(&mut self, timestamp: DateTime<Utc>) -> EntryId {
        let id = self.entries.add(timestamp);
        self.recompute();
        info!("Added entry {id}");
        id
    }

    pub fn remove(&mut self, id: &EntryId) -> bool {
        let existed = self.entries.remove(id);
        self.recompute();
        existed
    }

    /// Clears everything if `confirm` agrees. Returns whether anything was cleared.
    pub fn clear(&mut self, confirm: &mut dyn Confirm) -> bool {
        if !confirm.confirm(CLEAR_PROMPT) {
            debug!("Clear was not confirmed");
            return false;
        }
        self.entries.clear();
        self.recompute();
        info!("Cleared all entries");
        true
    }

    pub fn set_interval(&mut self, input: &str) -> Result<IntervalMinutes, IntervalError> {
        self.interval.set_from_input(input)
    }

    pub fn check(&self) -> IntervalCheck {
        check_interval(self.entries.entries(), self.interval.get(), self.clock.time())
    }

    pub fn dispatch(&mut self, intent: Intent, confirm: &mut dyn Confirm) -> Outcome {
        debug!("Handling {intent:?}");
        match intent {
            Intent::AddNow => Outcome::Added(self.add_now()),
            Intent::AddAt(timestamp) => Outcome::Added(self.add_at(timestamp)),
            Intent::Remove(id) => {
                let existed = self.remove(&id);
                Outcome::Removed { id, existed }
            }
            Intent::Clear => Outcome::Cleared(self.clear(confirm)),
            Intent::SetInterval(input) => Outcome::IntervalSet(self.set_interval(&input)),
            Intent::CheckInterval => Outcome::Checked(self.check()),
        }
    }

    fn recompute(&mut self) {
        self.view = day_views(self.entries.entries(), &self.tz);
    }
}
