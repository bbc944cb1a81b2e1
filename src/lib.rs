//! Small personal habit tracker. Every logged event ("stick") is a single instant. Events are
//! shown grouped by local calendar day together with an hourly histogram, and the tracker can
//! tell whether the configured interval has passed since the most recent one.
//!
//! Everything runs synchronously on the caller's thread. State lives in a
//! [store::kv::KeyValueStorage], so the same core can sit behind the bundled CLI or any other
//! front end.

pub mod aggregate;
pub mod cli;
pub mod interval;
pub mod store;
pub mod tracker;
pub mod utils;
