//! Event Module - per-run audit trail
//!
//! - `Event`: envelope with id + timestamp + kind
//! - `EventKind`: run-level, node-level and provider-level variants
//! - `EventLog`: thread-safe, append-only log

mod log;

pub use log::{Event, EventKind, EventLog};
