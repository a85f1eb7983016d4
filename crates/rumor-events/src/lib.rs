//! Shared rumor records and lifecycle events.
//!
//! This crate contains pure data structures with no simulation logic.
//! It is the wire vocabulary between the rumor engine and its collaborators.

pub mod event;
pub mod record;
pub mod timestamp;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;

// Re-export timestamp types
pub use timestamp::{ParseDateError, Season, SimDate, SimTimestamp, DAYS_PER_SEASON, TICKS_PER_DAY};

// Re-export record types
pub use record::{ParseSeverityError, RumorRecord, Severity, Spread, Variant};

// Re-export event types
pub use event::{generate_event_id, ForgetReason, RumorEvent, RumorEventKind};
