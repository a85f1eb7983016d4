//! Rumor Lifecycle Events
//!
//! Events the engine publishes for the memory, dialogue, and narrative
//! systems. Serialized one per line (JSONL) with the kind flattened into the
//! envelope and tagged by `event_type`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::timestamp::SimTimestamp;

/// Why a rumor left the active store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForgetReason {
    /// Every listener's belief decayed below the forgetting threshold
    Decayed,
    /// Removed by an administrative action
    Deleted,
    /// Folded into an earlier, similar rumor
    Merged,
}

impl fmt::Display for ForgetReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForgetReason::Decayed => write!(f, "decayed"),
            ForgetReason::Deleted => write!(f, "deleted"),
            ForgetReason::Merged => write!(f, "merged"),
        }
    }
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum RumorEventKind {
    RumorCreated {
        rumor_id: String,
        originator_id: String,
    },
    RumorSpread {
        rumor_id: String,
        variant_id: String,
        from_agent_id: String,
        to_agent_id: String,
        believability: f64,
        /// The listener already knew the rumor
        reinforced: bool,
        /// A new variant was produced on the way
        mutated: bool,
    },
    RumorMutated {
        rumor_id: String,
        variant_id: String,
        parent_variant_id: String,
    },
    RumorMerged {
        surviving_rumor_id: String,
        absorbed_rumor_id: String,
    },
    RumorForgotten {
        rumor_id: String,
        reason: ForgetReason,
    },
}

impl RumorEventKind {
    /// The rumor this event is about (the survivor, for merges).
    pub fn rumor_id(&self) -> &str {
        match self {
            RumorEventKind::RumorCreated { rumor_id, .. }
            | RumorEventKind::RumorSpread { rumor_id, .. }
            | RumorEventKind::RumorMutated { rumor_id, .. }
            | RumorEventKind::RumorForgotten { rumor_id, .. } => rumor_id,
            RumorEventKind::RumorMerged {
                surviving_rumor_id, ..
            } => surviving_rumor_id,
        }
    }

    /// Snake-case name matching the serialized `event_type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            RumorEventKind::RumorCreated { .. } => "rumor_created",
            RumorEventKind::RumorSpread { .. } => "rumor_spread",
            RumorEventKind::RumorMutated { .. } => "rumor_mutated",
            RumorEventKind::RumorMerged { .. } => "rumor_merged",
            RumorEventKind::RumorForgotten { .. } => "rumor_forgotten",
        }
    }
}

/// A published event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RumorEvent {
    /// Unique identifier (e.g., "evt_00000042")
    pub event_id: String,
    /// When the event occurred
    pub timestamp: SimTimestamp,
    #[serde(flatten)]
    pub kind: RumorEventKind,
}

impl RumorEvent {
    pub fn new(event_id: impl Into<String>, timestamp: SimTimestamp, kind: RumorEventKind) -> Self {
        Self {
            event_id: event_id.into(),
            timestamp,
            kind,
        }
    }

    /// Serializes the event as a single JSON line (no trailing newline).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes an event from a JSON line.
    pub fn from_jsonl(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

/// Generates an event ID with the given sequence number.
pub fn generate_event_id(sequence: u64) -> String {
    format!("evt_{:08}", sequence)
}
