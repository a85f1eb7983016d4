//! Agent Components
//!
//! Identity, disposition, and allegiance of the NPCs that trade rumors.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Component: Unique identifier for an agent
#[derive(Component, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    /// Id for the n-th spawned agent (e.g., "agent_0007")
    pub fn numbered(n: usize) -> Self {
        Self(format!("agent_{:04}", n))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Component: How readily an agent believes what it hears
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Temperament {
    /// Receiver bias in [-1, 1]; negative is skeptical, positive gullible
    pub credulity: f64,
}

impl Temperament {
    pub fn new(credulity: f64) -> Self {
        Self {
            credulity: credulity.clamp(-1.0, 1.0),
        }
    }
}

impl Default for Temperament {
    fn default() -> Self {
        Self { credulity: 0.0 }
    }
}

/// Component: The faction an agent belongs to
#[derive(Component, Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Faction(pub String);

impl Faction {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Faction names handed out round-robin at spawn
pub const FACTION_NAMES: &[&str] = &["thornwood", "ironmere", "saltmarsh", "ashfall", "westvale"];
