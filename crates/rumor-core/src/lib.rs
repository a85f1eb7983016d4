//! Rumor Propagation Engine
//!
//! Tracks how rumors spread, mutate, merge, and fade among NPC agents. The
//! [`RumorEngine`] facade owns all state; the `sim` module drives it from a
//! small ECS world.

pub mod believability;
pub mod clock;
pub mod components;
pub mod config;
pub mod decay;
pub mod engine;
pub mod error;
pub mod events;
pub mod matcher;
pub mod mutation;
pub mod propagation;
pub mod sim;
pub mod store;

pub use clock::{Clock, TickClock};
pub use components::{Rumor, RumorState};
pub use config::{ConfigError, RumorConfig};
pub use decay::DecayReport;
pub use engine::{
    AgentRumorQuery, Interaction, InteractionResult, MergeOutcome, RumorEngine, RumorQuery,
    RumorStatistics, RumorSummary, SimilarRumor, SpreadOutcome, SpreadRequest,
};
pub use error::{RumorError, RumorResult};
pub use propagation::{Endpoint, GateDecision, ReachabilityRule};
pub use store::{NewRumor, NewVariant, RumorStore};
