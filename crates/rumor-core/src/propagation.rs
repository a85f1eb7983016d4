//! Propagation Gate
//!
//! Decides whether a rumor can physically travel from one agent to another.
//! The distance check is always applied; extra [`ReachabilityRule`]s are
//! ANDed with it. Evaluation is pure, so a batch of interactions can be gated
//! before anything is written.

use std::collections::BTreeSet;
use std::fmt;

use crate::components::{Position, Rumor};
use crate::config::PropagationConfig;

/// One side of a possible exchange.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Endpoint {
    pub position: Position,
    pub faction: Option<String>,
}

impl Endpoint {
    pub fn new(position: Position) -> Self {
        Self {
            position,
            faction: None,
        }
    }

    pub fn in_faction(mut self, faction: impl Into<String>) -> Self {
        self.faction = Some(faction.into());
        self
    }
}

impl From<Position> for Endpoint {
    fn from(position: Position) -> Self {
        Endpoint::new(position)
    }
}

/// Result of gating one exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Allowed { distance: f64 },
    OutOfRange { distance: f64, radius: f64 },
    /// A reachability rule refused the exchange
    Blocked { rule: String },
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allowed { .. })
    }
}

/// Additional constraint on who can tell whom.
pub trait ReachabilityRule: fmt::Debug + Send + Sync {
    /// Short name used in logs and [`GateDecision::Blocked`].
    fn name(&self) -> &str;

    fn permits(&self, rumor: &Rumor, source: &Endpoint, target: &Endpoint) -> bool;
}

/// Rumors carrying a guarded category only pass between members of the
/// same faction.
#[derive(Debug, Clone, Default)]
pub struct FactionSecrecy {
    guarded: BTreeSet<String>,
}

impl FactionSecrecy {
    pub fn new<I, S>(guarded: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            guarded: guarded.into_iter().map(Into::into).collect(),
        }
    }
}

impl ReachabilityRule for FactionSecrecy {
    fn name(&self) -> &str {
        "faction_secrecy"
    }

    fn permits(&self, rumor: &Rumor, source: &Endpoint, target: &Endpoint) -> bool {
        if rumor.categories.is_disjoint(&self.guarded) {
            return true;
        }
        match (&source.faction, &target.faction) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

/// Distance check plus pluggable rules.
#[derive(Debug)]
pub struct PropagationGate {
    default_radius: f64,
    rules: Vec<Box<dyn ReachabilityRule>>,
}

impl Default for PropagationGate {
    fn default() -> Self {
        Self::new(PropagationConfig::default().default_radius)
    }
}

impl PropagationGate {
    /// Gate with only the distance check.
    pub fn new(default_radius: f64) -> Self {
        Self {
            default_radius,
            rules: Vec::new(),
        }
    }

    /// Gate with the distance check and a [`FactionSecrecy`] rule for the
    /// configured guarded categories.
    pub fn from_config(config: &PropagationConfig) -> Self {
        let mut gate = Self::new(config.default_radius);
        if !config.faction_guarded_categories.is_empty() {
            gate.add_rule(FactionSecrecy::new(config.faction_guarded_categories.iter().cloned()));
        }
        gate
    }

    pub fn add_rule(&mut self, rule: impl ReachabilityRule + 'static) {
        self.rules.push(Box::new(rule));
    }

    pub fn default_radius(&self) -> f64 {
        self.default_radius
    }

    pub fn radius_for(&self, rumor: &Rumor) -> f64 {
        rumor.radius_or(self.default_radius)
    }

    /// True if the distance between the two positions is within the rumor's radius.
    pub fn can_propagate(&self, rumor: &Rumor, source: &Position, target: &Position) -> bool {
        source.distance_to(target) <= self.radius_for(rumor)
    }

    /// Distance check first, then every rule in registration order.
    pub fn evaluate(&self, rumor: &Rumor, source: &Endpoint, target: &Endpoint) -> GateDecision {
        let distance = source.position.distance_to(&target.position);
        let radius = self.radius_for(rumor);
        if !(distance <= radius) {
            return GateDecision::OutOfRange { distance, radius };
        }
        for rule in &self.rules {
            if !rule.permits(rumor, source, target) {
                return GateDecision::Blocked {
                    rule: rule.name().to_string(),
                };
            }
        }
        GateDecision::Allowed { distance }
    }
}
