//! Believability Model
//!
//! How strongly a listener believes what they were just told.
//!
//! A first hearing scores
//! `(base + truth_weight·truth + relationship_weight·relationship + bias_weight·bias)`
//! discounted by `hop_decay` for every relay beyond the first. Hearing a
//! rumor again adds `reinforcement_increment + source_carryover·fresh`,
//! never lowering belief and never passing 1.

use crate::config::BelievabilityConfig;

/// Inputs for one believability computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BelievabilityInput {
    /// Truth value of the wording being passed on
    pub truth_value: f64,
    /// Hops from the originator to the listener (1 = heard from the originator)
    pub relay_depth: u32,
    /// Listener's trust in the teller, in [-1, 1]
    pub relationship: f64,
    /// Listener's credulity, in [-1, 1]
    pub receiver_bias: f64,
    /// Listener's current belief if they already know the rumor
    pub existing: Option<f64>,
}

/// Scores listener belief.
#[derive(Debug, Clone)]
pub struct BelievabilityModel {
    config: BelievabilityConfig,
}

impl Default for BelievabilityModel {
    fn default() -> Self {
        Self::new(BelievabilityConfig::default())
    }
}

impl BelievabilityModel {
    pub fn new(config: BelievabilityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BelievabilityConfig {
        &self.config
    }

    /// Belief on first hearing.
    pub fn initial(&self, truth_value: f64, relay_depth: u32, relationship: f64, receiver_bias: f64) -> f64 {
        let c = &self.config;
        let raw = finite_or_zero(c.base)
            + finite_or_zero(c.truth_weight) * finite_or_zero(truth_value).clamp(0.0, 1.0)
            + finite_or_zero(c.relationship_weight) * finite_or_zero(relationship).clamp(-1.0, 1.0)
            + finite_or_zero(c.bias_weight) * finite_or_zero(receiver_bias).clamp(-1.0, 1.0);
        let hops = relay_depth.max(1) - 1;
        let discount = finite_or_zero(c.hop_decay).clamp(0.0, 1.0).powi(hops.min(i32::MAX as u32) as i32);
        clamp_unit(raw * discount)
    }

    /// Belief after hearing the rumor again.
    pub fn reinforce(&self, existing: f64, fresh_estimate: f64) -> f64 {
        let existing = clamp_unit(existing);
        let boost = finite_or_zero(self.config.reinforcement_increment)
            + finite_or_zero(self.config.source_carryover) * clamp_unit(fresh_estimate);
        clamp_unit(existing + boost.max(0.0).min(1.0 - existing))
    }

    /// Initial or reinforced belief, depending on `input.existing`.
    pub fn compute(&self, input: &BelievabilityInput) -> f64 {
        let fresh = self.initial(
            input.truth_value,
            input.relay_depth,
            input.relationship,
            input.receiver_bias,
        );
        match input.existing {
            Some(existing) => self.reinforce(existing, fresh),
            None => fresh,
        }
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Clamps to [0, 1]; NaN and infinities become 0.
pub fn clamp_unit(value: f64) -> f64 {
    finite_or_zero(value).clamp(0.0, 1.0)
}
