//! Decay Scheduler
//!
//! Belief fades with time. Each tick every spread record loses
//! `decay_rate · delta` believability (never below zero). Afterwards a rumor
//! that has been passed on at least once, and whose strongest remaining
//! belief is at or below the forgetting threshold, is removed from the store.
//! Rumors nobody has heard yet are never pruned here.

use rumor_events::Severity;
use tracing::debug;

use crate::config::DecayConfig;
use crate::store::RumorStore;

/// Slack for float drift when comparing against the forgetting threshold.
pub const FORGET_EPSILON: f64 = 1e-9;

/// Outcome of one decay pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecayReport {
    /// Spread records whose believability went down
    pub decayed_spreads: usize,
    /// Rumors removed by this pass, by id
    pub forgotten: Vec<String>,
}

/// Decay multiplier per severity. Trivial gossip fades fastest.
pub fn severity_decay_multiplier(severity: Severity) -> f64 {
    match severity {
        Severity::Trivial => 1.5,
        Severity::Minor => 1.2,
        Severity::Moderate => 1.0,
        Severity::Major => 0.8,
        Severity::Critical => 0.6,
    }
}

/// Applies decay and prunes forgotten rumors.
#[derive(Debug, Clone)]
pub struct DecayScheduler {
    decay_rate: f64,
    forget_threshold: f64,
    severity_weighted: bool,
}

impl Default for DecayScheduler {
    fn default() -> Self {
        Self::from_config(&DecayConfig::default())
    }
}

impl DecayScheduler {
    pub fn new(decay_rate: f64, forget_threshold: f64) -> Self {
        Self {
            decay_rate: if decay_rate.is_finite() { decay_rate.max(0.0) } else { 0.0 },
            forget_threshold: if forget_threshold.is_finite() {
                forget_threshold.clamp(0.0, 1.0)
            } else {
                0.0
            },
            severity_weighted: false,
        }
    }

    pub fn from_config(config: &DecayConfig) -> Self {
        let mut scheduler = Self::new(config.decay_rate, config.forget_threshold);
        scheduler.severity_weighted = config.severity_weighted;
        scheduler
    }

    pub fn with_severity_weighting(mut self, enabled: bool) -> Self {
        self.severity_weighted = enabled;
        self
    }

    pub fn decay_rate(&self) -> f64 {
        self.decay_rate
    }

    pub fn forget_threshold(&self) -> f64 {
        self.forget_threshold
    }

    /// True if belief this low counts as forgotten.
    pub fn is_forgotten(&self, believability: f64) -> bool {
        believability <= self.forget_threshold + FORGET_EPSILON
    }

    /// Runs one decay pass over `delta` units of elapsed time.
    ///
    /// Negative or non-finite `delta` decays nothing but still prunes.
    pub fn tick(&self, store: &mut RumorStore, delta: f64) -> DecayReport {
        let delta = if delta.is_finite() { delta.max(0.0) } else { 0.0 };
        let mut report = DecayReport::default();

        let base_loss = self.decay_rate * delta;
        if base_loss > 0.0 {
            let multipliers: Vec<(String, f64)> = if self.severity_weighted {
                store
                    .query_active()
                    .iter()
                    .map(|r| (r.id.clone(), severity_decay_multiplier(r.severity)))
                    .collect()
            } else {
                Vec::new()
            };

            for (rumor_id, spread) in store.all_spreads_mut() {
                let multiplier = multipliers
                    .iter()
                    .find(|(id, _)| id == rumor_id)
                    .map_or(1.0, |(_, m)| *m);
                let before = spread.believability;
                spread.believability = (before - base_loss * multiplier).max(0.0);
                if spread.believability < before {
                    report.decayed_spreads += 1;
                }
            }
        }

        let forgotten: Vec<String> = store
            .query_active()
            .iter()
            .filter(|r| store.spread_count(&r.id) > 0)
            .filter(|r| {
                store
                    .max_believability(&r.id)
                    .map_or(false, |max| self.is_forgotten(max))
            })
            .map(|r| r.id.clone())
            .collect();

        for rumor_id in forgotten {
            if store.remove_rumor(&rumor_id).is_ok() {
                report.forgotten.push(rumor_id);
            }
        }

        debug!(
            delta,
            decayed = report.decayed_spreads,
            forgotten = report.forgotten.len(),
            "decay pass"
        );
        report
    }
}

/// Decides when the next coarse decay pass is due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickCadence {
    last_run_tick: u64,
    interval_ticks: u64,
}

impl TickCadence {
    pub fn new(interval_ticks: u64) -> Self {
        Self {
            last_run_tick: 0,
            interval_ticks: interval_ticks.max(1),
        }
    }

    pub fn interval(&self) -> u64 {
        self.interval_ticks
    }

    /// Check if a full interval has passed since the last run
    pub fn should_run(&self, current_tick: u64) -> bool {
        current_tick >= self.last_run_tick + self.interval_ticks
    }

    /// Ticks since the last run
    pub fn elapsed(&self, current_tick: u64) -> u64 {
        current_tick.saturating_sub(self.last_run_tick)
    }

    /// Mark that a pass has been applied
    pub fn mark_run(&mut self, tick: u64) {
        self.last_run_tick = tick;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewRumor;
    use rumor_events::{SimTimestamp, Spread};

    fn store_with_listener(believability: f64, severity: Severity) -> RumorStore {
        let mut store = RumorStore::new();
        let new = NewRumor::new("agent_0001", "Bandits on the road", ["danger"], severity, 0.7);
        store.create_rumor(new, SimTimestamp::start()).unwrap();
        store
            .upsert_spread(
                "rumor_00000001",
                Spread {
                    entity_id: "agent_0002".into(),
                    variant_id: "variant_00000001".into(),
                    heard_from_entity_id: Some("agent_0001".into()),
                    believability,
                    heard_at: SimTimestamp::start(),
                    last_reinforced_at: SimTimestamp::start(),
                },
            )
            .unwrap();
        store
    }

    #[test]
    fn test_decay_reduces_and_floors() {
        let mut store = store_with_listener(0.5, Severity::Moderate);
        let scheduler = DecayScheduler::new(0.05, 0.01);

        let report = scheduler.tick(&mut store, 2.0);
        assert_eq!(report.decayed_spreads, 1);
        let b = store.spread("rumor_00000001", "agent_0002").unwrap().believability;
        assert!((b - 0.4).abs() < 1e-12);

        let report = scheduler.tick(&mut store, 100.0);
        assert_eq!(report.forgotten, vec!["rumor_00000001".to_string()]);
        assert!(store.is_empty());
    }

    #[test]
    fn test_unspread_rumor_survives() {
        let mut store = RumorStore::new();
        let new = NewRumor::new("agent_0001", "Quiet rumor", ["gossip"], Severity::Trivial, 0.1);
        store.create_rumor(new, SimTimestamp::start()).unwrap();
        let scheduler = DecayScheduler::new(0.05, 0.01);

        for _ in 0..1_000 {
            let report = scheduler.tick(&mut store, 10.0);
            assert!(report.forgotten.is_empty());
        }
        assert!(store.contains("rumor_00000001"));
    }

    #[test]
    fn test_threshold_tolerates_float_drift() {
        let mut store = store_with_listener(0.06, Severity::Moderate);
        let scheduler = DecayScheduler::new(0.05, 0.01);

        // 0.06 - 0.05 lands a hair under or over 0.01 in binary
        let report = scheduler.tick(&mut store, 1.0);
        assert_eq!(report.forgotten, vec!["rumor_00000001".to_string()]);
    }

    #[test]
    fn test_severity_weighting() {
        let scheduler = DecayScheduler::new(0.1, 0.0).with_severity_weighting(true);

        let mut trivial = store_with_listener(0.9, Severity::Trivial);
        scheduler.tick(&mut trivial, 1.0);
        let b = trivial.spread("rumor_00000001", "agent_0002").unwrap().believability;
        assert!((b - 0.75).abs() < 1e-12);

        let mut critical = store_with_listener(0.9, Severity::Critical);
        scheduler.tick(&mut critical, 1.0);
        let b = critical.spread("rumor_00000001", "agent_0002").unwrap().believability;
        assert!((b - 0.84).abs() < 1e-12);
    }

    #[test]
    fn test_negative_delta_does_not_restore() {
        let mut store = store_with_listener(0.5, Severity::Moderate);
        let scheduler = DecayScheduler::new(0.05, 0.01);
        let report = scheduler.tick(&mut store, -3.0);
        assert_eq!(report.decayed_spreads, 0);
        assert_eq!(store.spread("rumor_00000001", "agent_0002").unwrap().believability, 0.5);
    }

    #[test]
    fn test_tick_cadence() {
        let mut cadence = TickCadence::new(100);
        assert!(!cadence.should_run(99));
        assert!(cadence.should_run(100));
        assert_eq!(cadence.elapsed(150), 150);

        cadence.mark_run(150);
        assert!(!cadence.should_run(249));
        assert!(cadence.should_run(250));
        assert_eq!(cadence.elapsed(250), 100);
    }
}
