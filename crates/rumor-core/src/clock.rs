//! Simulation clock.
//!
//! The engine never reads wall time; it asks an injected [`Clock`]. The
//! simulation loop owns a [`TickClock`] and advances it, while the engine
//! holds a clone reading the same counter.

use rumor_events::SimTimestamp;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Source of the current simulation time.
pub trait Clock: Send + Sync {
    fn now(&self) -> SimTimestamp;
}

/// Shared tick counter. Clones observe the same time.
#[derive(Debug, Clone, Default)]
pub struct TickClock {
    tick: Arc<AtomicU64>,
}

impl TickClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(tick: u64) -> Self {
        Self {
            tick: Arc::new(AtomicU64::new(tick)),
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick.load(Ordering::SeqCst)
    }

    /// Moves time forward and returns the new tick.
    pub fn advance(&self, ticks: u64) -> u64 {
        self.tick.fetch_add(ticks, Ordering::SeqCst) + ticks
    }

    pub fn set(&self, tick: u64) {
        self.tick.store(tick, Ordering::SeqCst);
    }
}

impl Clock for TickClock {
    fn now(&self) -> SimTimestamp {
        SimTimestamp::at(self.tick())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_time() {
        let clock = TickClock::new();
        let engine_view = clock.clone();

        assert_eq!(engine_view.now(), SimTimestamp::start());
        assert_eq!(clock.advance(250), 250);
        assert_eq!(engine_view.now().tick, 250);

        clock.set(10);
        assert_eq!(engine_view.tick(), 10);
    }

    #[test]
    fn test_starting_at() {
        let clock = TickClock::starting_at(3_000);
        assert_eq!(clock.now().date.to_string(), "year_1.summer.day_1");
    }
}
