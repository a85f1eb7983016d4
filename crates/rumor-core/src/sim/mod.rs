//! Demo Simulation
//!
//! A small ECS world of wandering agents trading rumors through the engine.
//! The engine lives in a resource; systems run in a fixed chain every tick:
//! wander, share, decay, flush.

pub mod setup;
pub mod systems;

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::info;

use crate::clock::TickClock;
use crate::config::{RumorConfig, SimulationConfig};
use crate::decay::TickCadence;
use crate::engine::RumorEngine;
use crate::error::{RumorError, RumorResult};
use crate::events::EventLogger;

pub use setup::{faction_summary, seed_rumors, spawn_agents, SeedRumor, SEED_RUMORS};
pub use systems::{decay_rumors, flush_events, share_rumors, wander};

/// The rumor engine as an ECS resource
#[derive(Resource)]
pub struct RumorWorld(pub RumorEngine);

/// Seeded random number generator resource
#[derive(Resource)]
pub struct SimRng(pub SmallRng);

/// Clock shared with the engine
#[derive(Resource, Clone)]
pub struct WorldClock(pub TickClock);

#[derive(Resource)]
pub struct DecayCadence(pub TickCadence);

#[derive(Resource)]
pub struct EventLog(pub EventLogger);

#[derive(Resource, Clone)]
pub struct SimSettings(pub SimulationConfig);

/// Global simulation state resource
#[derive(Resource, Debug, Default)]
pub struct SimulationState {
    pub current_tick: u64,
}

/// Running totals for the summary
#[derive(Resource, Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SimStats {
    pub interactions: u64,
    pub delivered: u64,
    pub mutated: u64,
    pub out_of_range: u64,
    pub blocked: u64,
    pub failed: u64,
    pub forgotten: u64,
    pub events: u64,
}

/// Owns the ECS world and its schedule.
pub struct Simulation {
    world: World,
    schedule: Schedule,
    clock: TickClock,
}

impl Simulation {
    /// Build a world, spawn agents, and seed the opening rumors.
    pub fn new(config: RumorConfig, seed: u64, logger: EventLogger) -> RumorResult<Self> {
        config
            .validate()
            .map_err(|e| RumorError::Validation(e.to_string()))?;
        let clock = TickClock::new();
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut world = World::new();

        let agents = spawn_agents(&mut world, &mut rng, &config.simulation);
        let mut engine = RumorEngine::new(config.clone(), clock.clone());
        let seeded = seed_rumors(&mut engine, &agents, &mut rng, config.simulation.seed_rumors)?;
        info!(agents = agents.len(), rumors = seeded.len(), seed, "simulation initialized");

        world.insert_resource(RumorWorld(engine));
        world.insert_resource(SimRng(rng));
        world.insert_resource(WorldClock(clock.clone()));
        world.insert_resource(DecayCadence(TickCadence::new(config.decay.interval_ticks)));
        world.insert_resource(EventLog(logger));
        world.insert_resource(SimSettings(config.simulation));
        world.insert_resource(SimulationState::default());
        world.insert_resource(SimStats::default());

        let mut schedule = Schedule::default();
        schedule.add_systems((wander, share_rumors, decay_rumors, flush_events).chain());

        Ok(Self {
            world,
            schedule,
            clock,
        })
    }

    /// Advance one tick and run every system.
    pub fn step(&mut self) {
        let tick = self.clock.advance(1);
        self.world.resource_mut::<SimulationState>().current_tick = tick;
        self.schedule.run(&mut self.world);
    }

    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    pub fn current_tick(&self) -> u64 {
        self.clock.tick()
    }

    pub fn engine(&self) -> &RumorEngine {
        &self.world.resource::<RumorWorld>().0
    }

    pub fn stats(&self) -> &SimStats {
        self.world.resource::<SimStats>()
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Flush the event log.
    pub fn finish(&mut self) -> std::io::Result<()> {
        self.world.resource_mut::<EventLog>().0.flush()
    }
}
