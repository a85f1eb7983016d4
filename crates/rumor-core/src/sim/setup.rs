//! Simulation Setup
//!
//! Spawns agents with randomized disposition and seeds the opening rumors.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;
use rand::Rng;
use rumor_events::Severity;
use std::collections::BTreeMap;

use crate::components::{AgentId, Faction, Position, Temperament, FACTION_NAMES};
use crate::config::SimulationConfig;
use crate::engine::RumorEngine;
use crate::error::RumorResult;
use crate::store::NewRumor;

/// A rumor someone starts telling on day one.
pub struct SeedRumor {
    pub content: &'static str,
    pub categories: &'static [&'static str],
    pub severity: Severity,
    pub truth_value: f64,
}

/// Opening rumors, used in order
pub const SEED_RUMORS: &[SeedRumor] = &[
    SeedRumor {
        content: "Bandits are waiting on the north road",
        categories: &["danger"],
        severity: Severity::Moderate,
        truth_value: 0.7,
    },
    SeedRumor {
        content: "The miller is hoarding grain for winter",
        categories: &["scandal", "economy"],
        severity: Severity::Minor,
        truth_value: 0.4,
    },
    SeedRumor {
        content: "The duke plans to raise the harvest tax",
        categories: &["political"],
        severity: Severity::Major,
        truth_value: 0.6,
    },
    SeedRumor {
        content: "The garrison captain meets smugglers at the old mill",
        categories: &["secret", "political"],
        severity: Severity::Major,
        truth_value: 0.5,
    },
    SeedRumor {
        content: "A wolf pack was seen near the east well",
        categories: &["danger"],
        severity: Severity::Minor,
        truth_value: 0.8,
    },
    SeedRumor {
        content: "The healer's tonic cures a fever overnight",
        categories: &["gossip"],
        severity: Severity::Trivial,
        truth_value: 0.3,
    },
];

/// Random credulity in [-1, 1], clustered around zero
fn generate_credulity(rng: &mut SmallRng) -> f64 {
    let a: f64 = rng.gen();
    let b: f64 = rng.gen();
    (a + b) - 1.0
}

/// Spawn `config.agent_count` agents at random positions.
///
/// Factions are handed out round-robin. Returns ids in spawn order.
pub fn spawn_agents(world: &mut World, rng: &mut SmallRng, config: &SimulationConfig) -> Vec<AgentId> {
    let faction_count = config.faction_count.clamp(1, FACTION_NAMES.len());
    let size = config.world_size.max(0.0);

    (1..=config.agent_count)
        .map(|n| {
            let id = AgentId::numbered(n);
            let position = Position::new(rng.gen::<f64>() * size, rng.gen::<f64>() * size);
            let temperament = Temperament::new(generate_credulity(rng));
            let faction = Faction(FACTION_NAMES[(n - 1) % faction_count].to_string());
            world.spawn((id.clone(), position, temperament, faction));
            id
        })
        .collect()
}

/// Have random agents start the first `count` seed rumors.
pub fn seed_rumors(
    engine: &mut RumorEngine,
    agents: &[AgentId],
    rng: &mut SmallRng,
    count: usize,
) -> RumorResult<Vec<String>> {
    if agents.is_empty() {
        return Ok(Vec::new());
    }
    SEED_RUMORS
        .iter()
        .take(count)
        .map(|seed| {
            let originator = &agents[rng.gen_range(0..agents.len())];
            engine.create(NewRumor::new(
                originator.as_str(),
                seed.content,
                seed.categories.iter().copied(),
                seed.severity,
                seed.truth_value,
            ))
        })
        .collect()
}

/// Agent count per faction
pub fn faction_summary(world: &mut World) -> BTreeMap<String, usize> {
    let mut summary = BTreeMap::new();
    let mut query = world.query::<&Faction>();
    for faction in query.iter(world) {
        *summary.entry(faction.0.clone()).or_insert(0) += 1;
    }
    summary
}
