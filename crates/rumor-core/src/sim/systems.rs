//! Simulation Systems
//!
//! Per-tick ECS systems. Agents are always visited in id order so a seed
//! fully determines a run.

use bevy_ecs::prelude::*;
use rand::Rng;
use rumor_events::TICKS_PER_DAY;
use tracing::{debug, warn};

use crate::components::{AgentId, Faction, Position, Temperament};
use crate::engine::{Interaction, SpreadOutcome, SpreadRequest};
use crate::propagation::Endpoint;

use super::{DecayCadence, EventLog, RumorWorld, SimRng, SimSettings, SimStats, SimulationState};

/// Relationship between agents of the same faction
pub const KIN_RELATIONSHIP: f64 = 0.3;
/// Relationship between agents of different factions
pub const STRANGER_RELATIONSHIP: f64 = -0.2;

/// System: random walk
pub fn wander(
    settings: Res<SimSettings>,
    mut rng: ResMut<SimRng>,
    mut query: Query<(&AgentId, &mut Position)>,
) {
    let step = settings.0.move_step;
    if !(step > 0.0 && step.is_finite()) {
        return;
    }
    let size = settings.0.world_size;

    let mut agents: Vec<_> = query.iter_mut().collect();
    agents.sort_by(|a, b| a.0.cmp(b.0));
    for (_, mut position) in agents {
        let dx = rng.0.gen_range(-step..=step);
        let dy = rng.0.gen_range(-step..=step);
        let next = position.offset_within(dx, dy, size);
        *position = next;
    }
}

struct Neighbour<'a> {
    id: &'a AgentId,
    position: Position,
    credulity: f64,
    faction: &'a Faction,
}

impl Neighbour<'_> {
    fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.position).in_faction(self.faction.as_str())
    }
}

fn nearest<'a, 'w>(agents: &'a [Neighbour<'w>], teller: &Neighbour<'_>) -> Option<&'a Neighbour<'w>> {
    agents
        .iter()
        .filter(|other| other.id != teller.id)
        .min_by(|a, b| {
            teller
                .position
                .distance_to(&a.position)
                .total_cmp(&teller.position.distance_to(&b.position))
                .then_with(|| a.id.cmp(b.id))
        })
}

/// System: each agent may tell its nearest neighbour the rumor it believes most
pub fn share_rumors(
    settings: Res<SimSettings>,
    mut engine: ResMut<RumorWorld>,
    mut rng: ResMut<SimRng>,
    mut stats: ResMut<SimStats>,
    query: Query<(&AgentId, &Position, &Temperament, &Faction)>,
) {
    let mut agents: Vec<Neighbour> = query
        .iter()
        .map(|(id, position, temperament, faction)| Neighbour {
            id,
            position: *position,
            credulity: temperament.credulity,
            faction,
        })
        .collect();
    agents.sort_by(|a, b| a.id.cmp(b.id));

    let mut batch = Vec::new();
    for teller in &agents {
        if rng.0.gen::<f64>() >= settings.0.interaction_chance {
            continue;
        }
        let Some(listener) = nearest(&agents, teller) else {
            continue;
        };
        let Some(top) = engine.0.get_rumors_for_agent(teller.id.as_str()).into_iter().next() else {
            continue;
        };

        let relationship = if teller.faction == listener.faction {
            KIN_RELATIONSHIP
        } else {
            STRANGER_RELATIONSHIP
        };
        let request = SpreadRequest::new(top.rumor_id, teller.id.as_str(), listener.id.as_str())
            .with_relationship(relationship)
            .with_receiver_bias(listener.credulity);
        batch.push(Interaction::new(request, teller.endpoint(), listener.endpoint()));
    }
    if batch.is_empty() {
        return;
    }

    for result in engine.0.process_interactions(batch, &mut rng.0) {
        stats.interactions += 1;
        match result.outcome {
            Ok(SpreadOutcome::Delivered { mutated, .. }) => {
                stats.delivered += 1;
                if mutated {
                    stats.mutated += 1;
                }
            }
            Ok(SpreadOutcome::OutOfRange { .. }) => stats.out_of_range += 1,
            Ok(SpreadOutcome::Blocked { .. }) => stats.blocked += 1,
            Ok(SpreadOutcome::SourceUnaware) => {}
            Err(e) => {
                stats.failed += 1;
                warn!(error = %e, "interaction failed");
            }
        }
    }
}

/// System: decay belief once per cadence interval
pub fn decay_rumors(
    state: Res<SimulationState>,
    mut cadence: ResMut<DecayCadence>,
    mut engine: ResMut<RumorWorld>,
    mut stats: ResMut<SimStats>,
) {
    let tick = state.current_tick;
    if !cadence.0.should_run(tick) {
        return;
    }

    // Decay rates are per day
    let delta = cadence.0.elapsed(tick) as f64 / TICKS_PER_DAY as f64;
    let report = engine.0.tick(delta);
    stats.forgotten += report.forgotten.len() as u64;
    debug!(tick, delta, forgotten = report.forgotten.len(), "scheduled decay");

    cadence.0.mark_run(tick);
}

/// System: move this tick's events into the JSONL log
pub fn flush_events(mut engine: ResMut<RumorWorld>, mut log: ResMut<EventLog>, mut stats: ResMut<SimStats>) {
    let events = engine.0.drain_events();
    if events.is_empty() {
        return;
    }
    stats.events += events.len() as u64;
    if let Err(e) = log.0.log_batch(&events) {
        warn!(error = %e, "could not write events");
    }
}
