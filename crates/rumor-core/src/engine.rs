//! Rumor Engine
//!
//! Facade over the store and the lifecycle components. Every write goes
//! through `&mut RumorEngine`, so callers get a single serialized view of the
//! rumor world.
//!
//! A spread runs in a fixed order: staleness pre-check, optional mutation,
//! believability, upsert, event. Business non-events (out of range, blocked
//! by a rule, teller does not know the rumor, no merge) are returned as
//! values; errors are reserved for unknown ids, invariant violations, stale
//! updates, and malformed input.

use rand::Rng;
use rumor_events::{
    ForgetReason, RumorEventKind, RumorRecord, RumorEvent, Severity, SimTimestamp, Spread,
};
use serde::Serialize;
use serde_json::json;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::mpsc::Receiver;
use tracing::{debug, info, warn};

use crate::believability::{clamp_unit, BelievabilityInput, BelievabilityModel};
use crate::clock::Clock;
use crate::components::{Rumor, META_SEVERITY, META_TRUTH_VALUE};
use crate::config::RumorConfig;
use crate::decay::{DecayReport, DecayScheduler};
use crate::error::{RumorError, RumorResult};
use crate::events::EventQueue;
use crate::matcher::{MatchCandidate, MergeSide, SimilarityMatcher};
use crate::mutation::MutationEngine;
use crate::propagation::{Endpoint, GateDecision, PropagationGate, ReachabilityRule};
use crate::store::{NewRumor, NewVariant, RumorStore, UpsertResult};

/// One agent telling another about a rumor.
#[derive(Debug, Clone, PartialEq)]
pub struct SpreadRequest {
    pub rumor_id: String,
    pub from_agent_id: String,
    pub to_agent_id: String,
    /// Listener's trust in the teller, in [-1, 1]
    pub relationship: f64,
    /// Listener's credulity, in [-1, 1]
    pub receiver_bias: f64,
    /// Overrides the configured mutation probability
    pub mutation_probability: Option<f64>,
}

impl SpreadRequest {
    pub fn new(
        rumor_id: impl Into<String>,
        from_agent_id: impl Into<String>,
        to_agent_id: impl Into<String>,
    ) -> Self {
        Self {
            rumor_id: rumor_id.into(),
            from_agent_id: from_agent_id.into(),
            to_agent_id: to_agent_id.into(),
            relationship: 0.0,
            receiver_bias: 0.0,
            mutation_probability: None,
        }
    }

    pub fn with_relationship(mut self, relationship: f64) -> Self {
        self.relationship = relationship;
        self
    }

    pub fn with_receiver_bias(mut self, receiver_bias: f64) -> Self {
        self.receiver_bias = receiver_bias;
        self
    }

    pub fn with_mutation_probability(mut self, probability: f64) -> Self {
        self.mutation_probability = Some(probability);
        self
    }
}

/// What happened to a spread attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SpreadOutcome {
    /// The listener now holds `variant_id` with this belief
    Delivered {
        variant_id: String,
        believability: f64,
        reinforced: bool,
        mutated: bool,
    },
    OutOfRange { distance: f64, radius: f64 },
    Blocked { rule: String },
    /// The would-be teller has never heard the rumor
    SourceUnaware,
}

impl SpreadOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, SpreadOutcome::Delivered { .. })
    }
}

/// A spread request together with where both agents stand.
#[derive(Debug, Clone, PartialEq)]
pub struct Interaction {
    pub request: SpreadRequest,
    pub from: Endpoint,
    pub to: Endpoint,
}

impl Interaction {
    pub fn new(request: SpreadRequest, from: impl Into<Endpoint>, to: impl Into<Endpoint>) -> Self {
        Self {
            request,
            from: from.into(),
            to: to.into(),
        }
    }

    fn order_key(&self) -> (&str, &str, &str) {
        (
            &self.request.from_agent_id,
            &self.request.rumor_id,
            &self.request.to_agent_id,
        )
    }
}

/// Result of one interaction in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionResult {
    pub interaction: Interaction,
    pub outcome: RumorResult<SpreadOutcome>,
}

/// A rumor as one agent knows it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RumorSummary {
    pub rumor_id: String,
    pub variant_id: String,
    /// Wording the agent holds
    pub content: String,
    pub categories: BTreeSet<String>,
    pub severity: Severity,
    pub truth_value: f64,
    pub believability: f64,
    pub heard_from_entity_id: Option<String>,
    pub heard_at: SimTimestamp,
    pub last_reinforced_at: SimTimestamp,
}

/// Filters for [`RumorEngine::query_for_agent`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AgentRumorQuery {
    pub agent_id: String,
    pub min_believability: f64,
    /// Keep rumors carrying any of these; empty keeps all
    pub categories: BTreeSet<String>,
    pub limit: Option<usize>,
}

impl AgentRumorQuery {
    pub fn for_agent(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            ..Default::default()
        }
    }
}

/// Filters for [`RumorEngine::query_rumors`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RumorQuery {
    /// Case-insensitive substring of any wording
    pub text: Option<String>,
    /// Keep rumors carrying any of these; empty keeps all
    pub categories: BTreeSet<String>,
    pub min_severity: Option<Severity>,
    pub min_truth: Option<f64>,
    /// Only rumors this agent has heard
    pub known_by: Option<String>,
    pub limit: Option<usize>,
}

/// Aggregate numbers over the live store.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RumorStatistics {
    pub total_rumors: usize,
    pub total_variants: usize,
    /// Spread records produced by propagation
    pub total_spreads: usize,
    /// All spread records, originators included
    pub total_listeners: usize,
    pub active_rumors: usize,
    pub category_distribution: BTreeMap<String, usize>,
    pub severity_distribution: BTreeMap<String, usize>,
    pub average_truth_value: f64,
    pub average_believability: f64,
    pub average_spread_count: f64,
}

/// Result of a successful merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub surviving_rumor_id: String,
    pub absorbed_rumor_id: String,
    /// Variant under the survivor's root holding the absorbed wording
    pub merged_variant_id: String,
    pub similarity: f64,
    /// Listeners carried over from the absorbed rumor
    pub folded_listeners: usize,
}

/// A merge candidate for new content.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarRumor {
    pub rumor_id: String,
    pub similarity: f64,
}

/// The rumor lifecycle engine.
pub struct RumorEngine {
    config: RumorConfig,
    store: RumorStore,
    matcher: SimilarityMatcher,
    mutation: MutationEngine,
    gate: PropagationGate,
    believability: BelievabilityModel,
    decay: DecayScheduler,
    events: EventQueue,
    clock: Box<dyn Clock>,
}

impl RumorEngine {
    pub fn new(config: RumorConfig, clock: impl Clock + 'static) -> Self {
        Self {
            store: RumorStore::new(),
            matcher: SimilarityMatcher::from_config(&config.matching),
            mutation: MutationEngine::from_config(&config.mutation),
            gate: PropagationGate::from_config(&config.propagation),
            believability: BelievabilityModel::new(config.believability.clone()),
            decay: DecayScheduler::from_config(&config.decay),
            events: EventQueue::new(),
            clock: Box::new(clock),
            config,
        }
    }

    pub fn with_defaults(clock: impl Clock + 'static) -> Self {
        Self::new(RumorConfig::default(), clock)
    }

    /// Registers an extra rule on the propagation gate.
    pub fn add_reachability_rule(&mut self, rule: impl ReachabilityRule + 'static) {
        self.gate.add_rule(rule);
    }

    pub fn config(&self) -> &RumorConfig {
        &self.config
    }

    pub fn store(&self) -> &RumorStore {
        &self.store
    }

    pub fn gate(&self) -> &PropagationGate {
        &self.gate
    }

    pub fn matcher(&self) -> &SimilarityMatcher {
        &self.matcher
    }

    pub fn now(&self) -> SimTimestamp {
        self.clock.now()
    }

    /// Takes every event published since the last drain.
    pub fn drain_events(&mut self) -> Vec<RumorEvent> {
        self.events.drain()
    }

    pub fn pending_events(&self) -> &[RumorEvent] {
        self.events.pending()
    }

    /// Channel receiving every event published from now on.
    pub fn subscribe(&mut self) -> Receiver<RumorEvent> {
        self.events.subscribe()
    }

    fn publish(&mut self, kind: RumorEventKind) {
        let now = self.now();
        self.events.publish(now, kind);
    }

    /// Creates a rumor; the originator believes it fully.
    pub fn create_rumor<I, S>(
        &mut self,
        originator_id: &str,
        content: &str,
        categories: I,
        severity: Severity,
        truth_value: f64,
    ) -> RumorResult<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.create(NewRumor::new(originator_id, content, categories, severity, truth_value))
    }

    /// Like [`create_rumor`](Self::create_rumor) with every field available,
    /// including a radius override.
    pub fn create(&mut self, new: NewRumor) -> RumorResult<String> {
        let now = self.now();
        let rumor = self.store.create_rumor(new, now)?;
        let rumor_id = rumor.id.clone();
        let originator_id = rumor.originator_id.clone();
        let root_id = rumor
            .root_variant()
            .map(|v| v.id.clone())
            .ok_or_else(|| RumorError::InvariantViolation(format!("{} has no root", rumor_id)))?;

        self.store.upsert_spread(
            &rumor_id,
            Spread {
                entity_id: originator_id.clone(),
                variant_id: root_id,
                heard_from_entity_id: None,
                believability: 1.0,
                heard_at: now,
                last_reinforced_at: now,
            },
        )?;

        self.publish(RumorEventKind::RumorCreated {
            rumor_id: rumor_id.clone(),
            originator_id,
        });
        Ok(rumor_id)
    }

    /// Belief `listener_id` would end up with if `source_id` told them now.
    pub fn compute_believability(
        &self,
        rumor_id: &str,
        listener_id: &str,
        source_id: &str,
        relationship: f64,
        receiver_bias: f64,
    ) -> RumorResult<f64> {
        let rumor = self.store.rumor(rumor_id)?;
        let source = self.store.spread(rumor_id, source_id);
        let truth_value = source.map_or(rumor.truth_value, |s| rumor.variant_truth(&s.variant_id));
        let relay_depth = self
            .store
            .relay_depth(rumor_id, source_id)
            .map_or(1, |d| d + 1);

        Ok(self.believability.compute(&BelievabilityInput {
            truth_value,
            relay_depth,
            relationship,
            receiver_bias,
            existing: self.store.spread(rumor_id, listener_id).map(|s| s.believability),
        }))
    }

    /// Passes a rumor from one agent to another without a distance check.
    pub fn spread_rumor<R: Rng + ?Sized>(
        &mut self,
        request: &SpreadRequest,
        rng: &mut R,
    ) -> RumorResult<SpreadOutcome> {
        let rumor_id = request.rumor_id.as_str();
        let from = request.from_agent_id.as_str();
        let to = request.to_agent_id.as_str();

        let rumor = match self.store.rumor(rumor_id) {
            Ok(rumor) => rumor,
            Err(err) => {
                warn!(rumor_id, "spread of unknown rumor");
                return Err(err);
            }
        };
        if from == to {
            return Err(RumorError::Validation(format!(
                "agent {} cannot tell a rumor to itself",
                from
            )));
        }
        let Some(source) = self.store.spread(rumor_id, from) else {
            debug!(rumor_id, from, to, "teller does not know the rumor");
            return Ok(SpreadOutcome::SourceUnaware);
        };

        let now = self.now();
        if let Err(err) = self.store.check_fresh(rumor_id, to, now) {
            warn!(rumor_id, agent_id = to, "stale spread rejected");
            return Err(err);
        }

        let parent = rumor
            .variant(&source.variant_id)
            .cloned()
            .ok_or_else(|| RumorError::variant_not_found(&source.variant_id))?;
        let parent_truth = rumor.variant_truth(&parent.id);
        let parent_severity = rumor.variant_severity(&parent.id);
        let source_depth = self.store.relay_depth(rumor_id, from).unwrap_or(0);
        let probability = request
            .mutation_probability
            .unwrap_or(self.config.mutation.default_probability);

        // Mutation
        let (variant_id, truth_value, mutated) =
            match self
                .mutation
                .mutate(&parent, parent_truth, parent_severity, probability, rng)
            {
                Some(mutation) => {
                    let truth_value = mutation.truth_value;
                    let variant = self.store.append_variant(
                        rumor_id,
                        NewVariant {
                            parent_variant_id: Some(parent.id.clone()),
                            content: mutation.content,
                            entity_id: from.to_string(),
                            mutation_metadata: mutation.metadata,
                        },
                        now,
                    )?;
                    let variant_id = variant.id.clone();
                    let rumor = self.store.rumor_mut(rumor_id)?;
                    rumor.truth_value = clamp_unit(rumor.truth_value + mutation.truth_delta);
                    debug!(
                        rumor_id,
                        variant_id = %variant_id,
                        embellishment = mutation.embellishment.as_str(),
                        truth_value = rumor.truth_value,
                        "rumor mutated"
                    );
                    self.publish(RumorEventKind::RumorMutated {
                        rumor_id: rumor_id.to_string(),
                        variant_id: variant_id.clone(),
                        parent_variant_id: parent.id.clone(),
                    });
                    (variant_id, truth_value, true)
                }
                None => (parent.id.clone(), parent_truth, false),
            };

        // Believability
        let believability = self.believability.compute(&BelievabilityInput {
            truth_value,
            relay_depth: source_depth + 1,
            relationship: request.relationship,
            receiver_bias: request.receiver_bias,
            existing: self.store.spread(rumor_id, to).map(|s| s.believability),
        });

        // Upsert
        let upsert = self.store.upsert_spread(
            rumor_id,
            Spread {
                entity_id: to.to_string(),
                variant_id: variant_id.clone(),
                heard_from_entity_id: Some(from.to_string()),
                believability,
                heard_at: now,
                last_reinforced_at: now,
            },
        )?;
        let reinforced = upsert == UpsertResult::Reinforced;

        debug!(rumor_id, from, to, believability, reinforced, mutated, "rumor spread");
        self.publish(RumorEventKind::RumorSpread {
            rumor_id: rumor_id.to_string(),
            variant_id: variant_id.clone(),
            from_agent_id: from.to_string(),
            to_agent_id: to.to_string(),
            believability,
            reinforced,
            mutated,
        });

        Ok(SpreadOutcome::Delivered {
            variant_id,
            believability,
            reinforced,
            mutated,
        })
    }

    /// Gate decision for passing `rumor_id` between two endpoints. Pure.
    pub fn gate_interaction(
        &self,
        rumor_id: &str,
        from: &Endpoint,
        to: &Endpoint,
    ) -> RumorResult<GateDecision> {
        let rumor = self.store.rumor(rumor_id)?;
        Ok(self.gate.evaluate(rumor, from, to))
    }

    /// Distance-gated spread. A refused exchange writes nothing and publishes
    /// nothing.
    pub fn try_share_rumor<R: Rng + ?Sized>(
        &mut self,
        request: &SpreadRequest,
        from: &Endpoint,
        to: &Endpoint,
        rng: &mut R,
    ) -> RumorResult<SpreadOutcome> {
        let decision = match self.gate_interaction(&request.rumor_id, from, to) {
            Ok(decision) => decision,
            Err(err) => {
                warn!(rumor_id = %request.rumor_id, "share of unknown rumor");
                return Err(err);
            }
        };
        self.apply_gated(request, decision, rng)
    }

    fn apply_gated<R: Rng + ?Sized>(
        &mut self,
        request: &SpreadRequest,
        decision: GateDecision,
        rng: &mut R,
    ) -> RumorResult<SpreadOutcome> {
        match decision {
            GateDecision::Allowed { .. } => self.spread_rumor(request, rng),
            GateDecision::OutOfRange { distance, radius } => {
                debug!(
                    rumor_id = %request.rumor_id,
                    from = %request.from_agent_id,
                    to = %request.to_agent_id,
                    distance,
                    radius,
                    "listener out of range"
                );
                Ok(SpreadOutcome::OutOfRange { distance, radius })
            }
            GateDecision::Blocked { rule } => {
                debug!(rumor_id = %request.rumor_id, rule = %rule, "exchange blocked");
                Ok(SpreadOutcome::Blocked { rule })
            }
        }
    }

    /// Applies a batch of interactions ordered by (teller, rumor, listener).
    ///
    /// Gate decisions for the whole batch are made before anything is
    /// written. Each interaction succeeds or fails on its own.
    pub fn process_interactions<R: Rng + ?Sized>(
        &mut self,
        mut batch: Vec<Interaction>,
        rng: &mut R,
    ) -> Vec<InteractionResult> {
        batch.sort_by(|a, b| a.order_key().cmp(&b.order_key()));

        let decisions: Vec<RumorResult<GateDecision>> = batch
            .iter()
            .map(|i| self.gate_interaction(&i.request.rumor_id, &i.from, &i.to))
            .collect();

        let results: Vec<InteractionResult> = batch
            .into_iter()
            .zip(decisions)
            .map(|(interaction, decision)| {
                let outcome =
                    decision.and_then(|d| self.apply_gated(&interaction.request, d, &mut *rng));
                InteractionResult {
                    interaction,
                    outcome,
                }
            })
            .collect();

        debug!(
            interactions = results.len(),
            delivered = results
                .iter()
                .filter(|r| matches!(&r.outcome, Ok(o) if o.is_delivered()))
                .count(),
            "interaction batch applied"
        );
        results
    }

    /// Everything an agent has heard, most believed first.
    pub fn get_rumors_for_agent(&self, agent_id: &str) -> Vec<RumorSummary> {
        self.query_for_agent(&AgentRumorQuery::for_agent(agent_id))
    }

    pub fn query_for_agent(&self, query: &AgentRumorQuery) -> Vec<RumorSummary> {
        let mut summaries: Vec<RumorSummary> = self
            .store
            .query_by_listener(&query.agent_id)
            .into_iter()
            .filter(|(_, spread)| spread.believability >= query.min_believability)
            .filter(|(rumor, _)| {
                query.categories.is_empty() || !rumor.categories.is_disjoint(&query.categories)
            })
            .map(|(rumor, spread)| summarize(rumor, spread))
            .collect();

        summaries.sort_by(|a, b| {
            b.believability
                .total_cmp(&a.believability)
                .then_with(|| a.rumor_id.cmp(&b.rumor_id))
        });
        if let Some(limit) = query.limit {
            summaries.truncate(limit);
        }
        summaries
    }

    /// Decays belief by `delta` time units and removes forgotten rumors.
    pub fn tick(&mut self, delta: f64) -> DecayReport {
        let report = self.decay.tick(&mut self.store, delta);
        for rumor_id in &report.forgotten {
            info!(rumor_id = %rumor_id, "rumor forgotten");
            self.publish(RumorEventKind::RumorForgotten {
                rumor_id: rumor_id.clone(),
                reason: ForgetReason::Decayed,
            });
        }
        report
    }

    /// Merges two rumors if the matcher says they are the same story.
    ///
    /// The earlier rumor survives with its own categories, records the union
    /// as related categories, takes the higher severity, and gains the
    /// absorbed wording as a variant under its root. Listeners of the
    /// absorbed rumor are folded in, keeping the higher belief.
    pub fn merge_rumors(&mut self, a_id: &str, b_id: &str) -> RumorResult<Option<MergeOutcome>> {
        if a_id == b_id {
            return Err(RumorError::Validation(format!("cannot merge {} with itself", a_id)));
        }
        let a = self.store.rumor(a_id)?;
        let b = self.store.rumor(b_id)?;
        let Some(decision) = self.matcher.decide(&a.as_candidate(), &b.as_candidate()) else {
            debug!(a = a_id, b = b_id, "rumors are distinct");
            return Ok(None);
        };

        let (survivor, absorbed) = match decision.primary {
            MergeSide::First => (a, b),
            MergeSide::Second => (b, a),
        };
        let survivor_id = survivor.id.clone();
        let absorbed_id = absorbed.id.clone();
        let root_id = survivor
            .root_variant()
            .map(|v| v.id.clone())
            .ok_or_else(|| RumorError::InvariantViolation(format!("{} has no root", survivor_id)))?;

        let mut metadata = BTreeMap::new();
        metadata.insert("embellishment".to_string(), json!("merged"));
        metadata.insert("detail".to_string(), json!(absorbed_id));
        metadata.insert("similarity".to_string(), json!(decision.similarity));
        metadata.insert(META_TRUTH_VALUE.to_string(), json!(absorbed.truth_value));
        metadata.insert(META_SEVERITY.to_string(), json!(absorbed.severity.to_string()));
        let merged_wording = NewVariant {
            parent_variant_id: Some(root_id),
            content: absorbed.original_content.clone(),
            entity_id: absorbed.originator_id.clone(),
            mutation_metadata: metadata,
        };
        let absorbed_severity = absorbed.severity;

        let now = self.now();
        let merged_variant_id = self
            .store
            .append_variant(&survivor_id, merged_wording, now)?
            .id
            .clone();
        let (_, absorbed_spreads) = self.store.remove_rumor(&absorbed_id)?;

        {
            let survivor = self.store.rumor_mut(&survivor_id)?;
            survivor
                .related_categories
                .extend(decision.supplementary_categories);
            survivor.severity = survivor.severity.max(absorbed_severity);
        }

        let folded_listeners = absorbed_spreads.len();
        for spread in absorbed_spreads {
            let held = self
                .store
                .spread(&survivor_id, &spread.entity_id)
                .map(|s| (s.believability, s.last_reinforced_at));
            match held {
                Some((held_belief, held_at)) => {
                    let record = self.store.spread_mut(&survivor_id, &spread.entity_id)?;
                    if spread.believability > held_belief {
                        record.believability = spread.believability;
                    }
                    // Latest exposure wins the timestamp and the wording
                    if spread.last_reinforced_at > held_at {
                        record.last_reinforced_at = spread.last_reinforced_at;
                        record.variant_id = merged_variant_id.clone();
                    }
                }
                None => {
                    self.store.upsert_spread(
                        &survivor_id,
                        Spread {
                            variant_id: merged_variant_id.clone(),
                            ..spread
                        },
                    )?;
                }
            }
        }

        info!(
            survivor = %survivor_id,
            absorbed = %absorbed_id,
            similarity = decision.similarity,
            "rumors merged"
        );
        self.publish(RumorEventKind::RumorMerged {
            surviving_rumor_id: survivor_id.clone(),
            absorbed_rumor_id: absorbed_id.clone(),
        });
        self.publish(RumorEventKind::RumorForgotten {
            rumor_id: absorbed_id.clone(),
            reason: ForgetReason::Merged,
        });

        Ok(Some(MergeOutcome {
            surviving_rumor_id: survivor_id,
            absorbed_rumor_id: absorbed_id,
            merged_variant_id,
            similarity: decision.similarity,
            folded_listeners,
        }))
    }

    /// Stored rumors new content would merge with, most similar first.
    pub fn find_similar(&self, content: &str, categories: &BTreeSet<String>) -> Vec<SimilarRumor> {
        let probe = MatchCandidate {
            id: "",
            content,
            categories,
            created_at: self.now(),
        };
        let mut similar: Vec<SimilarRumor> = self
            .store
            .query_active()
            .into_iter()
            .filter_map(|rumor| {
                self.matcher
                    .decide(&probe, &rumor.as_candidate())
                    .map(|d| SimilarRumor {
                        rumor_id: rumor.id.clone(),
                        similarity: d.similarity,
                    })
            })
            .collect();
        similar.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.rumor_id.cmp(&b.rumor_id))
        });
        similar
    }

    /// Administrative removal.
    pub fn delete_rumor(&mut self, rumor_id: &str) -> RumorResult<()> {
        if let Err(err) = self.store.remove_rumor(rumor_id) {
            warn!(rumor_id, "delete of unknown rumor");
            return Err(err);
        }
        info!(rumor_id, "rumor deleted");
        self.publish(RumorEventKind::RumorForgotten {
            rumor_id: rumor_id.to_string(),
            reason: ForgetReason::Deleted,
        });
        Ok(())
    }

    /// Shifts one listener's belief by `delta`, clamped to [0, 1].
    pub fn adjust_believability(&mut self, rumor_id: &str, agent_id: &str, delta: f64) -> RumorResult<f64> {
        if !delta.is_finite() {
            return Err(RumorError::Validation(format!(
                "believability delta must be finite, got {}",
                delta
            )));
        }
        let spread = self.store.spread_mut(rumor_id, agent_id)?;
        spread.believability = clamp_unit(spread.believability + delta);
        let updated = spread.believability;
        debug!(rumor_id, agent_id, believability = updated, "believability adjusted");
        Ok(updated)
    }

    /// Rumors matching every given filter, newest first.
    pub fn query_rumors(&self, query: &RumorQuery) -> Vec<&Rumor> {
        let mut rumors: Vec<&Rumor> = self
            .store
            .query_active()
            .into_iter()
            .filter(|r| query.text.as_deref().map_or(true, |t| r.mentions(t)))
            .filter(|r| query.categories.is_empty() || !r.categories.is_disjoint(&query.categories))
            .filter(|r| query.min_severity.map_or(true, |min| r.severity.is_at_least(min)))
            .filter(|r| query.min_truth.map_or(true, |min| r.truth_value >= min))
            .filter(|r| {
                query
                    .known_by
                    .as_deref()
                    .map_or(true, |agent| self.store.spread(&r.id, agent).is_some())
            })
            .collect();

        rumors.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        if let Some(limit) = query.limit {
            rumors.truncate(limit);
        }
        rumors
    }

    pub fn statistics(&self) -> RumorStatistics {
        let rumors = self.store.query_active();
        let mut stats = RumorStatistics {
            total_rumors: rumors.len(),
            ..Default::default()
        };
        if rumors.is_empty() {
            return stats;
        }

        let mut truth_sum = 0.0;
        let mut belief_sum = 0.0;
        for rumor in &rumors {
            stats.total_variants += rumor.variants().len();
            let spread_count = self.store.spread_count(&rumor.id);
            stats.total_spreads += spread_count;
            if spread_count > 0 {
                stats.active_rumors += 1;
            }
            for spread in self.store.spreads(&rumor.id) {
                stats.total_listeners += 1;
                belief_sum += spread.believability;
            }
            for category in &rumor.categories {
                *stats.category_distribution.entry(category.clone()).or_insert(0) += 1;
            }
            *stats
                .severity_distribution
                .entry(rumor.severity.to_string())
                .or_insert(0) += 1;
            truth_sum += rumor.truth_value;
        }

        stats.average_truth_value = truth_sum / rumors.len() as f64;
        stats.average_spread_count = stats.total_spreads as f64 / rumors.len() as f64;
        if stats.total_listeners > 0 {
            stats.average_believability = belief_sum / stats.total_listeners as f64;
        }
        stats
    }

    pub fn export_rumor(&self, rumor_id: &str) -> RumorResult<RumorRecord> {
        self.store.export_record(rumor_id)
    }

    /// Loads a wire record. No events are published for restored rumors.
    pub fn import_rumor(&mut self, record: RumorRecord) -> RumorResult<String> {
        match self.store.import_record(record) {
            Ok(id) => Ok(id),
            Err(err) => {
                warn!(error = %err, "rumor import rejected");
                Err(err)
            }
        }
    }
}

fn summarize(rumor: &Rumor, spread: &Spread) -> RumorSummary {
    let content = rumor
        .variant(&spread.variant_id)
        .map_or_else(|| rumor.original_content.clone(), |v| v.content.clone());
    RumorSummary {
        rumor_id: rumor.id.clone(),
        variant_id: spread.variant_id.clone(),
        content,
        categories: rumor.categories.clone(),
        severity: rumor.variant_severity(&spread.variant_id),
        truth_value: rumor.variant_truth(&spread.variant_id),
        believability: spread.believability,
        heard_from_entity_id: spread.heard_from_entity_id.clone(),
        heard_at: spread.heard_at,
        last_reinforced_at: spread.last_reinforced_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TickClock;
    use crate::components::{Position, RumorState};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn engine() -> (RumorEngine, TickClock) {
        let clock = TickClock::new();
        (RumorEngine::with_defaults(clock.clone()), clock)
    }

    fn bandits(engine: &mut RumorEngine) -> String {
        engine
            .create_rumor("agent_0001", "Bandits on the road", ["danger"], Severity::Moderate, 0.7)
            .unwrap()
    }

    fn no_mutation(rumor_id: &str, from: &str, to: &str) -> SpreadRequest {
        SpreadRequest::new(rumor_id, from, to).with_mutation_probability(0.0)
    }

    #[test]
    fn test_create_gives_originator_full_belief() {
        let (mut engine, _) = engine();
        let id = bandits(&mut engine);

        let held = engine.store().spread(&id, "agent_0001").unwrap();
        assert_eq!(held.believability, 1.0);
        assert!(held.heard_from_entity_id.is_none());
        assert_eq!(engine.store().spread_count(&id), 0);

        let events = engine.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind.name(), "rumor_created");
    }

    #[test]
    fn test_spread_from_originator() {
        let (mut engine, clock) = engine();
        let id = bandits(&mut engine);
        clock.advance(10);
        let mut rng = SmallRng::seed_from_u64(1);

        let outcome = engine
            .spread_rumor(&no_mutation(&id, "agent_0001", "agent_0002"), &mut rng)
            .unwrap();
        match outcome {
            SpreadOutcome::Delivered {
                variant_id,
                believability,
                reinforced,
                mutated,
            } => {
                assert_eq!(variant_id, "variant_00000001");
                assert!((believability - 0.58).abs() < 1e-9);
                assert!(!reinforced);
                assert!(!mutated);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(engine.store().spread_count(&id), 1);
        assert_eq!(engine.store().state_of(&id), Some(RumorState::Active));
        let held = engine.store().spread(&id, "agent_0002").unwrap();
        assert_eq!(held.heard_at.tick, 10);
    }

    #[test]
    fn test_second_hop_is_discounted() {
        let (mut engine, clock) = engine();
        let id = bandits(&mut engine);
        let mut rng = SmallRng::seed_from_u64(1);

        clock.advance(1);
        engine.spread_rumor(&no_mutation(&id, "agent_0001", "agent_0002"), &mut rng).unwrap();
        clock.advance(1);
        engine.spread_rumor(&no_mutation(&id, "agent_0002", "agent_0003"), &mut rng).unwrap();

        let first = engine.store().spread(&id, "agent_0002").unwrap().believability;
        let second = engine.store().spread(&id, "agent_0003").unwrap().believability;
        assert!((second - first * 0.85).abs() < 1e-9);
        assert_eq!(engine.store().relay_depth(&id, "agent_0003"), Some(2));
    }

    #[test]
    fn test_reinforcement_raises_belief() {
        let (mut engine, clock) = engine();
        let id = bandits(&mut engine);
        let mut rng = SmallRng::seed_from_u64(1);

        engine.spread_rumor(&no_mutation(&id, "agent_0001", "agent_0002"), &mut rng).unwrap();
        let before = engine.store().spread(&id, "agent_0002").unwrap().believability;
        clock.advance(5);
        let outcome = engine
            .spread_rumor(&no_mutation(&id, "agent_0001", "agent_0002"), &mut rng)
            .unwrap();

        let SpreadOutcome::Delivered { believability, reinforced, .. } = outcome else {
            panic!("expected delivery");
        };
        assert!(reinforced);
        assert!(believability > before);
        assert!((believability - (before + 0.2 + 0.1 * before)).abs() < 1e-9);
    }

    #[test]
    fn test_unaware_source_is_a_non_event() {
        let (mut engine, _) = engine();
        let id = bandits(&mut engine);
        engine.drain_events();
        let mut rng = SmallRng::seed_from_u64(1);

        let outcome = engine
            .spread_rumor(&no_mutation(&id, "agent_0005", "agent_0006"), &mut rng)
            .unwrap();
        assert_eq!(outcome, SpreadOutcome::SourceUnaware);
        assert!(engine.drain_events().is_empty());
    }

    #[test]
    fn test_spread_errors() {
        let (mut engine, _) = engine();
        let id = bandits(&mut engine);
        let mut rng = SmallRng::seed_from_u64(1);

        let unknown = engine.spread_rumor(&no_mutation("rumor_00000099", "agent_0001", "agent_0002"), &mut rng);
        assert!(matches!(unknown, Err(RumorError::NotFound { kind: "rumor", .. })));

        let to_self = engine.spread_rumor(&no_mutation(&id, "agent_0001", "agent_0001"), &mut rng);
        assert!(matches!(to_self, Err(RumorError::Validation(_))));
    }

    #[test]
    fn test_stale_spread_rejected_before_mutation() {
        let (mut engine, clock) = engine();
        let id = bandits(&mut engine);
        let mut rng = SmallRng::seed_from_u64(1);

        clock.set(50);
        engine.spread_rumor(&no_mutation(&id, "agent_0001", "agent_0002"), &mut rng).unwrap();
        clock.set(20);
        let variants_before = engine.store().get(&id).unwrap().variants().len();

        let request = SpreadRequest::new(&id, "agent_0001", "agent_0002").with_mutation_probability(1.0);
        let result = engine.spread_rumor(&request, &mut rng);
        assert!(matches!(result, Err(RumorError::StaleUpdate { stored_tick: 50, attempted_tick: 20, .. })));
        assert_eq!(engine.store().get(&id).unwrap().variants().len(), variants_before);
    }

    #[test]
    fn test_mutating_spread_creates_child_variant() {
        let (mut engine, _) = engine();
        let id = bandits(&mut engine);
        engine.drain_events();
        let mut rng = SmallRng::seed_from_u64(9);

        let request = SpreadRequest::new(&id, "agent_0001", "agent_0002").with_mutation_probability(1.0);
        let outcome = engine.spread_rumor(&request, &mut rng).unwrap();
        let SpreadOutcome::Delivered { variant_id, mutated, .. } = outcome else {
            panic!("expected delivery");
        };
        assert!(mutated);

        let rumor = engine.store().get(&id).unwrap();
        let variant = rumor.variant(&variant_id).unwrap();
        assert_eq!(variant.parent_variant_id.as_deref(), Some("variant_00000001"));
        assert_eq!(variant.entity_id, "agent_0001");
        assert_eq!(engine.store().owner_of(&variant_id), Some(id.as_str()));

        let names: Vec<&str> = engine.pending_events().iter().map(|e| e.kind.name()).collect();
        assert_eq!(names, vec!["rumor_mutated", "rumor_spread"]);
    }

    #[test]
    fn test_mutations_nudge_rumor_truth_within_bound() {
        let (mut engine, clock) = engine();
        let id = bandits(&mut engine);
        let max_delta = engine.config().mutation.max_truth_delta;
        let mut rng = SmallRng::seed_from_u64(31);
        let mut truth = engine.store().get(&id).unwrap().truth_value;
        let mut moved = false;

        for n in 1..=12 {
            clock.advance(1);
            let from = format!("agent_{:04}", n);
            let to = format!("agent_{:04}", n + 1);
            let request = SpreadRequest::new(&id, &from, &to).with_mutation_probability(1.0);
            let SpreadOutcome::Delivered { variant_id, mutated, .. } =
                engine.spread_rumor(&request, &mut rng).unwrap()
            else {
                panic!("expected delivery");
            };
            assert!(mutated);

            let rumor = engine.store().get(&id).unwrap();
            let delta = rumor.variant(&variant_id).unwrap().mutation_metadata["truth_delta"]
                .as_f64()
                .unwrap();
            assert!(delta.abs() <= max_delta + 1e-9);
            assert!((rumor.truth_value - truth).abs() <= max_delta + 1e-9);
            assert!((0.0..=1.0).contains(&rumor.truth_value));
            assert!((rumor.truth_value - (truth + delta).clamp(0.0, 1.0)).abs() < 1e-12);
            moved |= rumor.truth_value != truth;
            truth = rumor.truth_value;
        }
        assert!(moved);

        let stats = engine.statistics();
        assert!((stats.average_truth_value - truth).abs() < 1e-12);
        assert_eq!(engine.export_rumor(&id).unwrap().truth_value, truth);
    }

    #[test]
    fn test_unmutated_spread_leaves_rumor_truth() {
        let (mut engine, clock) = engine();
        let id = bandits(&mut engine);
        clock.advance(1);
        engine
            .spread_rumor(&no_mutation(&id, "agent_0001", "agent_0002"), &mut SmallRng::seed_from_u64(1))
            .unwrap();
        assert_eq!(engine.store().get(&id).unwrap().truth_value, 0.7);
    }

    #[test]
    fn test_try_share_out_of_range() {
        let (mut engine, _) = engine();
        let id = bandits(&mut engine);
        engine.drain_events();
        let mut rng = SmallRng::seed_from_u64(1);

        let outcome = engine
            .try_share_rumor(
                &no_mutation(&id, "agent_0001", "agent_0002"),
                &Position::new(0.0, 0.0).into(),
                &Position::new(100.0, 0.0).into(),
                &mut rng,
            )
            .unwrap();
        assert_eq!(
            outcome,
            SpreadOutcome::OutOfRange {
                distance: 100.0,
                radius: 50.0
            }
        );
        assert!(engine.store().spread(&id, "agent_0002").is_none());
        assert!(engine.drain_events().is_empty());
    }

    #[test]
    fn test_process_interactions_in_stable_order() {
        let (mut engine, _) = engine();
        let id = bandits(&mut engine);
        let mut rng = SmallRng::seed_from_u64(1);
        let near = Position::new(0.0, 0.0);

        // agent_0002 can only pass it on after hearing it from agent_0001
        let batch = vec![
            Interaction::new(no_mutation(&id, "agent_0002", "agent_0003"), near, near),
            Interaction::new(no_mutation(&id, "agent_0001", "agent_0002"), near, near),
        ];
        let results = engine.process_interactions(batch, &mut rng);

        assert_eq!(results[0].interaction.request.from_agent_id, "agent_0001");
        assert!(results[0].outcome.as_ref().unwrap().is_delivered());
        assert!(results[1].outcome.as_ref().unwrap().is_delivered());
        assert!(engine.store().spread(&id, "agent_0003").is_some());
    }

    #[test]
    fn test_batch_failures_are_isolated() {
        let (mut engine, _) = engine();
        let id = bandits(&mut engine);
        let mut rng = SmallRng::seed_from_u64(1);
        let here = Position::new(0.0, 0.0);

        let batch = vec![
            Interaction::new(no_mutation("rumor_00000099", "agent_0001", "agent_0002"), here, here),
            Interaction::new(no_mutation(&id, "agent_0001", "agent_0002"), here, here),
        ];
        let results = engine.process_interactions(batch, &mut rng);
        assert_eq!(results.len(), 2);
        assert!(results.iter().any(|r| r.outcome.is_err()));
        assert!(results.iter().any(|r| matches!(&r.outcome, Ok(o) if o.is_delivered())));
    }

    #[test]
    fn test_rumors_for_agent_sorted_by_belief() {
        let (mut engine, _) = engine();
        let a = bandits(&mut engine);
        let b = engine
            .create_rumor("agent_0003", "The king is ill", ["political"], Severity::Major, 0.1)
            .unwrap();
        let mut rng = SmallRng::seed_from_u64(1);

        engine.spread_rumor(&no_mutation(&b, "agent_0003", "agent_0002"), &mut rng).unwrap();
        engine.spread_rumor(&no_mutation(&a, "agent_0001", "agent_0002"), &mut rng).unwrap();

        let known = engine.get_rumors_for_agent("agent_0002");
        assert_eq!(known.len(), 2);
        assert_eq!(known[0].rumor_id, a);
        assert!(known[0].believability >= known[1].believability);

        let mut query = AgentRumorQuery::for_agent("agent_0002");
        query.categories.insert("political".into());
        let political = engine.query_for_agent(&query);
        assert_eq!(political.len(), 1);
        assert_eq!(political[0].rumor_id, b);
    }

    #[test]
    fn test_delete_publishes_forgotten() {
        let (mut engine, _) = engine();
        let id = bandits(&mut engine);
        engine.drain_events();

        engine.delete_rumor(&id).unwrap();
        let events = engine.drain_events();
        assert_eq!(
            events[0].kind,
            RumorEventKind::RumorForgotten {
                rumor_id: id.clone(),
                reason: ForgetReason::Deleted
            }
        );
        assert_eq!(engine.store().state_of(&id), Some(RumorState::Forgotten));
        assert!(engine.delete_rumor(&id).is_err());
    }

    #[test]
    fn test_adjust_believability_clamps() {
        let (mut engine, _) = engine();
        let id = bandits(&mut engine);

        assert_eq!(engine.adjust_believability(&id, "agent_0001", 0.5).unwrap(), 1.0);
        let lowered = engine.adjust_believability(&id, "agent_0001", -0.25).unwrap();
        assert!((lowered - 0.75).abs() < 1e-12);
        assert!(engine.adjust_believability(&id, "agent_0009", 0.1).is_err());
        assert!(engine.adjust_believability(&id, "agent_0001", f64::NAN).is_err());
    }

    #[test]
    fn test_query_rumors_newest_first() {
        let (mut engine, clock) = engine();
        let a = bandits(&mut engine);
        clock.advance(10);
        let b = engine
            .create_rumor("agent_0003", "The king is ill", ["political"], Severity::Major, 0.4)
            .unwrap();
        clock.advance(10);
        let c = engine
            .create_rumor("agent_0004", "Wolves in the forest", ["danger"], Severity::Minor, 0.9)
            .unwrap();

        let all = engine.query_rumors(&RumorQuery::default());
        let ids: Vec<&str> = all.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec![c.as_str(), b.as_str(), a.as_str()]);

        let mut query = RumorQuery::default();
        query.categories.insert("danger".into());
        query.min_truth = Some(0.8);
        let found = engine.query_rumors(&query);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, c);

        let query = RumorQuery {
            min_severity: Some(Severity::Moderate),
            known_by: Some("agent_0001".into()),
            ..Default::default()
        };
        let found = engine.query_rumors(&query);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, a);

        let query = RumorQuery {
            text: Some("KING".into()),
            limit: Some(5),
            ..Default::default()
        };
        assert_eq!(engine.query_rumors(&query)[0].id, b);
    }

    #[test]
    fn test_statistics() {
        let (mut engine, _) = engine();
        assert_eq!(engine.statistics(), RumorStatistics::default());

        let id = bandits(&mut engine);
        engine
            .create_rumor("agent_0003", "The king is ill", ["political"], Severity::Major, 0.3)
            .unwrap();
        let mut rng = SmallRng::seed_from_u64(1);
        engine.spread_rumor(&no_mutation(&id, "agent_0001", "agent_0002"), &mut rng).unwrap();

        let stats = engine.statistics();
        assert_eq!(stats.total_rumors, 2);
        assert_eq!(stats.total_variants, 2);
        assert_eq!(stats.total_spreads, 1);
        assert_eq!(stats.total_listeners, 3);
        assert_eq!(stats.active_rumors, 1);
        assert_eq!(stats.category_distribution["danger"], 1);
        assert_eq!(stats.severity_distribution["major"], 1);
        assert!((stats.average_truth_value - 0.5).abs() < 1e-12);
        assert!((stats.average_spread_count - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_merge_refreshes_listener_with_newer_exposure() {
        let (mut engine, clock) = engine();
        let a = bandits(&mut engine);
        clock.advance(1);
        engine
            .spread_rumor(&no_mutation(&a, "agent_0001", "agent_0002"), &mut SmallRng::seed_from_u64(4))
            .unwrap();
        let before = engine.store().spread(&a, "agent_0002").unwrap().clone();
        assert!(before.believability < 1.0);

        clock.advance(4);
        let b = engine
            .create_rumor("agent_0002", "Bandits on the road!", ["danger"], Severity::Moderate, 0.7)
            .unwrap();
        let outcome = engine.merge_rumors(&a, &b).unwrap().expect("should merge");
        assert_eq!(outcome.surviving_rumor_id, a);

        let held = engine.store().spread(&a, "agent_0002").unwrap();
        assert_eq!(held.believability, 1.0);
        assert_eq!(held.last_reinforced_at.tick, 5);
        assert_eq!(held.variant_id, outcome.merged_variant_id);
        assert_eq!(held.heard_at, before.heard_at);
        assert_eq!(held.heard_from_entity_id.as_deref(), Some("agent_0001"));
    }

    #[test]
    fn test_merge_keeps_listener_with_fresher_survivor_record() {
        let (mut engine, clock) = engine();
        let a = bandits(&mut engine);
        let b = engine
            .create_rumor("agent_0002", "Bandits on the road!", ["danger"], Severity::Moderate, 0.7)
            .unwrap();
        clock.advance(3);
        engine
            .spread_rumor(&no_mutation(&a, "agent_0001", "agent_0002"), &mut SmallRng::seed_from_u64(4))
            .unwrap();
        let before = engine.store().spread(&a, "agent_0002").unwrap().clone();

        let outcome = engine.merge_rumors(&a, &b).unwrap().expect("should merge");
        let held = engine.store().spread(&a, "agent_0002").unwrap();
        // Older but stronger belief is kept, the newer wording and stamp stay
        assert_eq!(held.believability, 1.0);
        assert_eq!(held.last_reinforced_at, before.last_reinforced_at);
        assert_eq!(held.variant_id, before.variant_id);
        assert_ne!(held.variant_id, outcome.merged_variant_id);
    }

    #[test]
    fn test_find_similar() {
        let (mut engine, _) = engine();
        let id = bandits(&mut engine);
        engine
            .create_rumor("agent_0003", "The king is ill", ["political"], Severity::Major, 0.3)
            .unwrap();

        let danger: BTreeSet<String> = ["danger".to_string()].into_iter().collect();
        let similar = engine.find_similar("Bandits on the road!!", &danger);
        assert_eq!(similar.len(), 1);
        assert_eq!(similar[0].rumor_id, id);
        assert_eq!(similar[0].similarity, 1.0);
    }
}
