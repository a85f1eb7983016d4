//! Rumor Store
//!
//! Authoritative state for rumors, their variant trees, and per-listener
//! spread records. All maps are ordered so iteration is deterministic.
//!
//! Invariants kept here:
//! - every variant id is owned by exactly one rumor
//! - each rumor has exactly one root variant, and every other variant's parent
//!   belongs to the same rumor
//! - at most one spread record per (rumor, listener)
//! - a spread is never overwritten by an update stamped earlier than it

use rumor_events::{RumorRecord, Severity, SimTimestamp, Spread, Variant};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::components::{Rumor, RumorState};
use crate::error::{RumorError, RumorResult};

/// Input for creating a rumor.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRumor {
    pub originator_id: String,
    pub content: String,
    pub categories: BTreeSet<String>,
    pub severity: Severity,
    pub truth_value: f64,
    pub propagation_radius: Option<f64>,
}

impl NewRumor {
    pub fn new<I, S>(
        originator_id: impl Into<String>,
        content: impl Into<String>,
        categories: I,
        severity: Severity,
        truth_value: f64,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            originator_id: originator_id.into(),
            content: content.into(),
            categories: categories.into_iter().map(Into::into).collect(),
            severity,
            truth_value,
            propagation_radius: None,
        }
    }

    /// Overrides the default propagation radius for this rumor.
    pub fn with_radius(mut self, radius: f64) -> Self {
        self.propagation_radius = Some(radius);
        self
    }
}

/// Input for appending a variant.
#[derive(Debug, Clone, PartialEq)]
pub struct NewVariant {
    /// None requests a root, which only the store itself may create
    pub parent_variant_id: Option<String>,
    pub content: String,
    pub entity_id: String,
    pub mutation_metadata: BTreeMap<String, Value>,
}

/// Whether an upsert created a record or refreshed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertResult {
    Inserted,
    Reinforced,
}

/// In-memory rumor store.
#[derive(Debug, Default)]
pub struct RumorStore {
    rumors: BTreeMap<String, Rumor>,
    /// rumor id -> listener id -> spread
    spreads: BTreeMap<String, BTreeMap<String, Spread>>,
    /// variant id -> owning rumor id
    variant_owner: BTreeMap<String, String>,
    /// Rumors that were removed; ids are never reissued
    retired: BTreeSet<String>,
    next_rumor_seq: u64,
    next_variant_seq: u64,
}

impl RumorStore {
    pub fn new() -> Self {
        Self {
            next_rumor_seq: 1,
            next_variant_seq: 1,
            ..Default::default()
        }
    }

    fn next_rumor_id(&mut self) -> RumorResult<String> {
        loop {
            let seq = self.next_rumor_seq.max(1);
            self.next_rumor_seq = seq.checked_add(1).ok_or_else(|| exhausted("rumor"))?;
            let id = format!("rumor_{:08}", seq);
            if !self.rumors.contains_key(&id) && !self.retired.contains(&id) {
                return Ok(id);
            }
        }
    }

    fn next_variant_id(&mut self) -> RumorResult<String> {
        loop {
            let seq = self.next_variant_seq.max(1);
            self.next_variant_seq = seq.checked_add(1).ok_or_else(|| exhausted("variant"))?;
            let id = format!("variant_{:08}", seq);
            if !self.variant_owner.contains_key(&id) {
                return Ok(id);
            }
        }
    }

    /// Creates a rumor together with its root variant.
    pub fn create_rumor(&mut self, new: NewRumor, now: SimTimestamp) -> RumorResult<&Rumor> {
        if new.originator_id.trim().is_empty() {
            return Err(RumorError::Validation("originator id must not be empty".into()));
        }
        if new.content.trim().is_empty() {
            return Err(RumorError::Validation("rumor content must not be empty".into()));
        }
        if new.categories.is_empty() {
            return Err(RumorError::Validation("a rumor needs at least one category".into()));
        }
        check_unit("truth_value", new.truth_value)?;
        if let Some(radius) = new.propagation_radius {
            if !radius.is_finite() || radius < 0.0 {
                return Err(RumorError::Validation(format!(
                    "propagation radius must be a non-negative number, got {}",
                    radius
                )));
            }
        }

        let rumor_id = self.next_rumor_id()?;
        let root_id = self.next_variant_id()?;
        let root = Variant {
            id: root_id.clone(),
            content: new.content.clone(),
            created_at: now,
            parent_variant_id: None,
            entity_id: new.originator_id.clone(),
            mutation_metadata: BTreeMap::new(),
        };

        let rumor = Rumor {
            id: rumor_id.clone(),
            originator_id: new.originator_id,
            original_content: new.content,
            categories: new.categories,
            severity: new.severity,
            truth_value: new.truth_value,
            created_at: now,
            propagation_radius: new.propagation_radius,
            related_categories: BTreeSet::new(),
            variants: vec![root],
        };

        self.variant_owner.insert(root_id, rumor_id.clone());
        self.spreads.insert(rumor_id.clone(), BTreeMap::new());
        debug!(rumor_id = %rumor_id, "rumor created");
        Ok(self.rumors.entry(rumor_id).or_insert(rumor))
    }

    /// Appends a variant beneath an existing variant of the same rumor.
    pub fn append_variant(
        &mut self,
        rumor_id: &str,
        new: NewVariant,
        now: SimTimestamp,
    ) -> RumorResult<&Variant> {
        if !self.rumors.contains_key(rumor_id) {
            return Err(RumorError::rumor_not_found(rumor_id));
        }

        let Some(parent_id) = new.parent_variant_id.clone() else {
            return Err(RumorError::InvariantViolation(format!(
                "rumor {} already has a root variant",
                rumor_id
            )));
        };
        match self.variant_owner.get(&parent_id) {
            None => return Err(RumorError::variant_not_found(parent_id)),
            Some(owner) if owner != rumor_id => {
                return Err(RumorError::InvariantViolation(format!(
                    "parent variant {} belongs to {}, not {}",
                    parent_id, owner, rumor_id
                )));
            }
            Some(_) => {}
        }

        let variant_id = self.next_variant_id()?;
        let variant = Variant {
            id: variant_id.clone(),
            content: new.content,
            created_at: now,
            parent_variant_id: Some(parent_id),
            entity_id: new.entity_id,
            mutation_metadata: new.mutation_metadata,
        };

        self.variant_owner.insert(variant_id, rumor_id.to_string());
        let rumor = self
            .rumors
            .get_mut(rumor_id)
            .ok_or_else(|| RumorError::rumor_not_found(rumor_id))?;
        rumor.variants.push(variant);
        rumor
            .variants
            .last()
            .ok_or_else(|| RumorError::InvariantViolation("variant vanished after append".into()))
    }

    /// Errors with `StaleUpdate` if the listener's record was reinforced after `at`.
    pub fn check_fresh(&self, rumor_id: &str, agent_id: &str, at: SimTimestamp) -> RumorResult<()> {
        if let Some(existing) = self.spread(rumor_id, agent_id) {
            if at < existing.last_reinforced_at {
                return Err(RumorError::StaleUpdate {
                    rumor_id: rumor_id.to_string(),
                    agent_id: agent_id.to_string(),
                    stored_tick: existing.last_reinforced_at.tick,
                    attempted_tick: at.tick,
                });
            }
        }
        Ok(())
    }

    /// Inserts a spread record or reinforces the listener's existing one.
    ///
    /// Reinforcement replaces the held wording, belief, and reinforcement
    /// time. First exposure (`heard_at`, `heard_from_entity_id`) is kept.
    pub fn upsert_spread(&mut self, rumor_id: &str, spread: Spread) -> RumorResult<UpsertResult> {
        if !self.rumors.contains_key(rumor_id) {
            return Err(RumorError::rumor_not_found(rumor_id));
        }
        match self.variant_owner.get(&spread.variant_id) {
            None => return Err(RumorError::variant_not_found(&spread.variant_id)),
            Some(owner) if owner != rumor_id => {
                return Err(RumorError::InvariantViolation(format!(
                    "variant {} belongs to {}, not {}",
                    spread.variant_id, owner, rumor_id
                )));
            }
            Some(_) => {}
        }
        check_unit("believability", spread.believability)?;
        if spread.last_reinforced_at < spread.heard_at {
            return Err(RumorError::Validation(format!(
                "spread for {} reinforced before it was heard",
                spread.entity_id
            )));
        }

        if let Err(err) = self.check_fresh(rumor_id, &spread.entity_id, spread.last_reinforced_at) {
            warn!(rumor_id, agent_id = %spread.entity_id, "rejected stale spread update");
            return Err(err);
        }

        let listeners = self.spreads.entry(rumor_id.to_string()).or_default();
        match listeners.get_mut(&spread.entity_id) {
            Some(existing) => {
                existing.variant_id = spread.variant_id;
                existing.believability = spread.believability;
                existing.last_reinforced_at = spread.last_reinforced_at;
                Ok(UpsertResult::Reinforced)
            }
            None => {
                listeners.insert(spread.entity_id.clone(), spread);
                Ok(UpsertResult::Inserted)
            }
        }
    }

    /// Removes a rumor with all its variants and spread records.
    pub fn remove_rumor(&mut self, rumor_id: &str) -> RumorResult<(Rumor, Vec<Spread>)> {
        let rumor = self
            .rumors
            .remove(rumor_id)
            .ok_or_else(|| RumorError::rumor_not_found(rumor_id))?;
        for variant in &rumor.variants {
            self.variant_owner.remove(&variant.id);
        }
        let spreads: Vec<Spread> = self
            .spreads
            .remove(rumor_id)
            .map(|m| m.into_values().collect())
            .unwrap_or_default();
        self.retired.insert(rumor_id.to_string());
        Ok((rumor, spreads))
    }

    pub fn get(&self, rumor_id: &str) -> Option<&Rumor> {
        self.rumors.get(rumor_id)
    }

    /// Like [`get`](Self::get) but unknown ids are an error.
    pub fn rumor(&self, rumor_id: &str) -> RumorResult<&Rumor> {
        self.get(rumor_id)
            .ok_or_else(|| RumorError::rumor_not_found(rumor_id))
    }

    pub fn contains(&self, rumor_id: &str) -> bool {
        self.rumors.contains_key(rumor_id)
    }

    pub fn len(&self) -> usize {
        self.rumors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rumors.is_empty()
    }

    /// Rumor owning a variant id.
    pub fn owner_of(&self, variant_id: &str) -> Option<&str> {
        self.variant_owner.get(variant_id).map(String::as_str)
    }

    pub fn spread(&self, rumor_id: &str, agent_id: &str) -> Option<&Spread> {
        self.spreads.get(rumor_id).and_then(|m| m.get(agent_id))
    }

    /// Spread records of a rumor, ordered by listener id.
    pub fn spreads(&self, rumor_id: &str) -> impl Iterator<Item = &Spread> + '_ {
        self.spreads.get(rumor_id).into_iter().flat_map(|m| m.values())
    }

    /// Every rumor the agent has heard, with the agent's record, by rumor id.
    pub fn query_by_listener(&self, agent_id: &str) -> Vec<(&Rumor, &Spread)> {
        self.rumors
            .iter()
            .filter_map(|(id, rumor)| self.spread(id, agent_id).map(|s| (rumor, s)))
            .collect()
    }

    /// All rumors still held in the store, by rumor id.
    pub fn query_active(&self) -> Vec<&Rumor> {
        self.rumors.values().collect()
    }

    /// Number of spread records produced by propagation.
    pub fn spread_count(&self, rumor_id: &str) -> usize {
        self.spreads(rumor_id).filter(|s| s.is_propagated()).count()
    }

    /// Highest believability any listener holds, None without listeners.
    pub fn max_believability(&self, rumor_id: &str) -> Option<f64> {
        self.spreads(rumor_id)
            .map(|s| s.believability)
            .fold(None, |acc: Option<f64>, b| Some(acc.map_or(b, |a| a.max(b))))
    }

    pub fn state_of(&self, rumor_id: &str) -> Option<RumorState> {
        if self.rumors.contains_key(rumor_id) {
            if self.spread_count(rumor_id) > 0 {
                Some(RumorState::Active)
            } else {
                Some(RumorState::Created)
            }
        } else if self.retired.contains(rumor_id) {
            Some(RumorState::Forgotten)
        } else {
            None
        }
    }

    /// Hops between the originator and the listener along heard-from links.
    ///
    /// 0 for a record with no teller, 1 for someone told by the originator.
    /// A chain that leaves the rumor's listeners or loops stops counting there.
    pub fn relay_depth(&self, rumor_id: &str, agent_id: &str) -> Option<u32> {
        let listeners = self.spreads.get(rumor_id)?;
        let mut current = listeners.get(agent_id)?;
        let mut visited = BTreeSet::new();
        visited.insert(agent_id);
        let mut depth = 0;

        while let Some(teller) = current.heard_from_entity_id.as_deref() {
            depth += 1;
            if !visited.insert(teller) {
                break;
            }
            match listeners.get(teller) {
                Some(next) => current = next,
                None => break,
            }
        }
        Some(depth)
    }

    pub(crate) fn rumor_mut(&mut self, rumor_id: &str) -> RumorResult<&mut Rumor> {
        self.rumors
            .get_mut(rumor_id)
            .ok_or_else(|| RumorError::rumor_not_found(rumor_id))
    }

    pub(crate) fn spread_mut(&mut self, rumor_id: &str, agent_id: &str) -> RumorResult<&mut Spread> {
        self.spreads
            .get_mut(rumor_id)
            .and_then(|m| m.get_mut(agent_id))
            .ok_or_else(|| RumorError::spread_not_found(rumor_id, agent_id))
    }

    /// Mutable access to every spread record, for decay passes.
    pub(crate) fn all_spreads_mut(&mut self) -> impl Iterator<Item = (&String, &mut Spread)> + '_ {
        self.spreads
            .iter_mut()
            .flat_map(|(rumor_id, m)| m.values_mut().map(move |s| (rumor_id, s)))
    }

    /// Wire form of a stored rumor.
    pub fn export_record(&self, rumor_id: &str) -> RumorResult<RumorRecord> {
        let rumor = self.rumor(rumor_id)?;
        Ok(RumorRecord {
            id: rumor.id.clone(),
            created_at: rumor.created_at,
            originator_id: rumor.originator_id.clone(),
            original_content: rumor.original_content.clone(),
            categories: rumor.categories.clone(),
            severity: rumor.severity,
            truth_value: rumor.truth_value,
            variants: rumor.variants.clone(),
            spread: self.spreads(rumor_id).cloned().collect(),
            propagation_radius: rumor.propagation_radius,
            related_categories: rumor.related_categories.clone(),
        })
    }

    /// Loads a wire record. Either the whole record is accepted or nothing
    /// changes.
    pub fn import_record(&mut self, record: RumorRecord) -> RumorResult<String> {
        let (next_rumor_seq, next_variant_seq) = self.validate_record(&record)?;

        let RumorRecord {
            id,
            created_at,
            originator_id,
            original_content,
            categories,
            severity,
            truth_value,
            mut variants,
            spread,
            propagation_radius,
            related_categories,
        } = record;

        // Root first
        variants.sort_by_key(|v| !v.is_root());
        for variant in &variants {
            self.variant_owner.insert(variant.id.clone(), id.clone());
        }
        self.next_rumor_seq = next_rumor_seq;
        self.next_variant_seq = next_variant_seq;

        let listeners = spread
            .into_iter()
            .map(|s| (s.entity_id.clone(), s))
            .collect();
        self.spreads.insert(id.clone(), listeners);
        self.retired.remove(&id);
        self.rumors.insert(
            id.clone(),
            Rumor {
                id: id.clone(),
                originator_id,
                original_content,
                categories,
                severity,
                truth_value,
                created_at,
                propagation_radius,
                related_categories,
                variants,
            },
        );
        debug!(rumor_id = %id, "rumor imported");
        Ok(id)
    }

    /// Checks a wire record against the store. On success returns the id
    /// counters as they stand once the record is in.
    fn validate_record(&self, record: &RumorRecord) -> RumorResult<(u64, u64)> {
        let invalid = |msg: String| -> RumorResult<(u64, u64)> {
            Err(RumorError::Validation(format!("{}: {}", record.id, msg)))
        };

        if record.id.trim().is_empty() {
            return Err(RumorError::Validation("rumor id must not be empty".into()));
        }
        if self.rumors.contains_key(&record.id) {
            return invalid("a rumor with this id already exists".into());
        }
        if record.categories.is_empty() {
            return invalid("no categories".into());
        }
        if check_unit("truth_value", record.truth_value).is_err() {
            return invalid(format!("truth_value {} outside [0, 1]", record.truth_value));
        }
        if let Some(radius) = record.propagation_radius {
            if !radius.is_finite() || radius < 0.0 {
                return invalid(format!("invalid propagation radius {}", radius));
            }
        }

        // Variant tree
        let mut parents: BTreeMap<&str, Option<&str>> = BTreeMap::new();
        for variant in &record.variants {
            if parents
                .insert(&variant.id, variant.parent_variant_id.as_deref())
                .is_some()
            {
                return invalid(format!("duplicate variant id {}", variant.id));
            }
            if self.variant_owner.contains_key(&variant.id) {
                return invalid(format!("variant id {} already in use", variant.id));
            }
        }
        let roots = record.variants.iter().filter(|v| v.is_root()).count();
        if roots != 1 {
            return invalid(format!("expected exactly one root variant, found {}", roots));
        }
        for variant in &record.variants {
            if let Some(parent) = variant.parent_variant_id.as_deref() {
                if !parents.contains_key(parent) {
                    return invalid(format!(
                        "variant {} has unknown parent {}",
                        variant.id, parent
                    ));
                }
            }
            // Walking up must reach the root within as many steps as there are variants
            let mut steps = 0;
            let mut cursor = variant.parent_variant_id.as_deref();
            while let Some(parent) = cursor {
                steps += 1;
                if steps > parents.len() {
                    return invalid(format!("variant {} is part of a cycle", variant.id));
                }
                cursor = parents.get(parent).copied().flatten();
            }
        }

        // Spread records
        let mut listeners = BTreeSet::new();
        for spread in &record.spread {
            if !listeners.insert(spread.entity_id.as_str()) {
                return invalid(format!("duplicate spread for listener {}", spread.entity_id));
            }
            if !parents.contains_key(spread.variant_id.as_str()) {
                return invalid(format!(
                    "spread for {} references unknown variant {}",
                    spread.entity_id, spread.variant_id
                ));
            }
            if check_unit("believability", spread.believability).is_err() {
                return invalid(format!(
                    "believability {} outside [0, 1] for {}",
                    spread.believability, spread.entity_id
                ));
            }
            if spread.last_reinforced_at < spread.heard_at {
                return invalid(format!(
                    "spread for {} reinforced before it was heard",
                    spread.entity_id
                ));
            }
        }

        // Counters must move past every imported id
        let mut next_rumor_seq = self.next_rumor_seq;
        if let Some(seq) = id_sequence(&record.id, "rumor_") {
            match seq.checked_add(1) {
                Some(next) => next_rumor_seq = next_rumor_seq.max(next),
                None => return invalid("rumor id sequence is out of range".into()),
            }
        }
        let mut next_variant_seq = self.next_variant_seq;
        for variant in &record.variants {
            if let Some(seq) = id_sequence(&variant.id, "variant_") {
                match seq.checked_add(1) {
                    Some(next) => next_variant_seq = next_variant_seq.max(next),
                    None => {
                        return invalid(format!(
                            "variant id {} sequence is out of range",
                            variant.id
                        ))
                    }
                }
            }
        }
        Ok((next_rumor_seq, next_variant_seq))
    }
}

fn exhausted(kind: &str) -> RumorError {
    RumorError::InvariantViolation(format!("{} id sequence exhausted", kind))
}

fn check_unit(field: &str, value: f64) -> RumorResult<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(RumorError::Validation(format!(
            "{} must be within [0, 1], got {}",
            field, value
        )))
    }
}

/// Numeric suffix of a generated id such as "rumor_00000042".
fn id_sequence(id: &str, prefix: &str) -> Option<u64> {
    id.strip_prefix(prefix)?.parse().ok()
}
