//! Rumor Aggregate
//!
//! A rumor owns its immutable original content, its classification, and the
//! tree of wordings (variants) retellings have produced. Spread records live
//! in the store, keyed by rumor and listener.

use rumor_events::{Severity, SimTimestamp, Variant};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::matcher::MatchCandidate;

/// Metadata key holding a variant's effective truth value
pub const META_TRUTH_VALUE: &str = "truth_value";
/// Metadata key holding a variant's effective severity
pub const META_SEVERITY: &str = "severity";

/// Lifecycle state of a rumor.
///
/// `Created -> Active` on the first propagated spread, `Active -> Forgotten`
/// once every listener's belief has decayed away. `Created -> Forgotten` only
/// happens through administrative deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RumorState {
    Created,
    Active,
    Forgotten,
}

/// A rumor and its variant tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Rumor {
    pub id: String,
    pub originator_id: String,
    pub original_content: String,
    pub categories: BTreeSet<String>,
    pub severity: Severity,
    pub truth_value: f64,
    pub created_at: SimTimestamp,
    /// Overrides the configured default radius when set
    pub propagation_radius: Option<f64>,
    /// Categories picked up from merged rumors
    pub related_categories: BTreeSet<String>,
    /// Variants in creation order; the first is the root
    pub(crate) variants: Vec<Variant>,
}

impl Rumor {
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    /// The variant built from the original content.
    pub fn root_variant(&self) -> Option<&Variant> {
        self.variants.iter().find(|v| v.is_root())
    }

    pub fn variant(&self, variant_id: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == variant_id)
    }

    pub fn has_variant(&self, variant_id: &str) -> bool {
        self.variant(variant_id).is_some()
    }

    /// Truth value carried by a wording. Mutations record their nudged value
    /// in metadata; unmutated wordings inherit the rumor's.
    pub fn variant_truth(&self, variant_id: &str) -> f64 {
        self.variant(variant_id)
            .and_then(|v| v.mutation_metadata.get(META_TRUTH_VALUE))
            .and_then(|v| v.as_f64())
            .unwrap_or(self.truth_value)
    }

    /// Severity carried by a wording, falling back to the rumor's.
    pub fn variant_severity(&self, variant_id: &str) -> Severity {
        self.variant(variant_id)
            .and_then(|v| v.mutation_metadata.get(META_SEVERITY))
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .unwrap_or(self.severity)
    }

    /// Radius this rumor travels, given the configured default.
    pub fn radius_or(&self, default_radius: f64) -> f64 {
        self.propagation_radius.unwrap_or(default_radius)
    }

    /// True if any wording of this rumor contains `needle` (case-insensitive).
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.original_content.to_lowercase().contains(&needle)
            || self
                .variants
                .iter()
                .any(|v| v.content.to_lowercase().contains(&needle))
    }

    /// View of this rumor for similarity matching.
    pub fn as_candidate(&self) -> MatchCandidate<'_> {
        MatchCandidate {
            id: &self.id,
            content: &self.original_content,
            categories: &self.categories,
            created_at: self.created_at,
        }
    }
}
