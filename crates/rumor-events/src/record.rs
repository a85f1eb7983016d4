//! Rumor Records
//!
//! Wire representation of rumors, their variants, and their spread records.
//! These are the shapes the transport and persistence collaborators exchange
//! with the engine; field names are part of the external contract.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::timestamp::SimTimestamp;

/// How consequential a rumor is. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Idle gossip
    Trivial,
    /// Interesting but not consequential
    #[default]
    Minor,
    /// Could affect a reputation
    Moderate,
    /// Could affect relationships or alliances
    Major,
    /// Could trigger major events
    Critical,
}

impl Severity {
    /// All severities, least severe first.
    pub fn all() -> &'static [Severity] {
        &[
            Severity::Trivial,
            Severity::Minor,
            Severity::Moderate,
            Severity::Major,
            Severity::Critical,
        ]
    }

    fn rank(self) -> i32 {
        match self {
            Severity::Trivial => 0,
            Severity::Minor => 1,
            Severity::Moderate => 2,
            Severity::Major => 3,
            Severity::Critical => 4,
        }
    }

    /// Moves `steps` levels up (positive) or down (negative), clamped to the
    /// ends of the scale.
    pub fn shifted(self, steps: i32) -> Severity {
        let all = Self::all();
        let target = (self.rank() + steps).clamp(0, all.len() as i32 - 1);
        all[target as usize]
    }

    /// True if this severity is `min` or worse.
    pub fn is_at_least(self, min: Severity) -> bool {
        self >= min
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Trivial => write!(f, "trivial"),
            Severity::Minor => write!(f, "minor"),
            Severity::Moderate => write!(f, "moderate"),
            Severity::Major => write!(f, "major"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Error returned when a severity name is not recognised.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseSeverityError(pub String);

impl fmt::Display for ParseSeverityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown severity: '{}'", self.0)
    }
}

impl std::error::Error for ParseSeverityError {}

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trivial" => Ok(Severity::Trivial),
            "minor" => Ok(Severity::Minor),
            "moderate" => Ok(Severity::Moderate),
            "major" => Ok(Severity::Major),
            "critical" => Ok(Severity::Critical),
            _ => Err(ParseSeverityError(s.to_string())),
        }
    }
}

/// One wording of a rumor, a node in the rumor's mutation tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub id: String,
    pub content: String,
    pub created_at: SimTimestamp,
    /// None only for the root variant built from the original content
    pub parent_variant_id: Option<String>,
    /// Agent whose retelling produced this wording
    pub entity_id: String,
    /// What changed relative to the parent (e.g. "embellishment": "qualifier_added")
    #[serde(default)]
    pub mutation_metadata: BTreeMap<String, serde_json::Value>,
}

impl Variant {
    pub fn is_root(&self) -> bool {
        self.parent_variant_id.is_none()
    }
}

/// One listener's exposure to, and belief in, a rumor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spread {
    /// The listener
    pub entity_id: String,
    /// Wording the listener currently holds
    pub variant_id: String,
    /// Who told them; None for the originator's own knowledge
    pub heard_from_entity_id: Option<String>,
    /// 0.0 (disbelieves) to 1.0 (fully believes)
    pub believability: f64,
    pub heard_at: SimTimestamp,
    pub last_reinforced_at: SimTimestamp,
}

impl Spread {
    /// True if this exposure came from another agent rather than the
    /// originator knowing their own rumor.
    pub fn is_propagated(&self) -> bool {
        self.heard_from_entity_id.is_some()
    }
}

/// Full wire form of a rumor with its variants and spread records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RumorRecord {
    pub id: String,
    pub created_at: SimTimestamp,
    pub originator_id: String,
    pub original_content: String,
    pub categories: BTreeSet<String>,
    pub severity: Severity,
    pub truth_value: f64,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub spread: Vec<Spread>,
    /// Per-rumor override of the default propagation radius
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub propagation_radius: Option<f64>,
    /// Union of categories recorded when other rumors were merged into this one
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub related_categories: BTreeSet<String>,
}

impl RumorRecord {
    /// Parse a record from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to a compact JSON document.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Number of spread records produced by propagation.
    pub fn spread_count(&self) -> usize {
        self.spread.iter().filter(|s| s.is_propagated()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Trivial < Severity::Minor);
        assert!(Severity::Major < Severity::Critical);
        assert!(Severity::Major.is_at_least(Severity::Moderate));
        assert!(!Severity::Minor.is_at_least(Severity::Moderate));
    }

    #[test]
    fn test_severity_shift_clamps() {
        assert_eq!(Severity::Minor.shifted(1), Severity::Moderate);
        assert_eq!(Severity::Minor.shifted(-1), Severity::Trivial);
        assert_eq!(Severity::Trivial.shifted(-1), Severity::Trivial);
        assert_eq!(Severity::Critical.shifted(1), Severity::Critical);
        assert_eq!(Severity::Trivial.shifted(10), Severity::Critical);
    }

    #[test]
    fn test_severity_serialization() {
        assert_eq!(serde_json::to_string(&Severity::Moderate).unwrap(), r#""moderate""#);
        assert_eq!("MAJOR".parse::<Severity>().unwrap(), Severity::Major);
        assert!("apocalyptic".parse::<Severity>().is_err());
    }

    #[test]
    fn test_optional_fields_omitted() {
        let record = RumorRecord {
            id: "rumor_00000001".into(),
            created_at: SimTimestamp::at(0),
            originator_id: "agent_0001".into(),
            original_content: "Bandits on the road".into(),
            categories: ["danger".to_string()].into_iter().collect(),
            severity: Severity::Moderate,
            truth_value: 0.7,
            variants: Vec::new(),
            spread: Vec::new(),
            propagation_radius: None,
            related_categories: BTreeSet::new(),
        };

        let json = record.to_json().unwrap();
        assert!(!json.contains("propagation_radius"));
        assert!(!json.contains("related_categories"));
        assert!(json.contains(r#""severity":"moderate""#));
    }

    #[test]
    fn test_parent_variant_id_serializes_as_null() {
        let variant = Variant {
            id: "variant_00000001".into(),
            content: "The king is ill".into(),
            created_at: SimTimestamp::at(5),
            parent_variant_id: None,
            entity_id: "agent_0002".into(),
            mutation_metadata: BTreeMap::new(),
        };

        let json = serde_json::to_string(&variant).unwrap();
        assert!(json.contains(r#""parent_variant_id":null"#));
        assert!(variant.is_root());
    }
}
