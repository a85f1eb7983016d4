//! Mutation Engine
//!
//! Retellings sometimes change the wording. A mutation applies one
//! embellishment from a fixed vocabulary and nudges the wording's truth value
//! and severity.
//!
//! RNG draw order is fixed so the same seed and input always produce the
//! same output:
//! 1. trigger draw (`f64`), mutate iff draw < probability
//! 2. embellishment kind
//! 3. choice within the kind's vocabulary
//! 4. truth delta
//! 5. severity shift

use rand::Rng;
use rumor_events::{Severity, Variant};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::components::{META_SEVERITY, META_TRUTH_VALUE};
use crate::config::MutationConfig;

/// Hedging substitutions: statements become less certain.
const HEDGES: &[(&str, &str)] = &[
    ("is", "might be"),
    ("are", "might be"),
    ("was", "supposedly was"),
    ("were", "supposedly were"),
    ("will", "could"),
    ("definitely", "probably"),
    ("all", "most"),
    ("at the", "somewhere near the"),
    ("in the", "around the"),
    ("on the", "somewhere along the"),
    ("yesterday", "recently"),
];

/// Exaggerations: details grow in the telling.
const EXAGGERATIONS: &[(&str, &str)] = &[
    ("a few", "dozens of"),
    ("some", "many"),
    ("several", "a great many"),
    ("small", "huge"),
    ("ill", "gravely ill"),
    ("angry", "furious"),
    ("hurt", "badly wounded"),
    ("bandits", "a gang of bandits"),
];

/// Qualifiers put in front of the whole rumor.
const QUALIFIERS: &[&str] = &[
    "allegedly",
    "reportedly",
    "supposedly",
    "apparently",
    "some say that",
    "it is said that",
];

/// Hedges appended to the end.
const UNCERTAINTY_SUFFIXES: &[&str] = &[
    "(or so I heard)",
    "(though I'm not certain)",
    "(if the rumors are true)",
    "(according to some)",
    "(allegedly)",
];

/// Kind of change a mutation made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Embellishment {
    Hedging,
    Exaggeration,
    Qualifier,
    Uncertainty,
}

impl Embellishment {
    const ALL: [Embellishment; 4] = [
        Embellishment::Hedging,
        Embellishment::Exaggeration,
        Embellishment::Qualifier,
        Embellishment::Uncertainty,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Embellishment::Hedging => "hedging",
            Embellishment::Exaggeration => "exaggeration",
            Embellishment::Qualifier => "qualifier_added",
            Embellishment::Uncertainty => "uncertainty_added",
        }
    }
}

/// A new wording derived from a parent variant.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub content: String,
    pub embellishment: Embellishment,
    /// Metadata for the new variant: embellishment, detail, truth_delta,
    /// severity_shift, plus the resulting truth_value and severity
    pub metadata: BTreeMap<String, Value>,
    /// Signed nudge drawn for this retelling, within the configured bound
    pub truth_delta: f64,
    pub truth_value: f64,
    pub severity: Severity,
}

/// Produces mutated wordings.
#[derive(Debug, Clone)]
pub struct MutationEngine {
    max_truth_delta: f64,
}

impl Default for MutationEngine {
    fn default() -> Self {
        Self::from_config(&MutationConfig::default())
    }
}

impl MutationEngine {
    pub fn new(max_truth_delta: f64) -> Self {
        Self {
            max_truth_delta: if max_truth_delta.is_finite() {
                max_truth_delta.clamp(0.0, 1.0)
            } else {
                0.0
            },
        }
    }

    pub fn from_config(config: &MutationConfig) -> Self {
        Self::new(config.max_truth_delta)
    }

    /// Maybe mutates `parent`. `truth_value` and `severity` are the values the
    /// parent wording carries. Returns None when the trigger draw fails.
    pub fn mutate<R: Rng + ?Sized>(
        &self,
        parent: &Variant,
        truth_value: f64,
        severity: Severity,
        probability: f64,
        rng: &mut R,
    ) -> Option<Mutation> {
        let draw: f64 = rng.gen();
        if !(draw < probability) {
            return None;
        }

        let kind = Embellishment::ALL[rng.gen_range(0..Embellishment::ALL.len())];
        let (embellishment, content, detail) = self.embellish(&parent.content, kind, rng);

        let truth_delta = if self.max_truth_delta > 0.0 {
            rng.gen_range(-self.max_truth_delta..=self.max_truth_delta)
        } else {
            0.0
        };
        let base_truth = if truth_value.is_finite() {
            truth_value.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let new_truth = (base_truth + truth_delta).clamp(0.0, 1.0);

        let severity_shift: i32 = rng.gen_range(-1..=1);
        let new_severity = severity.shifted(severity_shift);

        let mut metadata = BTreeMap::new();
        metadata.insert("embellishment".to_string(), json!(embellishment.as_str()));
        metadata.insert("detail".to_string(), json!(detail));
        metadata.insert("truth_delta".to_string(), json!(truth_delta));
        metadata.insert("severity_shift".to_string(), json!(severity_shift));
        metadata.insert(META_TRUTH_VALUE.to_string(), json!(new_truth));
        metadata.insert(META_SEVERITY.to_string(), json!(new_severity.to_string()));

        Some(Mutation {
            content,
            embellishment,
            metadata,
            truth_delta,
            truth_value: new_truth,
            severity: new_severity,
        })
    }

    /// Applies `kind`, falling through the remaining kinds in order when it
    /// has nothing to work with. The uncertainty suffix always applies.
    fn embellish<R: Rng + ?Sized>(
        &self,
        content: &str,
        kind: Embellishment,
        rng: &mut R,
    ) -> (Embellishment, String, String) {
        let start = Embellishment::ALL
            .iter()
            .position(|k| *k == kind)
            .unwrap_or(0);

        for candidate in Embellishment::ALL[start..].iter().copied() {
            match candidate {
                Embellishment::Hedging | Embellishment::Exaggeration => {
                    let table = if candidate == Embellishment::Hedging {
                        HEDGES
                    } else {
                        EXAGGERATIONS
                    };
                    let applicable: Vec<(usize, &(&str, &str))> = table
                        .iter()
                        .filter_map(|pair| find_phrase(content, pair.0).map(|at| (at, pair)))
                        .collect();
                    if applicable.is_empty() {
                        continue;
                    }
                    let (at, (from, to)) = applicable[rng.gen_range(0..applicable.len())];
                    let replaced = replace_at(content, at, from.len(), to);
                    return (candidate, replaced, format!("{} -> {}", from, to));
                }
                Embellishment::Qualifier => {
                    let lowered = content.to_lowercase();
                    if QUALIFIERS.iter().any(|q| lowered.starts_with(q)) {
                        continue;
                    }
                    let qualifier = QUALIFIERS[rng.gen_range(0..QUALIFIERS.len())];
                    let rest = lowercase_first(content);
                    let qualified = if qualifier.contains(' ') {
                        format!("{} {}", capitalize(qualifier), rest)
                    } else {
                        format!("{}, {}", capitalize(qualifier), rest)
                    };
                    return (candidate, qualified, qualifier.to_string());
                }
                Embellishment::Uncertainty => {}
            }
        }

        let suffix = UNCERTAINTY_SUFFIXES[rng.gen_range(0..UNCERTAINTY_SUFFIXES.len())];
        (
            Embellishment::Uncertainty,
            format!("{} {}", content.trim_end(), suffix),
            suffix.to_string(),
        )
    }
}

/// Byte offset of the first whole-word, case-insensitive occurrence.
fn find_phrase(content: &str, phrase: &str) -> Option<usize> {
    let haystack = content.to_ascii_lowercase();
    let bytes = haystack.as_bytes();
    let mut from = 0;
    while let Some(found) = haystack[from..].find(phrase) {
        let at = from + found;
        let end = at + phrase.len();
        let before_ok = at == 0 || !bytes[at - 1].is_ascii_alphanumeric();
        let after_ok = end == bytes.len() || !bytes[end].is_ascii_alphanumeric();
        if before_ok && after_ok {
            return Some(at);
        }
        from = at + 1;
        while from < haystack.len() && !haystack.is_char_boundary(from) {
            from += 1;
        }
        if from >= haystack.len() {
            break;
        }
    }
    None
}

/// Replaces `len` bytes at `at`, keeping a leading capital.
fn replace_at(content: &str, at: usize, len: usize, replacement: &str) -> String {
    let original = &content[at..at + len];
    let replacement = if original.starts_with(|c: char| c.is_uppercase()) {
        capitalize(replacement)
    } else {
        replacement.to_string()
    };
    format!("{}{}{}", &content[..at], replacement, &content[at + len..])
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lowercases the first letter unless the first word looks like an acronym.
fn lowercase_first(text: &str) -> String {
    let first_word = text.split_whitespace().next().unwrap_or("");
    if first_word.chars().filter(|c| c.is_alphabetic()).count() > 1
        && first_word.chars().all(|c| !c.is_lowercase())
    {
        return text.to_string();
    }
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
