//! Similarity Matcher
//!
//! Decides whether two rumors are the same story told differently.
//!
//! Similarity is lexical: the mean of token Jaccard similarity and
//! normalized Levenshtein similarity over normalized text (lowercase,
//! punctuation stripped, whitespace collapsed). Two rumors merge when the
//! score reaches the threshold and their categories overlap.

use rumor_events::SimTimestamp;
use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::config::MatchingConfig;

/// What the matcher needs to know about one side of a comparison.
#[derive(Debug, Clone, Copy)]
pub struct MatchCandidate<'a> {
    pub id: &'a str,
    pub content: &'a str,
    pub categories: &'a BTreeSet<String>,
    pub created_at: SimTimestamp,
}

/// Which argument of a comparison survives a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeSide {
    First,
    Second,
}

/// Outcome of a successful match.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeDecision {
    pub similarity: f64,
    /// The earlier-created side
    pub primary: MergeSide,
    /// Category set of the primary side
    pub categories: BTreeSet<String>,
    /// Union of both sides' categories
    pub supplementary_categories: BTreeSet<String>,
}

/// Lowercase, strip punctuation, collapse whitespace.
pub fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else if c.is_whitespace() || c == '-' || c == '/' {
                ' '
            } else {
                '\0'
            }
        })
        .filter(|c| *c != '\0')
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Token set of already-normalized text.
pub fn tokenize(normalized: &str) -> BTreeSet<&str> {
    normalized.split_whitespace().collect()
}

/// Jaccard similarity of two token sets. Two empty sets are identical.
///
/// J(A, B) = |A ∩ B| / |A ∪ B|
pub fn jaccard(a: &BTreeSet<&str>, b: &BTreeSet<&str>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 1.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Character-level edit distance.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// 1 - distance / longer length, in [0, 1].
pub fn levenshtein_similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

/// Lexical similarity of two texts, in [0, 1]. Symmetric.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    let token_score = jaccard(&tokenize(&a), &tokenize(&b));
    let edit_score = levenshtein_similarity(&a, &b);
    ((token_score + edit_score) / 2.0).clamp(0.0, 1.0)
}

/// Merge decisions for rumor pairs.
#[derive(Debug, Clone)]
pub struct SimilarityMatcher {
    threshold: f64,
}

impl Default for SimilarityMatcher {
    fn default() -> Self {
        Self::from_config(&MatchingConfig::default())
    }
}

impl SimilarityMatcher {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn from_config(config: &MatchingConfig) -> Self {
        Self::new(config.similarity_threshold)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Merge decision for two rumors, or None if they are different stories.
    ///
    /// The earlier-created side is primary; ties go to the smaller id, then
    /// to the first argument.
    pub fn decide(&self, a: &MatchCandidate<'_>, b: &MatchCandidate<'_>) -> Option<MergeDecision> {
        let overlapping = (a.categories.is_empty() && b.categories.is_empty())
            || !a.categories.is_disjoint(b.categories);
        if !overlapping {
            return None;
        }

        let score = similarity(a.content, b.content);
        if score < self.threshold {
            return None;
        }

        let primary = match a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(b.id)) {
            Ordering::Greater => MergeSide::Second,
            Ordering::Less | Ordering::Equal => MergeSide::First,
        };
        let categories = match primary {
            MergeSide::First => a.categories.clone(),
            MergeSide::Second => b.categories.clone(),
        };

        Some(MergeDecision {
            similarity: score,
            primary,
            categories,
            supplementary_categories: a.categories.union(b.categories).cloned().collect(),
        })
    }

    /// Compares bare content and categories. The first argument wins ties.
    pub fn match_content(
        &self,
        content_a: &str,
        categories_a: &BTreeSet<String>,
        content_b: &str,
        categories_b: &BTreeSet<String>,
    ) -> Option<MergeDecision> {
        let a = MatchCandidate {
            id: "",
            content: content_a,
            categories: categories_a,
            created_at: SimTimestamp::start(),
        };
        let b = MatchCandidate {
            content: content_b,
            categories: categories_b,
            ..a
        };
        self.decide(&a, &b)
    }
}
