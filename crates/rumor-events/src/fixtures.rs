//! Sample data fixtures for testing.
//!
//! Ready-made rumor records for other crates' tests.
//! Enable the `test-fixtures` feature to access these helpers.
//!
//! # Example
//!
//! ```ignore
//! // In your Cargo.toml:
//! // [dev-dependencies]
//! // rumor-events = { path = "../rumor-events", features = ["test-fixtures"] }
//!
//! use rumor_events::fixtures;
//!
//! let rumors = fixtures::sample_rumors();
//! ```

use crate::RumorRecord;

/// Returns the sample rumor records from the fixtures file.
///
/// Contains 2 rumors:
/// - "Bandits on the road" (danger, moderate) with one mutated variant and
///   one propagated spread record
/// - "The king is ill" (political, major) known only to its originator, with
///   a propagation radius override
pub fn sample_rumors() -> Vec<RumorRecord> {
    let json = include_str!("../tests/fixtures/sample_rumors.json");
    serde_json::from_str(json).expect("Failed to parse sample_rumors.json")
}

/// Returns a specific rumor by ID from the sample rumors.
pub fn get_rumor(rumor_id: &str) -> Option<RumorRecord> {
    sample_rumors().into_iter().find(|r| r.id == rumor_id)
}

/// Returns the spread-once bandit rumor.
pub fn bandits_rumor() -> RumorRecord {
    get_rumor("rumor_00000001").expect("Bandit rumor should exist in fixtures")
}

/// Returns the never-spread king rumor.
pub fn king_rumor() -> RumorRecord {
    get_rumor("rumor_00000002").expect("King rumor should exist in fixtures")
}
