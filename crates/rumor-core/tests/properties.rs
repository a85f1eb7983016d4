use proptest::prelude::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::collections::{BTreeMap, BTreeSet};

use rumor_core::believability::{BelievabilityInput, BelievabilityModel};
use rumor_core::components::Position;
use rumor_core::matcher::{similarity, MatchCandidate, MergeSide, SimilarityMatcher};
use rumor_core::mutation::MutationEngine;
use rumor_core::{RumorEngine, SpreadOutcome, SpreadRequest, TickClock};
use rumor_events::{Severity, SimTimestamp, Variant};

fn rank(severity: Severity) -> i32 {
    Severity::all().iter().position(|s| *s == severity).unwrap_or(0) as i32
}

fn severity_strategy() -> impl Strategy<Value = Severity> {
    prop::sample::select(Severity::all().to_vec())
}

fn variant(content: &str) -> Variant {
    Variant {
        id: "variant_00000001".into(),
        content: content.into(),
        created_at: SimTimestamp::start(),
        parent_variant_id: None,
        entity_id: "agent_0001".into(),
        mutation_metadata: BTreeMap::new(),
    }
}

proptest! {
    #[test]
    fn believability_stays_in_unit_range(
        truth in -5.0f64..5.0,
        depth in 0u32..30,
        relationship in -5.0f64..5.0,
        bias in -5.0f64..5.0,
        existing in prop::option::of(-2.0f64..2.0),
    ) {
        let model = BelievabilityModel::default();
        let b = model.compute(&BelievabilityInput {
            truth_value: truth,
            relay_depth: depth,
            relationship,
            receiver_bias: bias,
            existing,
        });
        prop_assert!((0.0..=1.0).contains(&b), "believability {} out of range", b);
    }

    #[test]
    fn reinforcement_never_lowers_belief(existing in 0.0f64..=1.0, fresh in 0.0f64..=1.0) {
        let model = BelievabilityModel::default();
        let after = model.reinforce(existing, fresh);
        prop_assert!(after >= existing);
        prop_assert!(after <= 1.0);
    }

    #[test]
    fn mutation_respects_bounds(
        content in "[A-Za-z][A-Za-z ]{0,60}",
        truth in 0.0f64..=1.0,
        severity in severity_strategy(),
        seed in any::<u64>(),
    ) {
        let engine = MutationEngine::default();
        let mut rng = SmallRng::seed_from_u64(seed);
        let mutation = engine
            .mutate(&variant(&content), truth, severity, 1.0, &mut rng)
            .expect("probability 1 always mutates");

        prop_assert!(!mutation.content.trim().is_empty());
        prop_assert!((0.0..=1.0).contains(&mutation.truth_value));
        prop_assert!((mutation.truth_value - truth).abs() <= 0.1 + 1e-9);
        prop_assert!((rank(mutation.severity) - rank(severity)).abs() <= 1);
    }

    #[test]
    fn mutation_never_fires_at_zero_probability(content in "[a-z ]{1,40}", seed in any::<u64>()) {
        let engine = MutationEngine::default();
        let mut rng = SmallRng::seed_from_u64(seed);
        prop_assert!(engine
            .mutate(&variant(&content), 0.5, Severity::Minor, 0.0, &mut rng)
            .is_none());
    }

    #[test]
    fn similarity_is_symmetric(a in "[a-z !,.]{0,40}", b in "[a-z !,.]{0,40}") {
        prop_assert_eq!(similarity(&a, &b), similarity(&b, &a));
        let s = similarity(&a, &b);
        prop_assert!((0.0..=1.0).contains(&s));
    }

    #[test]
    fn match_decision_is_symmetric(
        a in "[a-z ]{1,30}",
        b in "[a-z ]{1,30}",
        shared in any::<bool>(),
    ) {
        let matcher = SimilarityMatcher::default();
        let danger: BTreeSet<String> = ["danger".to_string()].into_iter().collect();
        let other: BTreeSet<String> = if shared {
            danger.clone()
        } else {
            ["political".to_string()].into_iter().collect()
        };
        let first = MatchCandidate {
            id: "rumor_00000001",
            content: &a,
            categories: &danger,
            created_at: SimTimestamp::at(10),
        };
        let second = MatchCandidate {
            id: "rumor_00000002",
            content: &b,
            categories: &other,
            created_at: SimTimestamp::at(20),
        };

        let forward = matcher.decide(&first, &second);
        let backward = matcher.decide(&second, &first);
        prop_assert_eq!(forward.is_some(), backward.is_some());
        if !shared {
            prop_assert!(forward.is_none());
        }
        if let (Some(f), Some(r)) = (forward, backward) {
            prop_assert_eq!(f.primary, MergeSide::First);
            prop_assert_eq!(r.primary, MergeSide::Second);
            prop_assert_eq!(&f.categories, &danger);
            prop_assert_eq!(f.categories, r.categories);
        }
    }

    #[test]
    fn mutation_keeps_variant_with_its_rumor(seed in any::<u64>()) {
        let mut engine = RumorEngine::with_defaults(TickClock::new());
        let id = engine
            .create_rumor("agent_0001", "Bandits on the road", ["danger"], Severity::Moderate, 0.7)
            .unwrap();
        let mut rng = SmallRng::seed_from_u64(seed);
        let request = SpreadRequest::new(&id, "agent_0001", "agent_0002").with_mutation_probability(1.0);

        let outcome = engine.spread_rumor(&request, &mut rng).unwrap();
        let SpreadOutcome::Delivered { variant_id, mutated, .. } = outcome else {
            return Err(TestCaseError::fail("spread from the originator must deliver"));
        };
        prop_assert!(mutated);
        prop_assert_eq!(engine.store().owner_of(&variant_id), Some(id.as_str()));
        prop_assert_eq!(engine.store().len(), 1);
        let rumor = engine.store().get(&id).unwrap();
        prop_assert!(rumor.has_variant(&variant_id));
        prop_assert!((0.0..=1.0).contains(&rumor.variant_truth(&variant_id)));
        prop_assert!((0.0..=1.0).contains(&rumor.truth_value));
        prop_assert!((rumor.truth_value - 0.7).abs() <= 0.1 + 1e-9);
    }

    #[test]
    fn out_of_range_never_writes(distance in 50.001f64..1_000.0, seed in any::<u64>()) {
        let mut engine = RumorEngine::with_defaults(TickClock::new());
        let id = engine
            .create_rumor("agent_0001", "Bandits on the road", ["danger"], Severity::Moderate, 0.7)
            .unwrap();
        engine.drain_events();
        let mut rng = SmallRng::seed_from_u64(seed);

        let outcome = engine
            .try_share_rumor(
                &SpreadRequest::new(&id, "agent_0001", "agent_0002"),
                &Position::new(0.0, 0.0).into(),
                &Position::new(distance, 0.0).into(),
                &mut rng,
            )
            .unwrap();
        let out_of_range = matches!(outcome, SpreadOutcome::OutOfRange { .. });
        prop_assert!(out_of_range);
        prop_assert!(engine.store().spread(&id, "agent_0002").is_none());
        prop_assert!(engine.drain_events().is_empty());
    }
}
