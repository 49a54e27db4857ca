//! Integration test: reproducibility and merge-order independence.
//!
//! The same schedule must always produce byte-identical results, and the
//! order in which same-instant directives are listed must not change any
//! resource profile when the effects involved commute.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use serde_json::json;
use sortie_core::{Arguments, Directive, SerializedActivity};
use sortie_engine::{simulate, simulate_with, EngineConfig, SimulationConfig};
use sortie_history::HistoryConfig;
use sortie_test_utils::{random_schedule, schedule_of, secs, Banana};

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
}

#[test]
fn repeated_runs_are_identical() {
    let banana = Banana::new().unwrap();
    for seed in [1, 2, 3] {
        let schedule = random_schedule(seed, 40, 60);
        let first = simulate(Arc::clone(&banana.model), &schedule, epoch(), secs(90)).unwrap();
        let second = simulate(Arc::clone(&banana.model), &schedule, epoch(), secs(90)).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}

#[test]
fn snapshot_interval_does_not_change_results() {
    let banana = Banana::new().unwrap();
    let schedule = random_schedule(11, 30, 40);
    let run = |interval: usize| {
        let mut config = SimulationConfig::new(epoch(), secs(60));
        config.engine = EngineConfig {
            history: HistoryConfig {
                snapshot_interval: interval,
            },
            ..EngineConfig::default()
        };
        simulate_with(Arc::clone(&banana.model), &schedule, &config).unwrap()
    };
    assert_eq!(run(1), run(64));
}

fn pick(quantity: u32) -> Directive {
    Directive::at(
        secs(1),
        SerializedActivity::new("PickBanana", Arguments::new())
            .with_argument("quantity", json!(f64::from(quantity))),
    )
}

proptest! {
    #[test]
    fn same_instant_picks_commute(a in 1u32..1000, b in 1u32..1000) {
        let banana = Banana::new().unwrap();
        let forward = simulate(
            Arc::clone(&banana.model),
            &schedule_of([pick(a), pick(b)]),
            epoch(),
            secs(2),
        )
        .unwrap();
        let backward = simulate(
            Arc::clone(&banana.model),
            &schedule_of([pick(b), pick(a)]),
            epoch(),
            secs(2),
        )
        .unwrap();

        let expected = 4.0 - f64::from(a) - f64::from(b);
        let last = forward.real_profiles["/fruit"].last().unwrap().dynamics.initial;
        prop_assert!((last - expected).abs() < 1e-9);
        prop_assert_eq!(&forward.real_profiles, &backward.real_profiles);
        prop_assert_eq!(&forward.constraint_violations, &backward.constraint_violations);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn random_schedules_replay_identically(seed in any::<u64>()) {
        let banana = Banana::new().unwrap();
        let schedule = random_schedule(seed, 25, 30);
        let first = simulate(Arc::clone(&banana.model), &schedule, epoch(), secs(45)).unwrap();
        let second = simulate(Arc::clone(&banana.model), &schedule, epoch(), secs(45)).unwrap();
        prop_assert_eq!(first, second);
    }
}
