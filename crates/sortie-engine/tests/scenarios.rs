//! Integration test: end-to-end scenarios on the banana model.
//!
//! Covers profile steps from instantaneous effects, concurrent merges
//! through a summing effect algebra, and argument validation that rejects a
//! schedule before any simulated time passes.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use sortie_cells::{AccumulatorCell, LinearEffect};
use sortie_core::{
    ActivityDirectiveId, Arguments, Directive, Duration, Parameter, RealDynamics,
    SerializedActivity, ValueSchema, Window,
};
use sortie_engine::{
    arg_f64, one_shot, simulate, ActivityType, ArgumentFailure, Engine, EngineConfig,
    InstantiationError, MissionModel, SimulationError,
};
use sortie_history::Querier;
use sortie_test_utils::{directive_at, init_tracing, schedule_of, secs, Banana, BananaConfig};

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

// ── Profile steps ───────────────────────────────────────────────

#[test]
fn pick_and_bite_step_the_fruit_profile() {
    init_tracing();
    let banana = Banana::build(&BananaConfig {
        fruit_rate: -0.01,
        ..BananaConfig::default()
    })
    .unwrap();
    let schedule = schedule_of([
        directive_at(0, "PickBanana"),
        Directive::at(
            secs(2),
            SerializedActivity::new("BiteBanana", Arguments::new())
                .with_argument("biteSize", json!(0.1)),
        ),
    ]);

    let results = simulate(Arc::clone(&banana.model), &schedule, epoch(), secs(5)).unwrap();

    assert_eq!(results.timestamps, vec![Duration::ZERO, Duration::ZERO, secs(2)]);
    let fruit = &results.real_profiles["/fruit"];
    assert_eq!(fruit.len(), 3);

    // Initial state, replaced at once by the pick.
    assert_eq!(fruit[0].start, Duration::ZERO);
    assert_eq!(fruit[0].extent, Duration::ZERO);
    assert_eq!(fruit[0].dynamics, RealDynamics::linear(4.0, -0.01));

    assert_eq!(fruit[1].start, Duration::ZERO);
    assert_eq!(fruit[1].extent, secs(2));
    assert_close(fruit[0].dynamics.initial - fruit[1].dynamics.initial, 10.0);

    assert_eq!(fruit[2].start, secs(2));
    assert_eq!(fruit[2].extent, secs(3));
    let before_bite = fruit[1].dynamics.value_at(fruit[1].extent);
    assert_close(before_bite - fruit[2].dynamics.initial, 0.1);
    assert_close(fruit[2].dynamics.rate, -0.01);
}

#[test]
fn negative_fruit_is_reported_as_a_violation() {
    let banana = Banana::new().unwrap();
    let schedule = schedule_of([directive_at(1, "PickBanana")]);

    let results = simulate(Arc::clone(&banana.model), &schedule, epoch(), secs(5)).unwrap();

    assert_eq!(results.constraint_violations.len(), 1);
    let violation = &results.constraint_violations[0];
    assert_eq!(violation.constraint, "fruit is non-negative");
    assert_eq!(violation.resource_names, vec!["/fruit".to_owned()]);
    assert_eq!(violation.windows, vec![Window::new(secs(1), secs(5))]);
}

#[test]
fn unknown_producer_is_reported_as_a_violation() {
    let banana = Banana::new().unwrap();
    let schedule = schedule_of([Directive::at(
        secs(2),
        SerializedActivity::new("ChangeProducer", Arguments::new())
            .with_argument("producer", json!("Fyffes")),
    )]);

    let results = simulate(Arc::clone(&banana.model), &schedule, epoch(), secs(5)).unwrap();

    let producer = &results.discrete_profiles["/producer"];
    assert_eq!(producer.last().unwrap().dynamics, json!("Fyffes"));
    let violation = results
        .constraint_violations
        .iter()
        .find(|v| v.constraint == "producer is known")
        .unwrap();
    assert_eq!(violation.windows, vec![Window::new(secs(2), secs(5))]);
}

// ── Concurrent merges ───────────────────────────────────────────

fn deposit_model() -> Arc<MissionModel> {
    let mut b = MissionModel::builder();
    let (balance, topic) = b.allocate_with_topic("balance", AccumulatorCell::new(0.0, 0.0));
    b.real_resource("/balance", move |q: &mut Querier<'_>| {
        q.get(&balance, |c| c.dynamics())
    });
    b.activity_type(
        ActivityType::new("Deposit", move |args| {
            let amount = arg_f64(args, "amount")?;
            Ok(one_shot(move |ctx| {
                ctx.emit(&topic, LinearEffect::volume(amount))?;
                Ok(())
            }))
        })
        .parameter(Parameter::required("amount", ValueSchema::Real)),
    );
    Arc::new(b.build().unwrap())
}

fn deposit(amount: f64) -> Directive {
    Directive::at(
        Duration::ZERO,
        SerializedActivity::new("Deposit", Arguments::new()).with_argument("amount", json!(amount)),
    )
}

#[test]
fn sibling_deposits_sum_regardless_of_order() {
    let model = deposit_model();
    for amounts in [[3.0, 7.0], [7.0, 3.0]] {
        let schedule = schedule_of(amounts.map(deposit));
        let results = simulate(Arc::clone(&model), &schedule, epoch(), secs(1)).unwrap();
        let balance = &results.real_profiles["/balance"];
        assert_eq!(balance.last().unwrap().dynamics, RealDynamics::constant(10.0));
    }
}

#[test]
fn same_instant_directives_share_one_batch() {
    let model = deposit_model();
    let mut engine = Engine::new(model, EngineConfig::default()).unwrap();
    let schedule = schedule_of([deposit(3.0), deposit(7.0)]);
    for (id, directive) in schedule.iter() {
        engine.schedule_directive(id, directive).unwrap();
    }
    engine.run_to_completion().unwrap();

    let metrics = engine.metrics();
    assert_eq!(metrics.batches, 1);
    assert_eq!(metrics.merges, 1);
    assert_eq!(metrics.commits, 1);
    assert_eq!(metrics.events_emitted, 2);
    assert_eq!(engine.commits().len(), 2);
}

// ── Argument validation ─────────────────────────────────────────

#[test]
fn missing_required_argument_is_rejected_before_time_passes() {
    let banana = Banana::new().unwrap();
    let mut engine = Engine::new(Arc::clone(&banana.model), EngineConfig::default()).unwrap();
    let valid = directive_at(0, "PickBanana");
    let missing = directive_at(0, "ControllableDurationActivity");

    engine.schedule_directive(ActivityDirectiveId(1), &valid).unwrap();
    let err = engine
        .schedule_directive(ActivityDirectiveId(2), &missing)
        .unwrap_err();

    let SimulationError::Instantiation { directive, source } = err else {
        panic!("expected an instantiation error, got {err:?}");
    };
    assert_eq!(directive, ActivityDirectiveId(2));
    assert_eq!(
        source.failures(),
        &[ArgumentFailure::Missing {
            parameter: "duration".to_owned()
        }]
    );
    assert_eq!(engine.now(), Duration::ZERO);
    assert_eq!(engine.metrics().batches, 0);
    assert_eq!(engine.commits().len(), 1);
}

#[test]
fn simulate_rejects_a_bad_schedule_up_front() {
    let banana = Banana::new().unwrap();
    let schedule = schedule_of([
        directive_at(0, "PickBanana"),
        Directive::at(
            secs(1),
            SerializedActivity::new("PickBanana", Arguments::new())
                .with_argument("quantity", json!("lots"))
                .with_argument("colour", json!("yellow")),
        ),
    ]);

    let err = simulate(Arc::clone(&banana.model), &schedule, epoch(), secs(5)).unwrap_err();

    let SimulationError::Instantiation { directive, source } = err else {
        panic!("expected an instantiation error, got {err:?}");
    };
    assert_eq!(directive, ActivityDirectiveId(2));
    let parameters: Vec<&str> = source.failures().iter().map(|f| f.parameter()).collect();
    assert_eq!(parameters, vec!["quantity", "colour"]);
    assert!(matches!(
        source.failures()[0],
        ArgumentFailure::Unconstructable { .. }
    ));
}

#[test]
fn unknown_activity_type_is_rejected() {
    let banana = Banana::new().unwrap();
    let schedule = schedule_of([directive_at(0, "EatBanana")]);
    let err = simulate(Arc::clone(&banana.model), &schedule, epoch(), secs(5)).unwrap_err();
    assert_eq!(
        err,
        SimulationError::Instantiation {
            directive: ActivityDirectiveId(1),
            source: InstantiationError::UnknownType {
                type_name: "EatBanana".to_owned()
            },
        }
    );
}
