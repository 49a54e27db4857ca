//! Directive helpers and seeded random schedules.

use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::json;
use sortie_core::{ActivityDirectiveId, Arguments, Directive, Duration, Schedule, SerializedActivity};

/// `n` whole seconds.
pub fn secs(n: i64) -> Duration {
    Duration::from_micros(n.saturating_mul(Duration::SECOND.as_micros()))
}

/// A directive for `type_name` with no arguments, `start` seconds in.
pub fn directive_at(start: i64, type_name: &str) -> Directive {
    Directive::at(secs(start), SerializedActivity::new(type_name, Arguments::new()))
}

/// A schedule with ids `directive#1..=n` in the given order.
pub fn schedule_of(directives: impl IntoIterator<Item = Directive>) -> Schedule {
    directives
        .into_iter()
        .enumerate()
        .map(|(i, d)| (ActivityDirectiveId(i as u64 + 1), d))
        .collect()
}

/// `count` banana directives at whole-second offsets in `[0, horizon_secs)`.
///
/// Whole seconds make same-instant batches common. Only conflict-free
/// activities are drawn, so every generated schedule simulates cleanly.
pub fn random_schedule(seed: u64, count: usize, horizon_secs: u64) -> Schedule {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let horizon_secs = horizon_secs.max(1);
    let mut draw = |bound: u64| rng.next_u64() % bound;
    let directives: Vec<Directive> = (0..count)
        .map(|_| {
            let start = secs(draw(horizon_secs) as i64);
            let activity = match draw(6) {
                0 => SerializedActivity::new("PickBanana", Arguments::new())
                    .with_argument("quantity", json!(1 + draw(5))),
                1 => SerializedActivity::new("BiteBanana", Arguments::new())
                    .with_argument("biteSize", json!(0.5)),
                2 => SerializedActivity::new("GrowBanana", Arguments::new())
                    .with_argument("quantity", json!(2.0))
                    .with_argument("growingDuration", json!(secs(1 + draw(3) as i64).as_micros())),
                3 => SerializedActivity::new("BasicActivity", Arguments::new()),
                4 => SerializedActivity::new("ParentActivity", Arguments::new()),
                _ => SerializedActivity::new("ChangeProducer", Arguments::new())
                    .with_argument("producer", json!("Dole")),
            };
            Directive::at(start, activity)
        })
        .collect();
    schedule_of(directives)
}
