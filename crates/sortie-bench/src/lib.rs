//! Benchmark profiles for the Sortie simulation core.
//!
//! Provides pre-built schedules against the banana model:
//!
//! - [`reference_profile`]: 200 mixed directives over 10 minutes
//! - [`stress_profile`]: 2 000 mixed directives over an hour
//! - [`bite_chain`]: one bite per second, for long trunk histories

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use serde_json::json;
use sortie_core::{Arguments, Directive, Duration, Schedule, SerializedActivity};
use sortie_test_utils::{random_schedule, schedule_of, secs};

/// Horizon for [`reference_profile`].
pub const REFERENCE_HORIZON: Duration = Duration::from_micros(600 * 1_000_000);

/// Horizon for [`stress_profile`].
pub const STRESS_HORIZON: Duration = Duration::from_micros(3_600 * 1_000_000);

/// 200 seeded directives spread over [`REFERENCE_HORIZON`].
pub fn reference_profile(seed: u64) -> Schedule {
    random_schedule(seed, 200, 600)
}

/// 2 000 seeded directives spread over [`STRESS_HORIZON`].
pub fn stress_profile(seed: u64) -> Schedule {
    random_schedule(seed, 2_000, 3_600)
}

/// `count` bites, one per second from t=1s. Every bite commits a new
/// trunk point, so queries at the end replay `count` effects.
pub fn bite_chain(count: usize) -> Schedule {
    schedule_of((1..=count as i64).map(|i| {
        Directive::at(
            secs(i),
            SerializedActivity::new("BiteBanana", Arguments::new())
                .with_argument("biteSize", json!(0.001)),
        )
    }))
}
