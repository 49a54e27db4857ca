//! Test utilities for Sortie development.
//!
//! Provides the "banana" mission model ([`Banana`]) used throughout the
//! engine tests and benches, directive helpers and a seeded random schedule
//! generator ([`random_schedule`]), and [`init_tracing`] for getting engine
//! logs out of a failing test.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;
pub mod schedule;

pub use fixtures::{Banana, BananaConfig};
pub use schedule::{directive_at, random_schedule, schedule_of, secs};

use tracing_subscriber::EnvFilter;

/// Install a test-friendly `tracing` subscriber.
///
/// Honors `RUST_LOG` and defaults to `warn`. Safe to call from every test:
/// only the first call installs anything.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
