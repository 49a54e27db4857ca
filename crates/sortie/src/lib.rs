//! Sortie: a discrete-event simulation core for mission planning.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! Sortie sub-crates. For most users, adding `sortie` as a single dependency
//! is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use chrono::{TimeZone, Utc};
//! use serde_json::json;
//! use sortie::prelude::*;
//! use sortie::history::Querier;
//!
//! // One accumulator, one activity that drains it.
//! let mut b = MissionModel::builder();
//! let (fuel, burn) = b.allocate_with_topic("fuel", AccumulatorCell::new(100.0, 0.0));
//! b.real_resource("/fuel", move |q: &mut Querier<'_>| q.get(&fuel, |c| c.dynamics()));
//! b.activity_type(
//!     ActivityType::new("Burn", move |args| {
//!         let amount = arg_f64(args, "amount")?;
//!         Ok(one_shot(move |ctx| {
//!             ctx.emit(&burn, LinearEffect::volume(-amount))?;
//!             Ok(())
//!         }))
//!     })
//!     .parameter(Parameter::optional("amount", ValueSchema::Real, json!(10.0))),
//! );
//! let model = Arc::new(b.build().unwrap());
//!
//! let mut schedule = Schedule::new();
//! let burn_at_5s = Directive::at(
//!     Duration::of(5, Duration::SECOND).unwrap(),
//!     SerializedActivity::new("Burn", Arguments::new()),
//! );
//! schedule.insert(ActivityDirectiveId(1), burn_at_5s);
//!
//! let epoch = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
//! let horizon = Duration::of(10, Duration::SECOND).unwrap();
//! let results = simulate(model, &schedule, epoch, horizon).unwrap();
//!
//! let fuel = &results.real_profiles["/fuel"];
//! assert_eq!(fuel.last().unwrap().dynamics.initial, 90.0);
//! assert_eq!(results.simulated_activities.len(), 1);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `sortie-core` | Clock, ids, cell and effect traits, directives |
//! | [`history`] | `sortie-history` | Branching history, registry, queries |
//! | [`cells`] | `sortie-cells` | Reference cells (accumulator, counter, register) |
//! | [`engine`] | `sortie-engine` | Tasks, engine, results, drivers |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`sortie-core`).
///
/// Contains the [`types::Duration`] clock, the [`types::Cell`] and
/// [`types::EffectTrait`] contract, typed handles, and the directive and
/// schedule vocabulary.
pub use sortie_core as types;

/// Branching history of cell effects (`sortie-history`).
///
/// Most users only touch [`history::Querier`] when defining resources and
/// conditions; the [`history::History`] itself is owned by the engine.
pub use sortie_history as history;

/// Reference cells (`sortie-cells`).
pub use sortie_cells as cells;

/// The discrete-event engine (`sortie-engine`).
///
/// [`engine::simulate`] for one-shot runs, [`engine::IncrementalSimulationDriver`]
/// for planners that grow a schedule one directive at a time.
pub use sortie_engine as engine;

/// Common imports for typical Sortie usage.
///
/// ```rust
/// use sortie::prelude::*;
/// ```
///
/// This imports the most frequently used types: the clock, directives and
/// schedules, the reference cells, the model builder, task building
/// blocks, and the drivers.
pub mod prelude {
    // Core types
    pub use sortie_core::{
        ActivityDirectiveId, Arguments, Cell, CellRef, Directive, Duration, EffectTrait,
        Parameter, RealDynamics, Schedule, SerializedActivity, SerializedValue, Topic,
        ValueSchema,
    };

    // Cells
    pub use sortie_cells::{
        AccumulatorCell, CounterCell, CounterEffect, LinearEffect, RegisterCell, SetEffect,
    };

    // Model and tasks
    pub use sortie_engine::{
        arg_duration, arg_f64, arg_i64, arg_str, one_shot, task_fn, when_at_least,
        when_at_most, when_between, ActivityType, Constraint, MissionModel, Task, TaskContext,
        TaskFailure, TaskStatus,
    };

    // Drivers and results
    pub use sortie_engine::{
        simulate, simulate_with, Engine, EngineConfig, IncrementalSimulationDriver,
        SimulationConfig, SimulationResults,
    };

    // Errors
    pub use sortie_engine::{InstantiationError, ModelError, SimulationError};
}
