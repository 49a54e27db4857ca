//! Discrete-event engine for Sortie mission simulation.
//!
//! Provides the [`Engine`] that runs activity tasks over the branching
//! history, the [`MissionModel`] they are defined against, results assembly
//! ([`assemble`]), the one-shot [`simulate`] driver, and the
//! [`IncrementalSimulationDriver`] for planners that grow a schedule one
//! directive at a time.
//!
//! # Architecture
//!
//! ```text
//! Schedule ──► Engine::schedule_directive ──► ReadyQueue (instant, seq)
//!                                                 │ batch per instant
//!                                                 ▼
//!                        Task::step(&mut TaskContext) on a forked branch
//!                                                 │ merge via EffectTrait
//!                                                 ▼
//!                           trunk commit ──► SimulationResults
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod activity;
pub mod condition;
pub mod config;
pub mod constraint;
pub mod context;
pub mod driver;
pub mod engine;
pub mod error;
pub mod incremental;
pub mod metrics;
pub mod model;
mod queue;
pub mod results;
pub mod task;

pub use activity::{
    arg_duration, arg_f64, arg_i64, arg_str, ActivityType, ArgumentFailure, InstantiationError,
};
pub use condition::{condition_fn, when_at_least, when_at_most, when_between, Condition};
pub use config::{ConfigError, EngineConfig, SimulationConfig};
pub use constraint::{Constraint, ConstraintKind, Violation};
pub use context::TaskContext;
pub use driver::{simulate, simulate_with};
pub use engine::{Commit, Engine, EngineStatus};
pub use error::{ModelError, SimulationError};
pub use incremental::IncrementalSimulationDriver;
pub use metrics::RunMetrics;
pub use model::{MissionModel, MissionModelBuilder};
pub use results::{
    assemble, ProfileSegment, SimulatedActivity, SimulationResults, UnfinishedActivity,
};
pub use task::{one_shot, task_fn, Task, TaskFailure, TaskState, TaskStatus};
