//! Engine-level error types.
//!
//! [`SimulationError`] is what every public engine, driver, and incremental
//! driver operation returns. Suspension outcomes (a condition not yet true,
//! a child not yet finished) are never errors; everything here stops the
//! run and is surfaced to the caller.

use sortie_core::{ActivityDirectiveId, Duration, TaskId, TimeError};
use sortie_history::HistoryError;
use thiserror::Error;

use crate::activity::InstantiationError;
use crate::config::ConfigError;
use crate::task::TaskFailure;

/// Errors raised while assembling a mission model.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ModelError {
    /// Two activity types share a name.
    #[error("activity type '{name}' is registered twice")]
    DuplicateActivityType {
        /// The repeated name.
        name: String,
    },
    /// Two resources share a name.
    #[error("resource '{name}' is registered twice")]
    DuplicateResource {
        /// The repeated name.
        name: String,
    },
    /// A constraint names a resource the model does not define.
    #[error("constraint '{constraint}' refers to unknown resource '{resource}'")]
    UnknownResource {
        /// The offending constraint.
        constraint: String,
        /// The missing resource.
        resource: String,
    },
    /// Cell or topic registration failed.
    #[error(transparent)]
    Registry(#[from] HistoryError),
}

/// Errors from building, running, or reading a simulation.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum SimulationError {
    /// Configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The mission model is malformed.
    #[error(transparent)]
    Model(#[from] ModelError),
    /// A directive could not be turned into a task.
    #[error("{directive} cannot be instantiated")]
    Instantiation {
        /// The offending directive.
        directive: ActivityDirectiveId,
        /// Structured per-parameter detail.
        source: InstantiationError,
    },
    /// The history rejected an operation (including effect conflicts).
    #[error(transparent)]
    History(#[from] HistoryError),
    /// Time arithmetic overflowed.
    #[error(transparent)]
    Time(#[from] TimeError),
    /// A task reported failure. Fatal to the run.
    #[error("{} {task} failed at {at}", .activity.as_deref().unwrap_or("anonymous"))]
    TaskFailed {
        /// The failing task.
        task: TaskId,
        /// Activity type name, if the task is an activity.
        activity: Option<String>,
        /// Simulated time of the failure.
        at: Duration,
        /// The task's own explanation.
        #[source]
        failure: TaskFailure,
    },
    /// A task waited on an id the engine never issued.
    #[error("{waiter} waited on unknown {task}")]
    UnknownTask {
        /// The id waited on.
        task: TaskId,
        /// The waiting task.
        waiter: TaskId,
    },
    /// A task waited on itself.
    #[error("{task} waited on itself")]
    SelfWait {
        /// The offending task.
        task: TaskId,
    },
    /// Too many zero-time batches at one instant.
    #[error("{batches} batches at {at} without time advancing")]
    Livelock {
        /// The stuck instant.
        at: Duration,
        /// Batches run at that instant.
        batches: usize,
    },
    /// Something was scheduled before the engine's current time.
    #[error("cannot schedule at {at}, engine is already at {now}")]
    ScheduleInPast {
        /// Requested time.
        at: Duration,
        /// Current engine time.
        now: Duration,
    },
    /// A directive id not present in the schedule.
    #[error("{directive} is not in the schedule")]
    UnknownDirective {
        /// The missing directive.
        directive: ActivityDirectiveId,
    },
    /// A directive was scheduled twice on one engine.
    #[error("{directive} is already scheduled")]
    DuplicateDirective {
        /// The repeated directive.
        directive: ActivityDirectiveId,
    },
    /// A directive is anchored to one that does not exist.
    #[error("{directive} is anchored to unknown {anchor}")]
    UnknownAnchor {
        /// The anchored directive.
        directive: ActivityDirectiveId,
        /// The missing anchor.
        anchor: ActivityDirectiveId,
    },
    /// Anchors form a cycle.
    #[error("anchor cycle through {directive}")]
    AnchorCycle {
        /// A directive on the cycle.
        directive: ActivityDirectiveId,
    },
    /// The engine already failed; discard it and start a new one.
    #[error("engine is unusable after an earlier failure")]
    Poisoned,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn task_failure_names_activity() {
        let e = SimulationError::TaskFailed {
            task: TaskId(4),
            activity: Some("BiteBanana".into()),
            at: Duration::SECOND,
            failure: TaskFailure::new("no fruit"),
        };
        let text = e.to_string();
        assert!(text.starts_with("BiteBanana task#4"), "{text}");
        assert!(e.source().is_some());
    }

    #[test]
    fn anonymous_task_failure() {
        let e = SimulationError::TaskFailed {
            task: TaskId(1),
            activity: None,
            at: Duration::ZERO,
            failure: TaskFailure::new("boom"),
        };
        assert!(e.to_string().starts_with("anonymous task#1"));
    }
}
