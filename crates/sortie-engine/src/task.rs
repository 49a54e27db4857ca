//! Resumable tasks and their suspension outcomes.
//!
//! A [`Task`] is an explicit state machine. The engine calls
//! [`Task::step`] with a [`TaskContext`] that is the only way to read or
//! write simulation state; the returned [`TaskStatus`] says whether the task
//! is finished or on what it is suspended. Nothing blocks: every suspension
//! hands control back to the engine.

use std::fmt;

use serde::{Deserialize, Serialize};
use sortie_core::{Duration, SerializedValue, TaskId, TimeError};
use sortie_history::HistoryError;
use thiserror::Error;

use crate::activity::InstantiationError;
use crate::condition::Condition;
use crate::context::TaskContext;

// ── TaskStatus ──────────────────────────────────────────────────

/// What a task wants after one step.
pub enum TaskStatus {
    /// Done. The optional value becomes the activity's computed attributes.
    Completed(Option<SerializedValue>),
    /// Resume after the given non-negative delay.
    Delayed(Duration),
    /// Resume once the given task has terminated.
    AwaitingTask(TaskId),
    /// Resume once every child spawned so far has terminated.
    AwaitingChildren,
    /// Resume at the earliest instant the condition holds.
    AwaitingCondition(Box<dyn Condition>),
}

impl TaskStatus {
    /// `Completed(None)`.
    pub fn done() -> Self {
        Self::Completed(None)
    }

    /// `Delayed(d)`.
    pub fn delay(d: Duration) -> Self {
        Self::Delayed(d)
    }

    /// `AwaitingCondition` over any condition.
    pub fn wait_until(condition: impl Condition + 'static) -> Self {
        Self::AwaitingCondition(Box::new(condition))
    }

    /// True for [`TaskStatus::Completed`].
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

impl fmt::Debug for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed(value) => f.debug_tuple("Completed").field(value).finish(),
            Self::Delayed(d) => f.debug_tuple("Delayed").field(d).finish(),
            Self::AwaitingTask(id) => f.debug_tuple("AwaitingTask").field(id).finish(),
            Self::AwaitingChildren => f.write_str("AwaitingChildren"),
            Self::AwaitingCondition(_) => f.write_str("AwaitingCondition(..)"),
        }
    }
}

// ── TaskFailure ─────────────────────────────────────────────────

/// A task's own explanation of why it cannot continue.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct TaskFailure {
    /// Human-readable reason.
    pub reason: String,
}

impl TaskFailure {
    /// A failure with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<HistoryError> for TaskFailure {
    fn from(e: HistoryError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<InstantiationError> for TaskFailure {
    fn from(e: InstantiationError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<TimeError> for TaskFailure {
    fn from(e: TimeError) -> Self {
        Self::new(e.to_string())
    }
}

// ── Task ────────────────────────────────────────────────────────

/// A resumable unit of activity behavior.
///
/// `step` runs until the next suspension point. State that must survive a
/// suspension lives in `self`.
pub trait Task: Send {
    /// Advance to the next suspension point.
    fn step(&mut self, ctx: &mut TaskContext<'_>) -> Result<TaskStatus, TaskFailure>;
}

impl<F> Task for F
where
    F: FnMut(&mut TaskContext<'_>) -> Result<TaskStatus, TaskFailure> + Send,
{
    fn step(&mut self, ctx: &mut TaskContext<'_>) -> Result<TaskStatus, TaskFailure> {
        self(ctx)
    }
}

/// Box a closure as a task, pinning down its signature for inference.
pub fn task_fn<F>(f: F) -> Box<dyn Task>
where
    F: FnMut(&mut TaskContext<'_>) -> Result<TaskStatus, TaskFailure> + Send + 'static,
{
    Box::new(f)
}

/// A task that runs a body once and completes.
pub struct OneShot<F> {
    body: Option<F>,
}

impl<F> Task for OneShot<F>
where
    F: FnOnce(&mut TaskContext<'_>) -> Result<(), TaskFailure> + Send,
{
    fn step(&mut self, ctx: &mut TaskContext<'_>) -> Result<TaskStatus, TaskFailure> {
        if let Some(body) = self.body.take() {
            body(ctx)?;
        }
        Ok(TaskStatus::done())
    }
}

/// Box a run-once body as a task.
pub fn one_shot<F>(body: F) -> Box<dyn Task>
where
    F: FnOnce(&mut TaskContext<'_>) -> Result<(), TaskFailure> + Send + 'static,
{
    Box::new(OneShot { body: Some(body) })
}

// ── TaskState ───────────────────────────────────────────────────

/// Externally visible lifecycle state of a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Scheduled, not yet stepped.
    NotStarted,
    /// Stepped at least once, not yet terminated. Includes tasks that have
    /// returned but still wait on children.
    Running,
    /// Terminated: returned `Completed` and every child terminated.
    Completed,
    /// Returned an error.
    Failed,
}

impl TaskState {
    /// True once nothing more will happen to the task.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

// ── Id generation ───────────────────────────────────────────────

/// Monotonic task id source. Ids double as spawn-sequence numbers.
#[derive(Debug, Default)]
pub(crate) struct TaskIdGen {
    next: u64,
}

impl TaskIdGen {
    pub(crate) fn next(&mut self) -> TaskId {
        let id = TaskId(self.next);
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sequential() {
        let mut ids = TaskIdGen::default();
        assert_eq!(ids.next(), TaskId(0));
        assert_eq!(ids.next(), TaskId(1));
        assert_eq!(ids.next(), TaskId(2));
    }

    #[test]
    fn status_debug_hides_condition() {
        let status = TaskStatus::AwaitingCondition(crate::condition::condition_fn(|_, _| {
            Ok(Some(Duration::ZERO))
        }));
        assert_eq!(format!("{status:?}"), "AwaitingCondition(..)");
        assert_eq!(
            format!("{:?}", TaskStatus::delay(Duration::SECOND)),
            "Delayed(Duration(1000000))"
        );
    }

    #[test]
    fn failure_conversions_keep_message() {
        let f: TaskFailure = HistoryError::NodeLimit.into();
        assert_eq!(f.reason, HistoryError::NodeLimit.to_string());
        assert_eq!(TaskFailure::new("boom").to_string(), "boom");
    }

    #[test]
    fn terminal_states() {
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(!TaskState::Running.is_terminal());
        assert!(!TaskState::NotStarted.is_terminal());
    }
}
