//! The explicit scheduler context threaded through every task step.
//!
//! A [`TaskContext`] is the running task's exclusive handle on simulation
//! state for the duration of one `step`. It reads cells as of the task's
//! current branch tip, appends events to that branch, and collects spawn
//! requests for the engine to act on once the step returns.

use sortie_core::{Cell, CellRef, Duration, SerializedActivity, TaskId, Topic};
use sortie_history::{History, HistoryError, NodeId, Querier};

use crate::activity::InstantiationError;
use crate::engine::ActivityInfo;
use crate::model::MissionModel;
use crate::task::{Task, TaskFailure, TaskIdGen};

/// A child the running task asked to start.
pub(crate) struct SpawnRequest {
    pub(crate) id: TaskId,
    pub(crate) delay: Duration,
    /// Branch tip at the moment of the spawn; the child forks from here.
    pub(crate) at: NodeId,
    pub(crate) task: Box<dyn Task>,
    pub(crate) activity: Option<ActivityInfo>,
}

/// What a task may do while it holds control.
pub struct TaskContext<'a> {
    history: &'a mut History,
    model: &'a MissionModel,
    ids: &'a mut TaskIdGen,
    tip: NodeId,
    now: Duration,
    task: TaskId,
    spawns: Vec<SpawnRequest>,
    emitted: u64,
}

impl<'a> TaskContext<'a> {
    pub(crate) fn new(
        history: &'a mut History,
        model: &'a MissionModel,
        ids: &'a mut TaskIdGen,
        tip: NodeId,
        now: Duration,
        task: TaskId,
    ) -> Self {
        Self {
            history,
            model,
            ids,
            tip,
            now,
            task,
            spawns: Vec::new(),
            emitted: 0,
        }
    }

    /// Current simulated time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// The running task.
    pub fn task_id(&self) -> TaskId {
        self.task
    }

    /// The mission model being simulated.
    pub fn model(&self) -> &MissionModel {
        self.model
    }

    /// Read a cell as this task currently sees it, including its own
    /// emissions so far in this step.
    pub fn query<C: Cell, R>(
        &self,
        cell: &CellRef<C>,
        read: impl FnOnce(&C) -> R,
    ) -> Result<R, HistoryError> {
        self.history.query(self.tip, cell, read)
    }

    /// A tracked reader at this task's view, for resource functions.
    pub fn querier(&self) -> Result<Querier<'_>, HistoryError> {
        Querier::new(&*self.history, self.tip)
    }

    /// Emit an event on this task's branch.
    pub fn emit<E: Send + Sync + 'static>(
        &mut self,
        topic: &Topic<E>,
        event: E,
    ) -> Result<(), HistoryError> {
        self.tip = self.history.emit(self.tip, topic, event)?;
        self.emitted += 1;
        Ok(())
    }

    /// Start `task` as a child, running right after this step from the
    /// current point. Not joined automatically.
    pub fn spawn(&mut self, task: Box<dyn Task>) -> TaskId {
        self.push(Duration::ZERO, task, None)
    }

    /// Start `task` as a child after `delay`.
    pub fn spawn_after(&mut self, delay: Duration, task: Box<dyn Task>) -> Result<TaskId, TaskFailure> {
        if delay.is_negative() {
            return Err(TaskFailure::new(format!("cannot spawn {delay} in the past")));
        }
        Ok(self.push(delay, task, None))
    }

    /// Instantiate an activity from the model's catalog and start it as a
    /// child.
    pub fn spawn_activity(&mut self, activity: SerializedActivity) -> Result<TaskId, InstantiationError> {
        let (task, info) = self.instantiate(activity)?;
        Ok(self.push(Duration::ZERO, task, Some(info)))
    }

    /// Instantiate an activity and start it as a child after `delay`.
    pub fn spawn_activity_after(
        &mut self,
        delay: Duration,
        activity: SerializedActivity,
    ) -> Result<TaskId, TaskFailure> {
        if delay.is_negative() {
            return Err(TaskFailure::new(format!("cannot spawn {delay} in the past")));
        }
        let (task, info) = self.instantiate(activity)?;
        Ok(self.push(delay, task, Some(info)))
    }

    fn instantiate(
        &self,
        activity: SerializedActivity,
    ) -> Result<(Box<dyn Task>, ActivityInfo), InstantiationError> {
        let (arguments, task) = self.model.instantiate(&activity)?;
        Ok((
            task,
            ActivityInfo {
                type_name: activity.type_name,
                arguments,
                directive: None,
            },
        ))
    }

    fn push(&mut self, delay: Duration, task: Box<dyn Task>, activity: Option<ActivityInfo>) -> TaskId {
        let id = self.ids.next();
        self.spawns.push(SpawnRequest {
            id,
            delay,
            at: self.tip,
            task,
            activity,
        });
        id
    }

    /// Final tip, spawn requests, and emission count.
    pub(crate) fn finish(self) -> (NodeId, Vec<SpawnRequest>, u64) {
        (self.tip, self.spawns, self.emitted)
    }
}
