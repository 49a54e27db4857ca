//! The discrete-event loop.
//!
//! [`Engine`] owns the history, the task table, and the ready queue. Time
//! advances in batches: every job queued at the earliest instant runs in
//! one batch, each job on its own branch forked from the trunk, and the
//! branches are merged back through the cells' effect algebras. Jobs at the
//! same instant run in enqueue order, so runs are reproducible.
//!
//! # Frames
//!
//! Stepping one task is a frame. A child spawned without delay runs in the
//! same frame, right after its parent's step returns, on a branch forked
//! from the point where it was spawned. The parent's remaining work and the
//! child's work are concurrent and are merged at that fork point.
//!
//! # Termination
//!
//! A task that returns `Completed` while children are still live waits for
//! them; it terminates (joins) when the last one does. Termination wakes
//! tasks waiting on it, places directives anchored to its end, and may
//! terminate its parent in turn.
//!
//! # Failure
//!
//! Any error stops the run. The engine is then poisoned and every further
//! call returns [`SimulationError::Poisoned`]; discard it and build a new
//! one.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;
use sortie_core::{
    ActivityDirectiveId, Anchor, Arguments, CellId, Directive, Duration, SerializedValue, TaskId,
};
use sortie_history::{History, NodeId, Querier};
use tracing::{debug, trace, warn};

use crate::condition::Condition;
use crate::config::EngineConfig;
use crate::context::{SpawnRequest, TaskContext};
use crate::error::SimulationError;
use crate::metrics::RunMetrics;
use crate::model::MissionModel;
use crate::queue::{Job, ReadyQueue};
use crate::task::{Task, TaskFailure, TaskIdGen, TaskState, TaskStatus};

// ── Public records ──────────────────────────────────────────────

/// Where the engine stands after a run call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineStatus {
    /// Nothing left to do.
    Terminal,
    /// Work remains; the earliest job is at `next`.
    Suspended {
        /// Instant of the next queued job.
        next: Duration,
    },
}

/// A trunk state reached at the end of a batch that changed something.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Commit {
    /// Instant of the batch.
    pub time: Duration,
    /// Trunk node after the batch.
    pub node: NodeId,
}

// ── Task table ──────────────────────────────────────────────────

/// Activity identity of a task, if it is one.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ActivityInfo {
    pub(crate) type_name: String,
    pub(crate) arguments: Arguments,
    pub(crate) directive: Option<ActivityDirectiveId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Phase {
    Pending,
    Running,
    AwaitingChildren,
    Terminated,
    Failed,
}

pub(crate) struct TaskEntry {
    task: Option<Box<dyn Task>>,
    pub(crate) phase: Phase,
    pub(crate) parent: Option<TaskId>,
    pub(crate) children: Vec<TaskId>,
    live_children: usize,
    waiting_on_children: bool,
    pub(crate) activity: Option<ActivityInfo>,
    pub(crate) scheduled: Option<Duration>,
    pub(crate) start: Option<Duration>,
    pub(crate) join: Option<Duration>,
    pub(crate) output: Option<SerializedValue>,
}

impl TaskEntry {
    fn new(task: Box<dyn Task>, parent: Option<TaskId>, activity: Option<ActivityInfo>) -> Self {
        Self {
            task: Some(task),
            phase: Phase::Pending,
            parent,
            children: Vec::new(),
            live_children: 0,
            waiting_on_children: false,
            activity,
            scheduled: None,
            start: None,
            join: None,
            output: None,
        }
    }
}

struct ConditionWait {
    condition: Box<dyn Condition>,
    reads: SmallVec<[CellId; 4]>,
    generation: u64,
    fresh: bool,
}

// ── Engine ──────────────────────────────────────────────────────

/// A single simulation run over one mission model.
pub struct Engine {
    model: Arc<MissionModel>,
    config: EngineConfig,
    history: History,
    queue: ReadyQueue,
    ids: TaskIdGen,
    tasks: IndexMap<TaskId, TaskEntry>,
    directives: IndexMap<ActivityDirectiveId, TaskId>,
    waiters: IndexMap<TaskId, Vec<TaskId>>,
    conditions: IndexMap<TaskId, ConditionWait>,
    next_generation: u64,
    start_dependents: IndexMap<TaskId, Vec<(TaskId, Duration)>>,
    end_dependents: IndexMap<TaskId, Vec<(TaskId, Duration)>>,
    trunk: NodeId,
    now: Duration,
    covered: Duration,
    commits: Vec<Commit>,
    batches_at_now: usize,
    metrics: RunMetrics,
    failed: bool,
}

impl Engine {
    /// A fresh engine at t=0 with the model's daemons queued.
    pub fn new(model: Arc<MissionModel>, config: EngineConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        let history = History::new(Arc::clone(model.registry()), config.history.clone())?;
        let root = history.root();
        let mut engine = Self {
            model,
            config,
            history,
            queue: ReadyQueue::default(),
            ids: TaskIdGen::default(),
            tasks: IndexMap::new(),
            directives: IndexMap::new(),
            waiters: IndexMap::new(),
            conditions: IndexMap::new(),
            next_generation: 0,
            start_dependents: IndexMap::new(),
            end_dependents: IndexMap::new(),
            trunk: root,
            now: Duration::ZERO,
            covered: Duration::ZERO,
            commits: vec![Commit {
                time: Duration::ZERO,
                node: root,
            }],
            batches_at_now: 0,
            metrics: RunMetrics::default(),
            failed: false,
        };
        let model = Arc::clone(&engine.model);
        for (name, factory) in model.daemons() {
            let id = engine.ids.next();
            engine.register(id, factory(), None, None);
            engine.place(id, Duration::ZERO)?;
            debug!(task = %id, daemon = %name, "daemon queued");
        }
        Ok(engine)
    }

    // ── Scheduling ──────────────────────────────────────────────

    /// Instantiate `directive` and queue it.
    ///
    /// Arguments are validated here, before any time passes. A directive
    /// anchored to another must be scheduled after its anchor. Start
    /// anchors resolve as soon as the anchor's start is known; end anchors
    /// resolve when the anchor terminates.
    pub fn schedule_directive(
        &mut self,
        id: ActivityDirectiveId,
        directive: &Directive,
    ) -> Result<TaskId, SimulationError> {
        self.ensure_usable()?;
        if self.directives.contains_key(&id) {
            return Err(SimulationError::DuplicateDirective { directive: id });
        }
        let anchor_task = match directive.anchor {
            Some(Anchor { directive: anchor, .. }) => Some(
                *self
                    .directives
                    .get(&anchor)
                    .ok_or(SimulationError::UnknownAnchor {
                        directive: id,
                        anchor,
                    })?,
            ),
            None => None,
        };
        let (arguments, task) = self
            .model
            .instantiate(&directive.activity)
            .map_err(|source| SimulationError::Instantiation {
                directive: id,
                source,
            })?;
        let task_id = self.ids.next();
        self.register(
            task_id,
            task,
            None,
            Some(ActivityInfo {
                type_name: directive.activity.type_name.clone(),
                arguments,
                directive: Some(id),
            }),
        );
        self.directives.insert(id, task_id);
        trace!(%id, task = %task_id, activity = %directive.activity.type_name, "directive scheduled");

        let offset = directive.start_offset;
        let result = match (directive.anchor, anchor_task) {
            (Some(anchor), Some(anchor_task)) if anchor.anchored_to_start => {
                let scheduled = self.entry(anchor_task)?.scheduled;
                match scheduled {
                    Some(at) => self.place(task_id, at.plus(offset)?),
                    None => {
                        self.start_dependents
                            .entry(anchor_task)
                            .or_default()
                            .push((task_id, offset));
                        Ok(())
                    }
                }
            }
            (Some(_), Some(anchor_task)) => {
                let join = self.entry(anchor_task)?.join;
                match join {
                    Some(at) => self.place(task_id, at.plus(offset)?),
                    None => {
                        self.end_dependents
                            .entry(anchor_task)
                            .or_default()
                            .push((task_id, offset));
                        Ok(())
                    }
                }
            }
            _ => self.place(task_id, offset),
        };
        result.map(|()| task_id).inspect_err(|_| self.failed = true)
    }

    /// Where an anchored or unanchored directive would start, if that is
    /// already known.
    pub fn resolve_start(&self, directive: &Directive) -> Option<Duration> {
        match directive.anchor {
            None => Some(directive.start_offset),
            Some(anchor) => {
                let task = self.directives.get(&anchor.directive)?;
                let entry = self.tasks.get(task)?;
                let base = if anchor.anchored_to_start {
                    entry.scheduled?
                } else {
                    entry.join?
                };
                base.plus(directive.start_offset).ok()
            }
        }
    }

    fn register(
        &mut self,
        id: TaskId,
        task: Box<dyn Task>,
        parent: Option<TaskId>,
        activity: Option<ActivityInfo>,
    ) {
        self.tasks.insert(id, TaskEntry::new(task, parent, activity));
        self.metrics.tasks_spawned += 1;
    }

    /// Queue a task's first step at `at`, resolving directives anchored to
    /// its start.
    fn place(&mut self, task: TaskId, at: Duration) -> Result<(), SimulationError> {
        let mut pending = vec![(task, at)];
        let mut i = 0;
        while let Some(&(task, at)) = pending.get(i) {
            i += 1;
            if at < self.now {
                return Err(SimulationError::ScheduleInPast { at, now: self.now });
            }
            self.entry_mut(task)?.scheduled = Some(at);
            self.queue.push(at, Job::Step(task));
            if let Some(dependents) = self.start_dependents.shift_remove(&task) {
                for (dependent, offset) in dependents {
                    pending.push((dependent, at.plus(offset)?));
                }
            }
        }
        Ok(())
    }

    // ── Running ─────────────────────────────────────────────────

    /// Run one batch: every job at the earliest queued instant.
    pub fn step(&mut self) -> Result<EngineStatus, SimulationError> {
        self.ensure_usable()?;
        let result = self.run_batch();
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    /// Run every batch at or before `horizon`.
    pub fn run_until(&mut self, horizon: Duration) -> Result<EngineStatus, SimulationError> {
        let status = self.drive(|engine| engine.queue.next_time().is_some_and(|t| t <= horizon))?;
        self.covered = self.covered.max(horizon);
        Ok(status)
    }

    /// Run until the queue is empty. A no-op on an empty queue.
    pub fn run_to_completion(&mut self) -> Result<EngineStatus, SimulationError> {
        let status = self.drive(|engine| !engine.queue.is_empty())?;
        self.covered = self.covered.max(self.now);
        Ok(status)
    }

    /// Run until every task in `tasks` has terminated, then finish the
    /// batches at that instant. Stops early if the queue empties.
    pub fn run_until_joined(&mut self, tasks: &[TaskId]) -> Result<EngineStatus, SimulationError> {
        for task in tasks {
            self.entry(*task)?;
        }
        let status = self.drive(|engine| {
            let joined = tasks
                .iter()
                .all(|t| engine.tasks.get(t).is_some_and(|e| e.phase == Phase::Terminated));
            match engine.queue.next_time() {
                None => false,
                Some(next) if joined => next == engine.now,
                Some(_) => true,
            }
        })?;
        self.covered = self.covered.max(self.now);
        Ok(status)
    }

    fn drive(
        &mut self,
        mut keep_going: impl FnMut(&Self) -> bool,
    ) -> Result<EngineStatus, SimulationError> {
        self.ensure_usable()?;
        let started = Instant::now();
        let mut result = Ok(self.status());
        while keep_going(self) {
            result = self.step();
            if result.is_err() {
                break;
            }
        }
        self.metrics.wall_time_us += started.elapsed().as_micros() as u64;
        self.metrics.snapshots = self.history.snapshot_count() as u64;
        result.map(|_| self.status())
    }

    fn run_batch(&mut self) -> Result<EngineStatus, SimulationError> {
        let Some(at) = self.queue.next_time() else {
            return Ok(EngineStatus::Terminal);
        };
        if at > self.now {
            self.trunk = self.history.advance(self.trunk, at.minus(self.now)?)?;
            self.now = at;
            self.batches_at_now = 0;
        }
        if self.batches_at_now >= self.config.max_batches_per_instant {
            return Err(SimulationError::Livelock {
                at,
                batches: self.batches_at_now,
            });
        }
        self.batches_at_now += 1;

        let anchor = self.trunk;
        let jobs = self.queue.pop_at(at);
        let mut tips = Vec::with_capacity(jobs.len());
        for job in jobs {
            let task = match job {
                Job::Step(task) => task,
                Job::Wake { task, generation } => {
                    let current = self.conditions.get(&task).map(|wait| wait.generation);
                    if current != Some(generation) {
                        continue;
                    }
                    self.conditions.shift_remove(&task);
                    task
                }
            };
            tips.push(self.run_frame(task, anchor)?);
        }
        self.metrics.batches += 1;

        let merged = self.join_branches(anchor, &tips)?;
        if merged != anchor {
            self.trunk = merged;
            self.commits.push(Commit {
                time: at,
                node: merged,
            });
            self.history.commit(merged)?;
            self.metrics.commits += 1;
        }
        self.refresh_conditions(anchor)?;
        Ok(self.status())
    }

    /// Step `task` from `from`, then run its undelayed children from their
    /// spawn points and merge everything back.
    fn run_frame(&mut self, task: TaskId, from: NodeId) -> Result<NodeId, SimulationError> {
        let (mut tip, children) = self.run_task(task, from)?;
        let mut child_tips = Vec::with_capacity(children.len());
        for (child, point) in children {
            child_tips.push((point, self.run_frame(child, point)?));
        }
        for (point, child_tip) in child_tips.into_iter().rev() {
            tip = self.join_branches(point, &[tip, child_tip])?;
        }
        Ok(tip)
    }

    fn join_branches(&mut self, anchor: NodeId, tips: &[NodeId]) -> Result<NodeId, SimulationError> {
        if tips.iter().filter(|t| **t != anchor).count() > 1 {
            self.metrics.merges += 1;
        }
        Ok(self.history.merge(anchor, tips)?)
    }

    /// Step one task until it suspends or completes. Returns its branch tip
    /// and the undelayed children it spawned, with their spawn points.
    fn run_task(
        &mut self,
        task: TaskId,
        from: NodeId,
    ) -> Result<(NodeId, Vec<(TaskId, NodeId)>), SimulationError> {
        let now = self.now;
        let mut immediate = Vec::new();
        let entry = self.entry_mut(task)?;
        let Some(mut body) = entry.task.take() else {
            return Ok((from, immediate));
        };
        if entry.phase == Phase::Pending {
            entry.phase = Phase::Running;
            entry.start = Some(now);
        }

        let mut tip = from;
        loop {
            self.metrics.task_steps += 1;
            let mut ctx = TaskContext::new(&mut self.history, &self.model, &mut self.ids, tip, now, task);
            let outcome = body.step(&mut ctx);
            let (next_tip, spawns, emitted) = ctx.finish();
            tip = next_tip;
            self.metrics.events_emitted += emitted;
            for request in spawns {
                if let Some(child) = self.adopt(task, request)? {
                    immediate.push(child);
                }
            }

            let status = match outcome {
                Ok(status) => status,
                Err(failure) => return Err(self.fail(task, failure)),
            };
            match status {
                TaskStatus::Completed(output) => {
                    self.entry_mut(task)?.output = output;
                    self.complete(task)?;
                    break;
                }
                TaskStatus::Delayed(delay) => {
                    if delay.is_negative() {
                        let failure = TaskFailure::new(format!("negative delay {delay}"));
                        return Err(self.fail(task, failure));
                    }
                    self.queue.push(now.plus(delay)?, Job::Step(task));
                }
                TaskStatus::AwaitingTask(target) => {
                    if target == task {
                        return Err(SimulationError::SelfWait { task });
                    }
                    let terminated = self
                        .tasks
                        .get(&target)
                        .ok_or(SimulationError::UnknownTask {
                            task: target,
                            waiter: task,
                        })?
                        .phase
                        == Phase::Terminated;
                    if terminated {
                        continue;
                    }
                    self.waiters.entry(target).or_default().push(task);
                }
                TaskStatus::AwaitingChildren => {
                    let entry = self.entry_mut(task)?;
                    if entry.live_children == 0 {
                        continue;
                    }
                    entry.waiting_on_children = true;
                }
                TaskStatus::AwaitingCondition(condition) => {
                    self.conditions.insert(
                        task,
                        ConditionWait {
                            condition,
                            reads: SmallVec::new(),
                            generation: 0,
                            fresh: true,
                        },
                    );
                }
            }
            self.entry_mut(task)?.task = Some(body);
            break;
        }
        Ok((tip, immediate))
    }

    /// Record a child. Returns it with its spawn point if it runs now.
    fn adopt(
        &mut self,
        parent: TaskId,
        request: SpawnRequest,
    ) -> Result<Option<(TaskId, NodeId)>, SimulationError> {
        let SpawnRequest {
            id,
            delay,
            at,
            task,
            activity,
        } = request;
        self.register(id, task, Some(parent), activity);
        let entry = self.entry_mut(parent)?;
        entry.children.push(id);
        entry.live_children += 1;
        if delay.is_zero() {
            let now = self.now;
            self.entry_mut(id)?.scheduled = Some(now);
            Ok(Some((id, at)))
        } else {
            self.place(id, self.now.plus(delay)?)?;
            Ok(None)
        }
    }

    fn fail(&mut self, task: TaskId, failure: TaskFailure) -> SimulationError {
        let activity = self.tasks.get_mut(&task).and_then(|entry| {
            entry.phase = Phase::Failed;
            entry.activity.as_ref().map(|a| a.type_name.clone())
        });
        warn!(%task, activity = activity.as_deref().unwrap_or("anonymous"), at = %self.now, %failure, "task failed");
        SimulationError::TaskFailed {
            task,
            activity,
            at: self.now,
            failure,
        }
    }

    fn complete(&mut self, task: TaskId) -> Result<(), SimulationError> {
        let entry = self.entry_mut(task)?;
        if entry.live_children == 0 {
            self.terminate(task)
        } else {
            entry.phase = Phase::AwaitingChildren;
            Ok(())
        }
    }

    fn terminate(&mut self, task: TaskId) -> Result<(), SimulationError> {
        let now = self.now;
        let mut work = vec![task];
        while let Some(task) = work.pop() {
            let entry = self.entry_mut(task)?;
            entry.phase = Phase::Terminated;
            entry.join = Some(now);
            let parent = entry.parent;

            if let Some(waiting) = self.waiters.shift_remove(&task) {
                for waiter in waiting {
                    self.queue.push(now, Job::Step(waiter));
                }
            }
            if let Some(dependents) = self.end_dependents.shift_remove(&task) {
                for (dependent, offset) in dependents {
                    self.place(dependent, now.plus(offset)?)?;
                }
            }
            if let Some(parent) = parent {
                let entry = self.entry_mut(parent)?;
                entry.live_children = entry.live_children.saturating_sub(1);
                if entry.live_children == 0 {
                    if entry.phase == Phase::AwaitingChildren {
                        work.push(parent);
                    } else if entry.waiting_on_children {
                        entry.waiting_on_children = false;
                        self.queue.push(now, Job::Step(parent));
                    }
                }
            }
        }
        Ok(())
    }

    /// Re-solve condition waits that are new or read a cell this batch
    /// touched. Older wake-ups for the same wait become stale.
    fn refresh_conditions(&mut self, anchor: NodeId) -> Result<(), SimulationError> {
        if self.conditions.is_empty() {
            return Ok(());
        }
        let touched = if self.trunk == anchor {
            IndexSet::new()
        } else {
            self.history.touched_cells(anchor, self.trunk)?
        };
        let horizon = Duration::MAX.saturating_minus(self.now);
        for (task, wait) in self.conditions.iter_mut() {
            if !wait.fresh && !wait.reads.iter().any(|cell| touched.contains(cell)) {
                continue;
            }
            self.next_generation += 1;
            let mut querier = Querier::new(&self.history, self.trunk)?;
            let next = wait.condition.next_satisfied(&mut querier, horizon)?;
            wait.reads = querier.into_reads();
            wait.generation = self.next_generation;
            wait.fresh = false;
            self.metrics.conditions_evaluated += 1;
            if let Some(offset) = next {
                self.queue.push(
                    self.now.plus(offset)?,
                    Job::Wake {
                        task: *task,
                        generation: wait.generation,
                    },
                );
            }
        }
        Ok(())
    }

    // ── Inspection ──────────────────────────────────────────────

    /// Terminal if nothing is queued, else the next queued instant.
    pub fn status(&self) -> EngineStatus {
        match self.queue.next_time() {
            None => EngineStatus::Terminal,
            Some(next) => EngineStatus::Suspended { next },
        }
    }

    /// Instant of the most recent batch.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Latest horizon the engine has been run to.
    pub fn covered(&self) -> Duration {
        self.covered
    }

    /// True once an error has poisoned the engine.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Lifecycle state of a task.
    pub fn task_state(&self, task: TaskId) -> Option<TaskState> {
        self.tasks.get(&task).map(|entry| match entry.phase {
            Phase::Pending => TaskState::NotStarted,
            Phase::Running | Phase::AwaitingChildren => TaskState::Running,
            Phase::Terminated => TaskState::Completed,
            Phase::Failed => TaskState::Failed,
        })
    }

    /// Join minus start, once the task and all its children terminated.
    pub fn task_duration(&self, task: TaskId) -> Option<Duration> {
        let entry = self.tasks.get(&task)?;
        entry.join?.minus(entry.start?).ok()
    }

    /// The task created for a directive.
    pub fn task_for_directive(&self, directive: ActivityDirectiveId) -> Option<TaskId> {
        self.directives.get(&directive).copied()
    }

    /// When a directive's task is (or was) queued to start.
    pub fn directive_start(&self, directive: ActivityDirectiveId) -> Option<Duration> {
        self.tasks.get(self.directives.get(&directive)?)?.scheduled
    }

    /// Tasks created for directives, in scheduling order.
    pub fn directive_tasks(&self) -> impl Iterator<Item = (ActivityDirectiveId, TaskId)> + '_ {
        self.directives.iter().map(|(d, t)| (*d, *t))
    }

    /// The branching history.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Trunk commits in time order, starting with the initial state.
    pub fn commits(&self) -> &[Commit] {
        &self.commits
    }

    /// Counters accumulated so far.
    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    /// The model being simulated.
    pub fn model(&self) -> &Arc<MissionModel> {
        &self.model
    }

    /// Engine settings.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn task_entries(&self) -> impl Iterator<Item = (TaskId, &TaskEntry)> {
        self.tasks.iter().map(|(id, entry)| (*id, entry))
    }

    fn ensure_usable(&self) -> Result<(), SimulationError> {
        if self.failed {
            Err(SimulationError::Poisoned)
        } else {
            Ok(())
        }
    }

    fn entry(&self, task: TaskId) -> Result<&TaskEntry, SimulationError> {
        self.tasks.get(&task).ok_or(SimulationError::UnknownTask {
            task,
            waiter: task,
        })
    }

    fn entry_mut(&mut self, task: TaskId) -> Result<&mut TaskEntry, SimulationError> {
        self.tasks.get_mut(&task).ok_or(SimulationError::UnknownTask {
            task,
            waiter: task,
        })
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("now", &self.now)
            .field("covered", &self.covered)
            .field("tasks", &self.tasks.len())
            .field("queued", &self.queue.len())
            .field("conditions", &self.conditions.len())
            .field("commits", &self.commits.len())
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}
