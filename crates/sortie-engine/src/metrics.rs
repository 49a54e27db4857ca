//! Per-engine performance counters.
//!
//! [`RunMetrics`] accumulates over the life of an engine and is reset only
//! when the engine is discarded.

/// Counters and timings collected while the engine runs.
///
/// Durations are wall-clock microseconds, not simulated time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunMetrics {
    /// Batches executed (one per group of jobs at an instant).
    pub batches: u64,
    /// Calls to `Task::step`.
    pub task_steps: u64,
    /// Tasks created, including directives, daemons, and children.
    pub tasks_spawned: u64,
    /// Events emitted by tasks.
    pub events_emitted: u64,
    /// Merges of two or more changed branches.
    pub merges: u64,
    /// Trunk commits recorded.
    pub commits: u64,
    /// Cell snapshots materialized in the history.
    pub snapshots: u64,
    /// Condition evaluations.
    pub conditions_evaluated: u64,
    /// Wall-clock time spent inside `run_*` calls.
    pub wall_time_us: u64,
}
