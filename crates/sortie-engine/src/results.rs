//! Simulation results: activity windows, resource profiles, violations.
//!
//! [`assemble`] reads a finished (or horizon-bounded) [`Engine`] without
//! mutating it. Profiles are sampled at trunk commits, the only points
//! where resource dynamics can change. Activities are classified against
//! the horizon: joined by then is simulated, started but not joined is
//! unfinished, not started is omitted.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sortie_core::{ActivityDirectiveId, Arguments, Duration, RealDynamics, SerializedValue, TaskId};
use sortie_history::{HistoryError, NodeId, Querier};

use crate::constraint::{discrete_violations, real_violations, ConstraintKind, Violation};
use crate::engine::{Commit, Engine, TaskEntry};
use crate::error::SimulationError;

// ── Records ─────────────────────────────────────────────────────

/// One piece of a resource profile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfileSegment<D> {
    /// Plan time at which the segment begins.
    pub start: Duration,
    /// Length of the segment.
    pub extent: Duration,
    /// Value (or trajectory) over the segment, relative to `start`.
    pub dynamics: D,
}

/// An activity whose whole window lies within the horizon.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulatedActivity {
    /// Activity type name.
    pub activity_type: String,
    /// Effective arguments, defaults included.
    pub arguments: Arguments,
    /// Calendar start.
    pub start: DateTime<Utc>,
    /// Start relative to plan start.
    pub start_offset: Duration,
    /// From start until the activity and all its children terminated.
    pub duration: Duration,
    /// Nearest enclosing activity.
    pub parent: Option<TaskId>,
    /// Activities spawned by this one, in spawn order.
    pub children: Vec<TaskId>,
    /// Directive that created this activity, if any.
    pub directive: Option<ActivityDirectiveId>,
    /// Value returned on completion.
    pub computed_attributes: Option<SerializedValue>,
}

/// An activity that started but had not finished by the horizon.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnfinishedActivity {
    /// Activity type name.
    pub activity_type: String,
    /// Effective arguments, defaults included.
    pub arguments: Arguments,
    /// Calendar start.
    pub start: DateTime<Utc>,
    /// Start relative to plan start.
    pub start_offset: Duration,
    /// Nearest enclosing activity.
    pub parent: Option<TaskId>,
    /// Activities spawned by this one, in spawn order.
    pub children: Vec<TaskId>,
    /// Directive that created this activity, if any.
    pub directive: Option<ActivityDirectiveId>,
}

/// Everything a caller learns from a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationResults {
    /// Calendar instant of plan time zero.
    pub start_time: DateTime<Utc>,
    /// Horizon the results cover.
    pub duration: Duration,
    /// Plan instants at which profiles were sampled.
    pub timestamps: Vec<Duration>,
    /// Real resource profiles by name.
    pub real_profiles: IndexMap<String, Vec<ProfileSegment<RealDynamics>>>,
    /// Discrete resource profiles by name.
    pub discrete_profiles: IndexMap<String, Vec<ProfileSegment<SerializedValue>>>,
    /// Violations of the model's constraints.
    pub constraint_violations: Vec<Violation>,
    /// Finished activities.
    pub simulated_activities: IndexMap<TaskId, SimulatedActivity>,
    /// Started but unfinished activities.
    pub unfinished_activities: IndexMap<TaskId, UnfinishedActivity>,
}

impl SimulationResults {
    /// The finished activity created by `directive`.
    pub fn activity_for_directive(
        &self,
        directive: ActivityDirectiveId,
    ) -> Option<(TaskId, &SimulatedActivity)> {
        self.simulated_activities
            .iter()
            .find(|(_, a)| a.directive == Some(directive))
            .map(|(id, a)| (*id, a))
    }
}

// ── Assembly ────────────────────────────────────────────────────

/// Build results for `[0, horizon]` from `engine`'s state.
pub fn assemble(
    engine: &Engine,
    start_time: DateTime<Utc>,
    horizon: Duration,
) -> Result<SimulationResults, SimulationError> {
    let points = sample_points(engine, horizon);
    let timestamps = points.iter().map(|c| c.time).collect();
    let model = engine.model();
    let history = engine.history();

    let mut real_profiles = IndexMap::new();
    for (name, read) in model.real_resources() {
        let sample = |node: NodeId| -> Result<RealDynamics, HistoryError> {
            read(&mut Querier::new(history, node)?)
        };
        let segments = profile(&points, horizon, sample, |prev, extent, next| {
            prev.shifted(extent) == *next
        })?;
        real_profiles.insert(name.to_owned(), segments);
    }
    let mut discrete_profiles = IndexMap::new();
    for (name, read) in model.discrete_resources() {
        let sample = |node: NodeId| -> Result<SerializedValue, HistoryError> {
            read(&mut Querier::new(history, node)?)
        };
        let segments = profile(&points, horizon, sample, |prev, _, next| prev == next)?;
        discrete_profiles.insert(name.to_owned(), segments);
    }

    let mut constraint_violations = Vec::new();
    for constraint in model.constraints() {
        let windows = match &constraint.kind {
            ConstraintKind::RealBounds {
                resource,
                lower,
                upper,
            } => real_profiles
                .get(resource)
                .map(|p| real_violations(p, *lower, *upper))
                .transpose()?,
            ConstraintKind::DiscreteOneOf { resource, allowed } => discrete_profiles
                .get(resource)
                .map(|p| discrete_violations(p, allowed))
                .transpose()?,
        }
        .unwrap_or_default();
        if !windows.is_empty() {
            constraint_violations.push(Violation {
                constraint: constraint.name.clone(),
                resource_names: vec![constraint.resource().to_owned()],
                windows,
            });
        }
    }

    let (simulated_activities, unfinished_activities) = activities(engine, start_time, horizon)?;

    Ok(SimulationResults {
        start_time,
        duration: horizon,
        timestamps,
        real_profiles,
        discrete_profiles,
        constraint_violations,
        simulated_activities,
        unfinished_activities,
    })
}

/// Commits at or before `horizon`, keeping only the last of several at the
/// same instant. The initial state is kept as its own sample when the
/// engine is configured to.
fn sample_points(engine: &Engine, horizon: Duration) -> Vec<Commit> {
    let keep_initial = engine.config().sample_initial_state;
    let commits: Vec<Commit> = engine
        .commits()
        .iter()
        .copied()
        .filter(|c| c.time <= horizon)
        .collect();
    commits
        .iter()
        .enumerate()
        .filter(|(i, c)| {
            let superseded = commits.get(i + 1).is_some_and(|next| next.time == c.time);
            !superseded || (*i == 0 && keep_initial)
        })
        .map(|(_, c)| *c)
        .collect()
}

fn profile<D>(
    points: &[Commit],
    horizon: Duration,
    mut sample: impl FnMut(NodeId) -> Result<D, HistoryError>,
    continues: impl Fn(&D, Duration, &D) -> bool,
) -> Result<Vec<ProfileSegment<D>>, SimulationError> {
    let mut segments: Vec<ProfileSegment<D>> = Vec::with_capacity(points.len());
    for (i, point) in points.iter().enumerate() {
        let end = points.get(i + 1).map_or(horizon, |next| next.time);
        let extent = end.minus(point.time)?;
        let dynamics = sample(point.node)?;
        if let Some(last) = segments.last_mut() {
            if last.extent.is_positive() && continues(&last.dynamics, last.extent, &dynamics) {
                last.extent = last.extent.plus(extent)?;
                continue;
            }
        }
        segments.push(ProfileSegment {
            start: point.time,
            extent,
            dynamics,
        });
    }
    Ok(segments)
}

type Activities = (
    IndexMap<TaskId, SimulatedActivity>,
    IndexMap<TaskId, UnfinishedActivity>,
);

fn activities(
    engine: &Engine,
    start_time: DateTime<Utc>,
    horizon: Duration,
) -> Result<Activities, SimulationError> {
    let entries: IndexMap<TaskId, &TaskEntry> = engine.task_entries().collect();
    let included: Vec<(TaskId, &TaskEntry, Duration)> = entries
        .iter()
        .filter_map(|(id, entry)| {
            entry.activity.as_ref()?;
            let start = entry.start.filter(|s| *s <= horizon)?;
            Some((*id, *entry, start))
        })
        .collect();

    // Nearest activity ancestor, then a children index in one pass.
    let parent_of = |entry: &TaskEntry| {
        let mut cursor = entry.parent;
        while let Some(id) = cursor {
            let ancestor = entries.get(&id)?;
            if ancestor.activity.is_some() {
                return Some(id);
            }
            cursor = ancestor.parent;
        }
        None
    };
    let mut parents: IndexMap<TaskId, Option<TaskId>> = IndexMap::with_capacity(included.len());
    let mut children: IndexMap<TaskId, Vec<TaskId>> = IndexMap::new();
    for (id, entry, _) in &included {
        let parent = parent_of(*entry);
        if let Some(parent) = parent {
            children.entry(parent).or_default().push(*id);
        }
        parents.insert(*id, parent);
    }

    let mut simulated = IndexMap::new();
    let mut unfinished = IndexMap::new();
    for (id, entry, start_offset) in included {
        let Some(info) = entry.activity.as_ref() else {
            continue;
        };
        let start = start_offset.add_to(start_time)?;
        let parent = parents.get(&id).copied().flatten();
        let kids = children.shift_remove(&id).unwrap_or_default();
        match entry.join.filter(|j| *j <= horizon) {
            Some(join) => {
                simulated.insert(
                    id,
                    SimulatedActivity {
                        activity_type: info.type_name.clone(),
                        arguments: info.arguments.clone(),
                        start,
                        start_offset,
                        duration: join.minus(start_offset)?,
                        parent,
                        children: kids,
                        directive: info.directive,
                        computed_attributes: entry.output.clone(),
                    },
                );
            }
            None => {
                unfinished.insert(
                    id,
                    UnfinishedActivity {
                        activity_type: info.type_name.clone(),
                        arguments: info.arguments.clone(),
                        start,
                        start_offset,
                        parent,
                        children: kids,
                        directive: info.directive,
                    },
                );
            }
        }
    }
    Ok((simulated, unfinished))
}
