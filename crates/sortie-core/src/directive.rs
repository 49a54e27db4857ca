//! Scheduling directives: what a planner asks the engine to simulate.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::id::ActivityDirectiveId;
use crate::time::Duration;
use crate::value::Arguments;

/// An activity type name together with its serialized arguments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SerializedActivity {
    /// Name of the activity type in the mission model.
    pub type_name: String,
    /// Arguments keyed by parameter name.
    pub arguments: Arguments,
}

impl SerializedActivity {
    /// Build an activity with the given type and arguments.
    pub fn new(type_name: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            type_name: type_name.into(),
            arguments,
        }
    }

    /// Add one argument, builder style.
    pub fn with_argument(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.arguments.insert(name.into(), value);
        self
    }
}

/// Ties a directive's start to another directive's start or end.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    /// The directive this one is relative to.
    pub directive: ActivityDirectiveId,
    /// `true` to offset from the anchor's start, `false` from its end.
    pub anchored_to_start: bool,
}

/// A request to run one activity at a given offset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Directive {
    /// The activity to instantiate.
    pub activity: SerializedActivity,
    /// Offset from plan start, or from the anchor if one is set.
    pub start_offset: Duration,
    /// Optional relative placement.
    pub anchor: Option<Anchor>,
}

impl Directive {
    /// A directive at an absolute offset from plan start.
    pub fn at(start_offset: Duration, activity: SerializedActivity) -> Self {
        Self {
            activity,
            start_offset,
            anchor: None,
        }
    }

    /// A directive placed `offset` after another directive's start or end.
    pub fn anchored(
        anchor: ActivityDirectiveId,
        anchored_to_start: bool,
        offset: Duration,
        activity: SerializedActivity,
    ) -> Self {
        Self {
            activity,
            start_offset: offset,
            anchor: Some(Anchor {
                directive: anchor,
                anchored_to_start,
            }),
        }
    }
}

/// An ordered set of directives keyed by id.
///
/// Iteration follows insertion order, which is also the tie-break order
/// for directives starting at the same instant.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    directives: IndexMap<ActivityDirectiveId, Directive>,
}

impl Schedule {
    /// An empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a directive, returning any previous one.
    pub fn insert(&mut self, id: ActivityDirectiveId, directive: Directive) -> Option<Directive> {
        self.directives.insert(id, directive)
    }

    /// Remove a directive, preserving the order of the rest.
    pub fn remove(&mut self, id: ActivityDirectiveId) -> Option<Directive> {
        self.directives.shift_remove(&id)
    }

    /// Look up a directive.
    pub fn get(&self, id: ActivityDirectiveId) -> Option<&Directive> {
        self.directives.get(&id)
    }

    /// True if the schedule contains `id`.
    pub fn contains(&self, id: ActivityDirectiveId) -> bool {
        self.directives.contains_key(&id)
    }

    /// Directives in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (ActivityDirectiveId, &Directive)> {
        self.directives.iter().map(|(id, d)| (*id, d))
    }

    /// Number of directives.
    pub fn len(&self) -> usize {
        self.directives.len()
    }

    /// True if there are no directives.
    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }
}

impl FromIterator<(ActivityDirectiveId, Directive)> for Schedule {
    fn from_iter<T: IntoIterator<Item = (ActivityDirectiveId, Directive)>>(iter: T) -> Self {
        Self {
            directives: iter.into_iter().collect(),
        }
    }
}
