//! Strongly-typed identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies a task (and, for activity tasks, the simulated activity).
///
/// Assigned sequentially by the engine at spawn time, so the same schedule
/// always produces the same ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

impl From<u64> for TaskId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Identifies a cell within a mission model.
///
/// Cells are registered once when the model is built and assigned
/// sequential ids; `CellId(n)` is the n-th allocated cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(pub u32);

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for CellId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies an event topic within a mission model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicId(pub u32);

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TopicId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a directive in a schedule. Chosen by the planner, not the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityDirectiveId(pub u64);

impl fmt::Display for ActivityDirectiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "directive#{}", self.0)
    }
}

impl From<u64> for ActivityDirectiveId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}
