//! History nodes and their identifiers.
//!
//! A [`NodeId`] is an index into the history arena. Nodes are immutable
//! once pushed, so ids stay valid for the life of the history and can be
//! held by the engine, the results assembler, and queriers alike.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use sortie_core::{CellId, Duration, TopicId};

/// A type-erased effect or event payload.
pub type DynEffect = Arc<dyn Any + Send + Sync>;

/// Position of a node within the history arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[must_use]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Arena index of this node.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// An event as emitted by a task, before projection into cell effects.
#[derive(Clone)]
pub(crate) struct Event {
    pub(crate) topic: TopicId,
    pub(crate) payload: DynEffect,
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event").field("topic", &self.topic).finish_non_exhaustive()
    }
}

/// What happened between a node's parent and the node itself.
#[derive(Clone, Debug)]
pub(crate) enum NodeKind {
    /// The initial state. Always snapshotted.
    Root,
    /// Simulated time moved forward.
    Advance { elapsed: Duration },
    /// One event was emitted.
    Emit { event: Event },
    /// Combined effects of two or more concurrent branches.
    Merge {
        effects: IndexMap<CellId, DynEffect>,
    },
}

/// One immutable point in the history.
#[derive(Clone, Debug)]
pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) kind: NodeKind,
    /// Simulated time at this node.
    pub(crate) time: Duration,
    /// Distance from the root; lets descendant checks stop early.
    pub(crate) depth: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_display_and_index() {
        let id = NodeId(7);
        assert_eq!(id.to_string(), "n7");
        assert_eq!(id.index(), 7);
    }
}
