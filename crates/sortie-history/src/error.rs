//! History-specific error types.

use sortie_core::{CellId, Duration, EffectConflict, TimeError, TopicId};
use thiserror::Error;

use crate::node::NodeId;

/// Errors that can occur while recording into or querying the history.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum HistoryError {
    /// A node id that was never issued by this history.
    #[error("unknown history node {node}")]
    UnknownNode {
        /// The unrecognised node.
        node: NodeId,
    },
    /// A cell id not registered in the model.
    #[error("unknown cell {cell}")]
    UnknownCell {
        /// The unrecognised cell.
        cell: CellId,
    },
    /// A topic id not registered in the model.
    #[error("unknown topic {topic}")]
    UnknownTopic {
        /// The unrecognised topic.
        topic: TopicId,
    },
    /// A cell handle whose type parameter does not match the registered cell.
    #[error("cell {cell} is not a {expected}")]
    CellType {
        /// The mismatched cell.
        cell: CellId,
        /// The type the handle expected.
        expected: &'static str,
    },
    /// A topic handle whose event type does not match the registered topic.
    #[error("topic {topic} does not carry {expected}")]
    TopicType {
        /// The mismatched topic.
        topic: TopicId,
        /// The event type the handle expected.
        expected: &'static str,
    },
    /// A stored effect could not be interpreted by its cell.
    #[error("effect recorded for cell {cell} has the wrong type")]
    EffectType {
        /// The cell whose effect was malformed.
        cell: CellId,
    },
    /// Time cannot move backwards.
    #[error("cannot advance history by negative duration {elapsed}")]
    NegativeAdvance {
        /// The rejected step.
        elapsed: Duration,
    },
    /// A merged tip does not descend from the merge anchor.
    #[error("node {tip} does not descend from merge anchor {anchor}")]
    NotDescendant {
        /// The fork point.
        anchor: NodeId,
        /// The offending tip.
        tip: NodeId,
    },
    /// A merged branch advanced time after forking.
    #[error("branch from {anchor} to {tip} advanced time and cannot be merged")]
    BranchAdvanced {
        /// The fork point.
        anchor: NodeId,
        /// The offending tip.
        tip: NodeId,
    },
    /// Concurrent effects on a cell could not be combined.
    #[error("concurrent effects on cell {cell} conflict")]
    Conflict {
        /// The contested cell.
        cell: CellId,
        /// The cell's explanation.
        #[source]
        source: EffectConflict,
    },
    /// The arena has issued `u32::MAX` nodes.
    #[error("history node limit reached")]
    NodeLimit,
    /// Time arithmetic failed.
    #[error(transparent)]
    Time(#[from] TimeError),
    /// Configuration invariant violated.
    #[error("invalid history configuration: {reason}")]
    InvalidConfig {
        /// Which invariant was violated.
        reason: String,
    },
}
