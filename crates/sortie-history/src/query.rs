//! Read access to cells with dependency tracking.
//!
//! A [`Querier`] reads cells as of one history node and remembers which
//! cells it touched. The engine uses that record to decide when a waiting
//! condition must be re-evaluated: only after a commit that affects one of
//! the cells the condition read.

use smallvec::SmallVec;
use sortie_core::{Cell, CellId, CellRef, Duration};

use crate::error::HistoryError;
use crate::history::History;
use crate::node::NodeId;

/// Tracked, read-only view of the history at one node.
pub struct Querier<'h> {
    history: &'h History,
    at: NodeId,
    now: Duration,
    reads: SmallVec<[CellId; 4]>,
}

impl<'h> Querier<'h> {
    /// A querier reading as of `at`.
    pub fn new(history: &'h History, at: NodeId) -> Result<Self, HistoryError> {
        Ok(Self {
            history,
            at,
            now: history.time(at)?,
            reads: SmallVec::new(),
        })
    }

    /// Simulated time at the queried node.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// The queried node.
    pub fn node(&self) -> NodeId {
        self.at
    }

    /// Read a cell, recording the dependency.
    pub fn get<C: Cell, R>(
        &mut self,
        cell: &CellRef<C>,
        read: impl FnOnce(&C) -> R,
    ) -> Result<R, HistoryError> {
        if !self.reads.contains(&cell.id()) {
            self.reads.push(cell.id());
        }
        self.history.query(self.at, cell, read)
    }

    /// Cells read so far, in first-read order.
    pub fn reads(&self) -> &[CellId] {
        &self.reads
    }

    /// Consume the querier, keeping its dependency record.
    pub fn into_reads(self) -> SmallVec<[CellId; 4]> {
        self.reads
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::HistoryConfig;
    use crate::registry::RegistryBuilder;
    use sortie_cells::{CounterCell, CounterEffect};

    #[test]
    fn records_each_cell_once() {
        let mut b = RegistryBuilder::new();
        let (a, a_topic) = b.allocate_with_topic("a", CounterCell::new(1));
        let (c, _) = b.allocate_with_topic("c", CounterCell::new(2));
        let mut h = History::new(Arc::new(b.build()), HistoryConfig::default()).unwrap();
        let n = h.emit(h.root(), &a_topic, CounterEffect(4)).unwrap();

        let mut q = Querier::new(&h, n).unwrap();
        assert_eq!(q.get(&a, |x| x.value()).unwrap(), 5);
        assert_eq!(q.get(&c, |x| x.value()).unwrap(), 2);
        assert_eq!(q.get(&a, |x| x.value()).unwrap(), 5);
        assert_eq!(q.reads(), &[a.id(), c.id()]);
        assert_eq!(q.now(), Duration::ZERO);
    }
}
