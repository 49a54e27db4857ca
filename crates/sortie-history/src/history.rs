//! The branching history arena.
//!
//! # Recording
//!
//! - [`advance`](History::advance) moves time forward on a lineage.
//! - [`emit`](History::emit) appends one event.
//! - [`fork`](History::fork) starts a branch; nothing is copied, a branch is
//!   just a pair of node ids.
//! - [`merge`](History::merge) folds each branch's effects sequentially,
//!   combines the branches concurrently per cell through the cell's
//!   [`EffectTrait`](sortie_core::EffectTrait), and records the result as a
//!   single merge node on top of the fork point. The result never depends
//!   on the order in which branches are listed.
//!
//! # Reading
//!
//! [`query`](History::query) walks parent pointers back to the nearest
//! snapshot and replays only the nodes that touch the requested cell. The
//! root is always snapshotted; further snapshots are taken on trunk commits
//! every [`HistoryConfig::snapshot_interval`] commits, which keeps replay
//! paths bounded without snapshotting on every query.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;
use sortie_core::{Cell, CellId, CellRef, Duration, Topic};
use tracing::{debug, trace};

use crate::config::HistoryConfig;
use crate::error::HistoryError;
use crate::node::{DynEffect, Event, Node, NodeId, NodeKind};
use crate::registry::{downcast_cell, DynCell, Registry};

/// A lineage forked from `anchor`, currently ending at `tip`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Branch {
    /// The fork point.
    pub anchor: NodeId,
    /// The latest node on this branch.
    pub tip: NodeId,
}

impl Branch {
    /// True if nothing has been recorded on the branch yet.
    pub fn is_unchanged(&self) -> bool {
        self.anchor == self.tip
    }
}

struct Snapshot {
    cells: Vec<Box<dyn DynCell>>,
}

/// Append-only arena of history nodes plus periodic cell snapshots.
pub struct History {
    registry: Arc<Registry>,
    config: HistoryConfig,
    nodes: Vec<Node>,
    snapshots: IndexMap<NodeId, Snapshot>,
    commits_since_snapshot: usize,
}

impl History {
    /// A history containing only the root node, holding the registry's
    /// initial cell states.
    pub fn new(registry: Arc<Registry>, config: HistoryConfig) -> Result<Self, HistoryError> {
        config.validate()?;
        let root = NodeId(0);
        let mut snapshots = IndexMap::new();
        snapshots.insert(
            root,
            Snapshot {
                cells: registry.initial_cells(),
            },
        );
        Ok(Self {
            registry,
            config,
            nodes: vec![Node {
                parent: None,
                kind: NodeKind::Root,
                time: Duration::ZERO,
                depth: 0,
            }],
            snapshots,
            commits_since_snapshot: 0,
        })
    }

    /// The registry this history records against.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The initial node.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes recorded.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: the root exists from construction.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of materialized snapshots, including the root.
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    /// Simulated time at `at`.
    pub fn time(&self, at: NodeId) -> Result<Duration, HistoryError> {
        Ok(self.node(at)?.time)
    }

    // ── Recording ───────────────────────────────────────────────

    /// Move time forward by `elapsed`. A zero step returns `at` unchanged.
    pub fn advance(&mut self, at: NodeId, elapsed: Duration) -> Result<NodeId, HistoryError> {
        if elapsed.is_negative() {
            return Err(HistoryError::NegativeAdvance { elapsed });
        }
        if elapsed.is_zero() {
            self.node(at)?;
            return Ok(at);
        }
        let time = self.node(at)?.time.plus(elapsed)?;
        self.push(at, NodeKind::Advance { elapsed }, time)
    }

    /// Record an event on `topic` after `at`.
    pub fn emit<E: Send + Sync + 'static>(
        &mut self,
        at: NodeId,
        topic: &Topic<E>,
        event: E,
    ) -> Result<NodeId, HistoryError> {
        self.registry.check_topic(topic)?;
        let time = self.node(at)?.time;
        let event = Event {
            topic: topic.id(),
            payload: Arc::new(event),
        };
        self.push(at, NodeKind::Emit { event }, time)
    }

    /// Start a branch at `at`.
    pub fn fork(&self, at: NodeId) -> Result<Branch, HistoryError> {
        self.node(at)?;
        Ok(Branch { anchor: at, tip: at })
    }

    /// Append to a branch, moving its tip.
    pub fn emit_on<E: Send + Sync + 'static>(
        &mut self,
        branch: &mut Branch,
        topic: &Topic<E>,
        event: E,
    ) -> Result<(), HistoryError> {
        branch.tip = self.emit(branch.tip, topic, event)?;
        Ok(())
    }

    /// Join branches forked from `anchor`.
    ///
    /// Tips equal to `anchor` contribute nothing. A single changed tip is
    /// adopted as-is. Otherwise each branch's effects are folded in order,
    /// branches are combined per cell with `concurrently`, and one merge
    /// node is appended on top of `anchor`.
    pub fn merge(&mut self, anchor: NodeId, tips: &[NodeId]) -> Result<NodeId, HistoryError> {
        let changed: SmallVec<[NodeId; 4]> = tips.iter().copied().filter(|t| *t != anchor).collect();
        match changed.as_slice() {
            [] => {
                self.node(anchor)?;
                Ok(anchor)
            }
            [only] => {
                self.branch_path(anchor, *only)?;
                Ok(*only)
            }
            _ => {
                let mut combined: IndexMap<CellId, DynEffect> = IndexMap::new();
                for tip in &changed {
                    for (cell, effect) in self.fold_branch(anchor, *tip)? {
                        let merged = match combined.get(&cell) {
                            Some(existing) => self.concurrently(cell, existing, &effect)?,
                            None => effect,
                        };
                        combined.insert(cell, merged);
                    }
                }
                trace!(
                    %anchor,
                    branches = changed.len(),
                    cells = combined.len(),
                    "merging concurrent branches"
                );
                let time = self.node(anchor)?.time;
                self.push(anchor, NodeKind::Merge { effects: combined }, time)
            }
        }
    }

    /// Note that `at` is a committed trunk point, snapshotting it if the
    /// configured interval has elapsed.
    pub fn commit(&mut self, at: NodeId) -> Result<(), HistoryError> {
        self.commits_since_snapshot += 1;
        if self.commits_since_snapshot >= self.config.snapshot_interval {
            self.checkpoint(at)?;
        }
        Ok(())
    }

    /// Materialize and keep a full snapshot at `at`.
    pub fn checkpoint(&mut self, at: NodeId) -> Result<(), HistoryError> {
        self.commits_since_snapshot = 0;
        if self.snapshots.contains_key(&at) {
            return Ok(());
        }
        let cells = self.materialize(at)?;
        debug!(node = %at, snapshots = self.snapshots.len() + 1, "history snapshot");
        self.snapshots.insert(at, Snapshot { cells });
        Ok(())
    }

    // ── Reading ─────────────────────────────────────────────────

    /// Read cell `cell` as of `at`.
    pub fn query<C: Cell, R>(
        &self,
        at: NodeId,
        cell: &CellRef<C>,
        read: impl FnOnce(&C) -> R,
    ) -> Result<R, HistoryError> {
        let id = cell.id();
        let (base, path) = self.path_from_snapshot(at)?;
        let snapshot = self
            .snapshots
            .get(&base)
            .ok_or(HistoryError::UnknownNode { node: base })?;
        let mut state = snapshot
            .cells
            .get(id.0 as usize)
            .ok_or(HistoryError::UnknownCell { cell: id })?
            .duplicate();
        for node in path.iter().rev() {
            self.replay_cell(*node, id, state.as_mut())?;
        }
        let concrete = downcast_cell::<C>(state.as_ref()).ok_or(HistoryError::CellType {
            cell: id,
            expected: std::any::type_name::<C>(),
        })?;
        Ok(read(concrete))
    }

    /// Cells affected by anything recorded between `from` (exclusive) and
    /// `to` (inclusive). `to` must descend from `from`.
    pub fn touched_cells(&self, from: NodeId, to: NodeId) -> Result<IndexSet<CellId>, HistoryError> {
        let mut touched = IndexSet::new();
        let from_depth = self.node(from)?.depth;
        let mut cursor = to;
        while cursor != from {
            let node = self.node(cursor)?;
            if node.depth <= from_depth {
                return Err(HistoryError::NotDescendant {
                    anchor: from,
                    tip: to,
                });
            }
            match &node.kind {
                NodeKind::Emit { event } => {
                    touched.extend(self.registry.subscribers(event.topic)?.iter().map(|s| s.cell));
                }
                NodeKind::Merge { effects } => touched.extend(effects.keys().copied()),
                NodeKind::Root | NodeKind::Advance { .. } => {}
            }
            cursor = node.parent.ok_or(HistoryError::NotDescendant {
                anchor: from,
                tip: to,
            })?;
        }
        Ok(touched)
    }

    // ── Internals ───────────────────────────────────────────────

    fn node(&self, id: NodeId) -> Result<&Node, HistoryError> {
        self.nodes
            .get(id.index())
            .ok_or(HistoryError::UnknownNode { node: id })
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind, time: Duration) -> Result<NodeId, HistoryError> {
        let depth = self.node(parent)?.depth + 1;
        let id = NodeId(u32::try_from(self.nodes.len()).map_err(|_| HistoryError::NodeLimit)?);
        self.nodes.push(Node {
            parent: Some(parent),
            kind,
            time,
            depth,
        });
        Ok(id)
    }

    /// Nodes from `tip` back to (excluding) the nearest snapshotted
    /// ancestor, newest first.
    fn path_from_snapshot(&self, tip: NodeId) -> Result<(NodeId, SmallVec<[NodeId; 16]>), HistoryError> {
        let mut path = SmallVec::new();
        let mut cursor = tip;
        loop {
            if self.snapshots.contains_key(&cursor) {
                return Ok((cursor, path));
            }
            path.push(cursor);
            cursor = self
                .node(cursor)?
                .parent
                .ok_or(HistoryError::UnknownNode { node: cursor })?;
        }
    }

    /// Nodes from `tip` back to (excluding) `anchor`, newest first.
    fn branch_path(&self, anchor: NodeId, tip: NodeId) -> Result<SmallVec<[NodeId; 16]>, HistoryError> {
        let anchor_depth = self.node(anchor)?.depth;
        let mut path = SmallVec::new();
        let mut cursor = tip;
        while cursor != anchor {
            let node = self.node(cursor)?;
            if node.depth <= anchor_depth {
                return Err(HistoryError::NotDescendant { anchor, tip });
            }
            if matches!(node.kind, NodeKind::Advance { .. }) {
                return Err(HistoryError::BranchAdvanced { anchor, tip });
            }
            path.push(cursor);
            cursor = node.parent.ok_or(HistoryError::NotDescendant { anchor, tip })?;
        }
        Ok(path)
    }

    /// Sequential per-cell effect of everything on the branch.
    fn fold_branch(&self, anchor: NodeId, tip: NodeId) -> Result<IndexMap<CellId, DynEffect>, HistoryError> {
        let mut effects: IndexMap<CellId, DynEffect> = IndexMap::new();
        for id in self.branch_path(anchor, tip)?.iter().rev() {
            match &self.node(*id)?.kind {
                NodeKind::Emit { event } => {
                    for (cell, effect) in self.registry.project(event)? {
                        self.append_sequential(&mut effects, cell, effect)?;
                    }
                }
                NodeKind::Merge { effects: merged } => {
                    for (cell, effect) in merged {
                        self.append_sequential(&mut effects, *cell, Arc::clone(effect))?;
                    }
                }
                NodeKind::Root | NodeKind::Advance { .. } => {
                    return Err(HistoryError::NotDescendant { anchor, tip });
                }
            }
        }
        Ok(effects)
    }

    fn append_sequential(
        &self,
        effects: &mut IndexMap<CellId, DynEffect>,
        cell: CellId,
        effect: DynEffect,
    ) -> Result<(), HistoryError> {
        let next = match effects.get(&cell) {
            Some(prefix) => self
                .registry
                .slot(cell)?
                .initial
                .sequentially(prefix, &effect)
                .ok_or(HistoryError::EffectType { cell })?,
            None => effect,
        };
        effects.insert(cell, next);
        Ok(())
    }

    fn concurrently(&self, cell: CellId, left: &DynEffect, right: &DynEffect) -> Result<DynEffect, HistoryError> {
        self.registry
            .slot(cell)?
            .initial
            .concurrently(left, right)
            .ok_or(HistoryError::EffectType { cell })?
            .map_err(|source| HistoryError::Conflict { cell, source })
    }

    fn materialize(&self, at: NodeId) -> Result<Vec<Box<dyn DynCell>>, HistoryError> {
        let (base, path) = self.path_from_snapshot(at)?;
        let snapshot = self
            .snapshots
            .get(&base)
            .ok_or(HistoryError::UnknownNode { node: base })?;
        let mut cells: Vec<Box<dyn DynCell>> = snapshot.cells.iter().map(|c| c.duplicate()).collect();
        for id in path.iter().rev() {
            match &self.node(*id)?.kind {
                NodeKind::Root => {}
                NodeKind::Advance { elapsed } => {
                    for cell in cells.iter_mut() {
                        cell.step(*elapsed);
                    }
                }
                NodeKind::Emit { event } => {
                    for (cell, effect) in self.registry.project(event)? {
                        react(&mut cells, cell, &effect)?;
                    }
                }
                NodeKind::Merge { effects } => {
                    for (cell, effect) in effects {
                        react(&mut cells, *cell, effect)?;
                    }
                }
            }
        }
        Ok(cells)
    }

    fn replay_cell(&self, at: NodeId, cell: CellId, state: &mut dyn DynCell) -> Result<(), HistoryError> {
        match &self.node(at)?.kind {
            NodeKind::Root => {}
            NodeKind::Advance { elapsed } => state.step(*elapsed),
            NodeKind::Emit { event } => {
                for sub in self.registry.subscribers(event.topic)? {
                    if sub.cell == cell {
                        let effect = sub.apply(event).ok_or(HistoryError::EffectType { cell })?;
                        if !state.react(&effect) {
                            return Err(HistoryError::EffectType { cell });
                        }
                    }
                }
            }
            NodeKind::Merge { effects } => {
                if let Some(effect) = effects.get(&cell) {
                    if !state.react(effect) {
                        return Err(HistoryError::EffectType { cell });
                    }
                }
            }
        }
        Ok(())
    }
}

fn react(cells: &mut [Box<dyn DynCell>], cell: CellId, effect: &DynEffect) -> Result<(), HistoryError> {
    let state = cells
        .get_mut(cell.0 as usize)
        .ok_or(HistoryError::UnknownCell { cell })?;
    if state.react(effect) {
        Ok(())
    } else {
        Err(HistoryError::EffectType { cell })
    }
}

impl std::fmt::Debug for History {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("History")
            .field("nodes", &self.nodes.len())
            .field("snapshots", &self.snapshots.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryBuilder;
    use sortie_cells::{AccumulatorCell, LinearEffect, RegisterCell, SetEffect};

    struct Fixture {
        history: History,
        fruit: CellRef<AccumulatorCell>,
        fruit_topic: Topic<LinearEffect>,
        producer: CellRef<RegisterCell<String>>,
        producer_topic: Topic<SetEffect<String>>,
    }

    fn fixture(snapshot_interval: usize) -> Fixture {
        let mut b = RegistryBuilder::new();
        let (fruit, fruit_topic) = b.allocate_with_topic("fruit", AccumulatorCell::new(0.0, 0.0));
        let (producer, producer_topic) =
            b.allocate_with_topic("producer", RegisterCell::new("Chiquita".to_string()));
        let history = History::new(Arc::new(b.build()), HistoryConfig { snapshot_interval }).unwrap();
        Fixture {
            history,
            fruit,
            fruit_topic,
            producer,
            producer_topic,
        }
    }

    fn volume(h: &History, at: NodeId, cell: &CellRef<AccumulatorCell>) -> f64 {
        h.query(at, cell, |c| c.volume()).unwrap()
    }

    #[test]
    fn root_holds_initial_state() {
        let f = fixture(4);
        assert_eq!(volume(&f.history, f.history.root(), &f.fruit), 0.0);
        assert_eq!(f.history.snapshot_count(), 1);
    }

    #[test]
    fn emit_is_visible_downstream_only() {
        let mut f = fixture(4);
        let root = f.history.root();
        let n1 = f.history.emit(root, &f.fruit_topic, LinearEffect::volume(2.0)).unwrap();
        assert_eq!(volume(&f.history, n1, &f.fruit), 2.0);
        assert_eq!(volume(&f.history, root, &f.fruit), 0.0);
    }

    #[test]
    fn advance_steps_dynamics() {
        let mut f = fixture(4);
        let root = f.history.root();
        let n1 = f.history.emit(root, &f.fruit_topic, LinearEffect::rate(1.0)).unwrap();
        let n2 = f.history.advance(n1, Duration::of(3, Duration::SECOND).unwrap()).unwrap();
        assert_eq!(f.history.time(n2).unwrap(), Duration::of(3, Duration::SECOND).unwrap());
        assert_eq!(volume(&f.history, n2, &f.fruit), 3.0);
        assert_eq!(f.history.advance(n2, Duration::ZERO).unwrap(), n2);
        assert!(matches!(
            f.history.advance(n2, Duration::from_micros(-1)),
            Err(HistoryError::NegativeAdvance { .. })
        ));
    }

    #[test]
    fn sibling_branches_are_isolated_until_merge() {
        let mut f = fixture(4);
        let root = f.history.root();
        let mut left = f.history.fork(root).unwrap();
        let mut right = f.history.fork(root).unwrap();
        f.history.emit_on(&mut left, &f.fruit_topic, LinearEffect::volume(3.0)).unwrap();
        f.history.emit_on(&mut right, &f.fruit_topic, LinearEffect::volume(7.0)).unwrap();
        assert_eq!(volume(&f.history, left.tip, &f.fruit), 3.0);
        assert_eq!(volume(&f.history, right.tip, &f.fruit), 7.0);
        let merged = f.history.merge(root, &[left.tip, right.tip]).unwrap();
        assert_eq!(volume(&f.history, merged, &f.fruit), 10.0);
    }

    #[test]
    fn single_changed_branch_is_adopted() {
        let mut f = fixture(4);
        let root = f.history.root();
        let mut b = f.history.fork(root).unwrap();
        f.history.emit_on(&mut b, &f.fruit_topic, LinearEffect::volume(1.0)).unwrap();
        let merged = f.history.merge(root, &[root, b.tip, root]).unwrap();
        assert_eq!(merged, b.tip);
        assert_eq!(f.history.merge(root, &[root]).unwrap(), root);
    }

    #[test]
    fn conflicting_sets_are_rejected() {
        let mut f = fixture(4);
        let root = f.history.root();
        let a = f.history.emit(root, &f.producer_topic, SetEffect::Set("Dole".into())).unwrap();
        let b = f
            .history
            .emit(root, &f.producer_topic, SetEffect::Set("Chiquita".into()))
            .unwrap();
        let err = f.history.merge(root, &[a, b]).unwrap_err();
        assert!(matches!(err, HistoryError::Conflict { cell, .. } if cell == f.producer.id()));
    }

    #[test]
    fn merge_rejects_foreign_and_advanced_branches() {
        let mut f = fixture(4);
        let root = f.history.root();
        let a = f.history.emit(root, &f.fruit_topic, LinearEffect::volume(1.0)).unwrap();
        let b = f.history.emit(root, &f.fruit_topic, LinearEffect::volume(1.0)).unwrap();
        assert!(matches!(f.history.merge(a, &[b, a]), Err(HistoryError::NotDescendant { .. })));
        let late = f.history.advance(b, Duration::SECOND).unwrap();
        assert!(matches!(
            f.history.merge(root, &[a, late]),
            Err(HistoryError::BranchAdvanced { .. })
        ));
    }

    #[test]
    fn nested_merges_fold_into_outer_merge() {
        let mut f = fixture(4);
        let root = f.history.root();
        // Outer branch A spawns an inner split at `a1`.
        let a1 = f.history.emit(root, &f.fruit_topic, LinearEffect::volume(1.0)).unwrap();
        let inner_left = f.history.emit(a1, &f.fruit_topic, LinearEffect::volume(2.0)).unwrap();
        let inner_right = f.history.emit(a1, &f.fruit_topic, LinearEffect::volume(4.0)).unwrap();
        let a_tip = f.history.merge(a1, &[inner_left, inner_right]).unwrap();
        let b_tip = f.history.emit(root, &f.fruit_topic, LinearEffect::volume(8.0)).unwrap();
        let merged = f.history.merge(root, &[a_tip, b_tip]).unwrap();
        assert_eq!(volume(&f.history, merged, &f.fruit), 15.0);
    }

    #[test]
    fn snapshots_follow_commit_interval() {
        let mut f = fixture(2);
        let mut tip = f.history.root();
        for i in 0..6 {
            tip = f.history.emit(tip, &f.fruit_topic, LinearEffect::volume(1.0)).unwrap();
            tip = f.history.advance(tip, Duration::SECOND).unwrap();
            f.history.commit(tip).unwrap();
            assert_eq!(volume(&f.history, tip, &f.fruit), f64::from(i + 1));
        }
        assert_eq!(f.history.snapshot_count(), 4);
    }

    #[test]
    fn touched_cells_reports_emits_and_merges() {
        let mut f = fixture(4);
        let root = f.history.root();
        let a = f.history.emit(root, &f.fruit_topic, LinearEffect::volume(1.0)).unwrap();
        let b = f
            .history
            .emit(root, &f.producer_topic, SetEffect::Set("Dole".into()))
            .unwrap();
        let merged = f.history.merge(root, &[a, b]).unwrap();
        let t = f.history.advance(merged, Duration::SECOND).unwrap();
        let touched = f.history.touched_cells(root, t).unwrap();
        assert!(touched.contains(&f.fruit.id()));
        assert!(touched.contains(&f.producer.id()));
        assert!(f.history.touched_cells(t, t).unwrap().is_empty());
    }
}
