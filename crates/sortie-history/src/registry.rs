//! Cell and topic registration with type erasure.
//!
//! Mission models allocate cells and topics through a [`RegistryBuilder`],
//! receiving typed [`CellRef`]/[`Topic`] handles. The built [`Registry`] is
//! immutable and shared (behind an `Arc`) by every history created for the
//! model, including histories rebuilt after an incremental reset.
//!
//! Internally each cell is boxed behind the object-safe `DynCell` trait,
//! which carries both the state operations and the effect algebra for that
//! cell's effect type. Handles make the downcasts infallible in practice;
//! a mismatch still surfaces as an error rather than a panic.

use std::any::{type_name, Any, TypeId};
use std::sync::Arc;

use smallvec::SmallVec;
use sortie_core::{Cell, CellId, CellRef, Duration, EffectConflict, EffectTrait, Topic, TopicId};
use tracing::debug;

use crate::error::HistoryError;
use crate::node::{DynEffect, Event};

// ── DynCell ─────────────────────────────────────────────────────

/// Object-safe view of a [`Cell`] plus its effect algebra.
pub(crate) trait DynCell: Send + Sync {
    fn duplicate(&self) -> Box<dyn DynCell>;
    /// Returns `false` if `effect` is not this cell's effect type.
    fn react(&mut self, effect: &DynEffect) -> bool;
    fn step(&mut self, elapsed: Duration);
    fn sequentially(&self, prefix: &DynEffect, suffix: &DynEffect) -> Option<DynEffect>;
    fn concurrently(
        &self,
        left: &DynEffect,
        right: &DynEffect,
    ) -> Option<Result<DynEffect, EffectConflict>>;
    fn as_any(&self) -> &dyn Any;
}

struct Erased<C>(C);

impl<C: Cell> DynCell for Erased<C> {
    fn duplicate(&self) -> Box<dyn DynCell> {
        Box::new(Erased(self.0.duplicate()))
    }

    fn react(&mut self, effect: &DynEffect) -> bool {
        match effect.downcast_ref::<C::Effect>() {
            Some(e) => {
                self.0.react(e);
                true
            }
            None => false,
        }
    }

    fn step(&mut self, elapsed: Duration) {
        self.0.step(elapsed);
    }

    fn sequentially(&self, prefix: &DynEffect, suffix: &DynEffect) -> Option<DynEffect> {
        let p = prefix.downcast_ref::<C::Effect>()?;
        let s = suffix.downcast_ref::<C::Effect>()?;
        Some(Arc::new(C::Effect::sequentially(p, s)))
    }

    fn concurrently(
        &self,
        left: &DynEffect,
        right: &DynEffect,
    ) -> Option<Result<DynEffect, EffectConflict>> {
        let l = left.downcast_ref::<C::Effect>()?;
        let r = right.downcast_ref::<C::Effect>()?;
        Some(C::Effect::concurrently(l, r).map(|e| Arc::new(e) as DynEffect))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Borrow the concrete cell out of a boxed `DynCell`.
pub(crate) fn downcast_cell<C: Cell>(cell: &dyn DynCell) -> Option<&C> {
    cell.as_any().downcast_ref::<Erased<C>>().map(|e| &e.0)
}

// ── Slots ───────────────────────────────────────────────────────

type Projection = Box<dyn Fn(&(dyn Any + Send + Sync)) -> Option<DynEffect> + Send + Sync>;

pub(crate) struct CellSlot {
    pub(crate) name: String,
    pub(crate) initial: Box<dyn DynCell>,
}

pub(crate) struct Subscription {
    pub(crate) cell: CellId,
    project: Projection,
}

struct TopicSlot {
    name: String,
    event_type: TypeId,
    subscribers: SmallVec<[Subscription; 2]>,
}

// ── RegistryBuilder ─────────────────────────────────────────────

/// Mutable registration phase for cells, topics, and subscriptions.
#[derive(Default)]
pub struct RegistryBuilder {
    cells: Vec<CellSlot>,
    topics: Vec<TopicSlot>,
}

impl RegistryBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cell with its initial state.
    pub fn allocate<C: Cell>(&mut self, name: impl Into<String>, initial: C) -> CellRef<C> {
        let id = CellId(self.cells.len() as u32);
        self.cells.push(CellSlot {
            name: name.into(),
            initial: Box::new(Erased(initial)),
        });
        CellRef::from_id(id)
    }

    /// Register a topic carrying events of type `E`.
    pub fn topic<E: Send + Sync + 'static>(&mut self, name: impl Into<String>) -> Topic<E> {
        let id = TopicId(self.topics.len() as u32);
        self.topics.push(TopicSlot {
            name: name.into(),
            event_type: TypeId::of::<E>(),
            subscribers: SmallVec::new(),
        });
        Topic::from_id(id)
    }

    /// Route events on `topic` into `cell` through `projection`.
    ///
    /// A topic may feed many cells and a cell may listen to many topics.
    pub fn subscribe<E, C, F>(
        &mut self,
        topic: &Topic<E>,
        cell: &CellRef<C>,
        projection: F,
    ) -> Result<(), HistoryError>
    where
        E: Send + Sync + 'static,
        C: Cell,
        F: Fn(&E) -> C::Effect + Send + Sync + 'static,
    {
        let slot = self
            .cells
            .get(cell.id().0 as usize)
            .ok_or(HistoryError::UnknownCell { cell: cell.id() })?;
        if downcast_cell::<C>(slot.initial.as_ref()).is_none() {
            return Err(HistoryError::CellType {
                cell: cell.id(),
                expected: type_name::<C>(),
            });
        }
        let topic_slot = self
            .topics
            .get_mut(topic.id().0 as usize)
            .ok_or(HistoryError::UnknownTopic { topic: topic.id() })?;
        if topic_slot.event_type != TypeId::of::<E>() {
            return Err(HistoryError::TopicType {
                topic: topic.id(),
                expected: type_name::<E>(),
            });
        }
        topic_slot.subscribers.push(Subscription {
            cell: cell.id(),
            project: Box::new(move |event: &(dyn Any + Send + Sync)| {
                event
                    .downcast_ref::<E>()
                    .map(|e| Arc::new(projection(e)) as DynEffect)
            }),
        });
        Ok(())
    }

    /// Allocate a cell together with a topic that feeds it effects directly.
    pub fn allocate_with_topic<C: Cell>(
        &mut self,
        name: impl Into<String>,
        initial: C,
    ) -> (CellRef<C>, Topic<C::Effect>) {
        let name = name.into();
        let cell = self.allocate(name.clone(), initial);
        let topic = self.topic::<C::Effect>(name);
        let cell_id = cell.id();
        if let Some(slot) = self.topics.get_mut(topic.id().0 as usize) {
            slot.subscribers.push(Subscription {
                cell: cell_id,
                project: Box::new(|event: &(dyn Any + Send + Sync)| {
                    event
                        .downcast_ref::<C::Effect>()
                        .map(|e| Arc::new(e.clone()) as DynEffect)
                }),
            });
        }
        (cell, topic)
    }

    /// Number of cells registered so far.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Freeze the registrations.
    pub fn build(self) -> Registry {
        debug!(
            cells = self.cells.len(),
            topics = self.topics.len(),
            "registry built"
        );
        Registry {
            cells: self.cells,
            topics: self.topics,
        }
    }
}

// ── Registry ────────────────────────────────────────────────────

/// Immutable catalog of a model's cells and topics.
pub struct Registry {
    cells: Vec<CellSlot>,
    topics: Vec<TopicSlot>,
}

impl Registry {
    /// Number of registered cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Number of registered topics.
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// Name given to a cell at allocation.
    pub fn cell_name(&self, cell: CellId) -> Option<&str> {
        self.cells.get(cell.0 as usize).map(|s| s.name.as_str())
    }

    /// Name given to a topic at registration.
    pub fn topic_name(&self, topic: TopicId) -> Option<&str> {
        self.topics.get(topic.0 as usize).map(|s| s.name.as_str())
    }

    pub(crate) fn slot(&self, cell: CellId) -> Result<&CellSlot, HistoryError> {
        self.cells
            .get(cell.0 as usize)
            .ok_or(HistoryError::UnknownCell { cell })
    }

    pub(crate) fn initial_cells(&self) -> Vec<Box<dyn DynCell>> {
        self.cells.iter().map(|s| s.initial.duplicate()).collect()
    }

    pub(crate) fn check_topic<E: 'static>(&self, topic: &Topic<E>) -> Result<(), HistoryError> {
        let slot = self
            .topics
            .get(topic.id().0 as usize)
            .ok_or(HistoryError::UnknownTopic { topic: topic.id() })?;
        if slot.event_type != TypeId::of::<E>() {
            return Err(HistoryError::TopicType {
                topic: topic.id(),
                expected: type_name::<E>(),
            });
        }
        Ok(())
    }

    pub(crate) fn subscribers(&self, topic: TopicId) -> Result<&[Subscription], HistoryError> {
        self.topics
            .get(topic.0 as usize)
            .map(|s| s.subscribers.as_slice())
            .ok_or(HistoryError::UnknownTopic { topic })
    }

    /// Project an event into `(cell, effect)` pairs, in subscription order.
    pub(crate) fn project(
        &self,
        event: &Event,
    ) -> Result<SmallVec<[(CellId, DynEffect); 2]>, HistoryError> {
        self.subscribers(event.topic)?
            .iter()
            .map(|sub| {
                sub.apply(event)
                    .map(|effect| (sub.cell, effect))
                    .ok_or(HistoryError::EffectType { cell: sub.cell })
            })
            .collect()
    }
}

impl Subscription {
    pub(crate) fn apply(&self, event: &Event) -> Option<DynEffect> {
        (self.project)(event.payload.as_ref())
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("cells", &self.cells.iter().map(|c| &c.name).collect::<Vec<_>>())
            .field("topics", &self.topics.iter().map(|t| &t.name).collect::<Vec<_>>())
            .finish()
    }
}
