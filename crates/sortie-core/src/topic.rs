//! Typed handles for cells and topics.
//!
//! Handles carry only an id plus a phantom type, so they are `Copy` and can
//! be captured freely by activity closures. The type parameter ties each
//! handle to the cell or event type registered for it, which lets the
//! history layer downcast type-erased storage without a runtime lookup
//! table on the caller's side.

use std::fmt;
use std::marker::PhantomData;

use crate::cell::Cell;
use crate::id::{CellId, TopicId};

/// Read handle for a cell of type `C`.
pub struct CellRef<C> {
    id: CellId,
    _cell: PhantomData<fn() -> C>,
}

impl<C: Cell> CellRef<C> {
    /// Wrap a registered cell id. Only the registry should mint these.
    pub fn from_id(id: CellId) -> Self {
        Self {
            id,
            _cell: PhantomData,
        }
    }

    /// The underlying id.
    pub fn id(&self) -> CellId {
        self.id
    }
}

impl<C> Clone for CellRef<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for CellRef<C> {}

impl<C> PartialEq for CellRef<C> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<C> Eq for CellRef<C> {}

impl<C> fmt::Debug for CellRef<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CellRef").field(&self.id).finish()
    }
}

/// Routing handle for events of type `E`.
///
/// Events emitted on a topic are projected into effects on every cell
/// subscribed to it.
pub struct Topic<E> {
    id: TopicId,
    _event: PhantomData<fn(E)>,
}

impl<E> Topic<E> {
    /// Wrap a registered topic id. Only the registry should mint these.
    pub fn from_id(id: TopicId) -> Self {
        Self {
            id,
            _event: PhantomData,
        }
    }

    /// The underlying id.
    pub fn id(&self) -> TopicId {
        self.id
    }
}

impl<E> Clone for Topic<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for Topic<E> {}

impl<E> PartialEq for Topic<E> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<E> Eq for Topic<E> {}

impl<E> fmt::Debug for Topic<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Topic").field(&self.id).finish()
    }
}
