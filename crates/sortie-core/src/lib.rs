//! Core types and traits for the Sortie mission simulation core.
//!
//! This is the leaf crate with zero internal Sortie dependencies. It defines
//! the fixed-resolution [`Duration`] clock, strongly-typed identifiers, the
//! [`Cell`]/[`EffectTrait`] contract for simulated state, typed handles for
//! cells and topics, serialized activity arguments and their schemas, and
//! the directive/schedule vocabulary consumed by the engine.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod cell;
pub mod directive;
pub mod dynamics;
pub mod error;
pub mod id;
pub mod time;
pub mod topic;
pub mod value;

pub use cell::{Cell, EffectTrait};
pub use directive::{Anchor, Directive, Schedule, SerializedActivity};
pub use dynamics::RealDynamics;
pub use error::{EffectConflict, TimeError};
pub use id::{ActivityDirectiveId, CellId, TaskId, TopicId};
pub use time::{Duration, Window};
pub use topic::{CellRef, Topic};
pub use value::{Arguments, Parameter, SerializedValue, ValueSchema};
