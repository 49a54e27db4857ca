//! Reference cells for the Sortie simulation core.
//!
//! Each cell pairs a state type with an effect algebra, covering the three
//! merge policies mission models need most often:
//!
//! - [`AccumulatorCell`]: linear volume/rate integration; concurrent effects sum.
//! - [`CounterCell`]: integer tally; concurrent effects sum.
//! - [`RegisterCell`]: absolute "set" value; concurrent *different* sets are
//!   rejected as a modeling error rather than resolved by ordering.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod accumulator;
pub mod counter;
pub mod register;

pub use accumulator::{AccumulatorCell, LinearEffect};
pub use counter::{CounterCell, CounterEffect};
pub use register::{RegisterCell, SetEffect};
