//! Branching effect history for the Sortie simulation core.
//!
//! The [`History`] is an append-only arena of immutable nodes. Each node
//! points at its predecessor and records one step of causality: time
//! advancing, an event being emitted, or the combined effects of several
//! concurrent branches being merged. Cell values are never stored per node;
//! they are recovered by replaying from the nearest materialized snapshot.
//!
//! # Architecture
//!
//! ```text
//! Registry (immutable, shared)       History (per engine)
//! ┌──────────────────────────┐       ┌──────────────────────────────┐
//! │ cells: initial + algebra │◄──────│ nodes: Vec<Node>              │
//! │ topics: subscriptions    │       │ snapshots: NodeId → cells     │
//! └──────────────────────────┘       └──────────────────────────────┘
//!                                       ▲ fork / emit / merge
//!                                       │ query via Querier
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod history;
pub mod node;
pub mod query;
pub mod registry;

pub use config::HistoryConfig;
pub use error::HistoryError;
pub use history::{Branch, History};
pub use node::NodeId;
pub use query::Querier;
pub use registry::{Registry, RegistryBuilder};
