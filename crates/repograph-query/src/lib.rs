//! repograph-query — read-side API over the Project Knowledge Graph
//!
//! Every operation has an in-memory implementation over indexed maps; when
//! a graph database is attached, the database path runs first and any
//! failure falls back to the in-memory path transparently. Query outputs
//! are normalized to plain records regardless of path.

mod engine;

pub use engine::{Dependencies, ImpactSet, QueryEngine};
