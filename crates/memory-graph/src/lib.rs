//! Relationship/contradiction graph between memories (spec §3, §4.I).

pub mod graph;
pub mod migrations;

pub use graph::{load_all, persist_edge, remove_persisted_edge, EdgeDirection, GraphManager, GraphStats};
