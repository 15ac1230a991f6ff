//! File-backed markdown memory store plus its SQL sidecar (spec §4.A).
//!
//! The markdown tree under `memory_dir` is the source of truth; the
//! `memories` index table in the intelligence sidecar is a derived,
//! rebuildable cache used by the other crates for fast filtering.

pub mod locks;
pub mod markdown;
pub mod migrations;
pub mod pool;
pub mod reindex;

pub use locks::LockTable;
pub use markdown::{ListFilters, MarkdownStore};
pub use pool::SqlitePool;
