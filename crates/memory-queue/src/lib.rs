//! Durable async ingestion queue for raw session transcripts awaiting
//! consolidation (spec §4.F, §4.K).

pub mod consumer;
pub mod job;
pub mod migrations;
pub mod queue;

pub use consumer::{reclaim_stale_blocking, run_forever, run_once};
pub use job::{IngestJob, QueuedJob};
pub use queue::{claim_next, dead_letter_count, enqueue, mark_done, mark_failed, pending_count, reclaim_stale};
