//! The unit of work carried by the ingestion queue: a pointer to one raw
//! transcript awaiting consolidation (spec §4.F, §4.K). The hook payload
//! (spec §6) carries `transcript_path`, not the transcript body itself,
//! so the hook's own write to the queue table stays small and the actual
//! read happens off the host's latency-critical path, in the consumer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestJob {
    pub project_id: String,
    pub session_id: String,
    pub transcript_path: String,
}

/// A queued job as stored in `queue_jobs`, with its retry bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedJob {
    pub id: i64,
    pub job: IngestJob,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
}
