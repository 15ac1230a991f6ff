//! Durable append-only ingestion queue (spec §4.F, §4.K).
//!
//! `queue_jobs` is the source of truth for unconsolidated transcripts.
//! Claiming a job flips it to `in_progress` and bumps `attempts` in one
//! statement, so two consumers racing on the same row never both win. A
//! process that crashes mid-job leaves the row `in_progress`;
//! `reclaim_stale` requeues rows stuck past a staleness window. Delivery
//! is at-least-once -- the consolidator's fuzzy dedup step (spec §4.F)
//! makes a replayed job harmless.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use memory_core::error::{MemoryError, MemoryResult};

use crate::job::{IngestJob, QueuedJob};

pub fn enqueue(conn: &Connection, job: &IngestJob) -> MemoryResult<i64> {
    let now = Utc::now().to_rfc3339();
    let payload = serde_json::to_string(job).map_err(MemoryError::from)?;
    conn.execute(
        "INSERT INTO queue_jobs (payload, status, attempts, created_at, updated_at)
         VALUES (?1, 'pending', 0, ?2, ?2)",
        params![payload, now],
    )
    .map_err(MemoryError::dependency_failed)?;
    Ok(conn.last_insert_rowid())
}

/// Atomically claims the oldest pending job, if any.
pub fn claim_next(conn: &Connection, now: DateTime<Utc>) -> MemoryResult<Option<QueuedJob>> {
    let row = conn
        .query_row(
            "SELECT id, payload, attempts, created_at FROM queue_jobs
             WHERE status = 'pending' ORDER BY id ASC LIMIT 1",
            [],
            |row| {
                let id: i64 = row.get(0)?;
                let payload: String = row.get(1)?;
                let attempts: u32 = row.get(2)?;
                let created_at: String = row.get(3)?;
                Ok((id, payload, attempts, created_at))
            },
        )
        .optional()
        .map_err(MemoryError::dependency_failed)?;

    let Some((id, payload, attempts, created_at)) = row else { return Ok(None) };

    let updated = conn
        .execute(
            "UPDATE queue_jobs SET status = 'in_progress', attempts = attempts + 1, updated_at = ?2
             WHERE id = ?1 AND status = 'pending'",
            params![id, now.to_rfc3339()],
        )
        .map_err(MemoryError::dependency_failed)?;
    if updated == 0 {
        // Lost the race to another consumer.
        return Ok(None);
    }

    let job: IngestJob = serde_json::from_str(&payload)
        .map_err(|e| MemoryError::corruption("queue_jobs", format!("unreadable payload: {e}")))?;
    Ok(Some(QueuedJob {
        id,
        job,
        attempts: attempts + 1,
        created_at: created_at.parse().unwrap_or(now),
    }))
}

pub fn mark_done(conn: &Connection, id: i64) -> MemoryResult<()> {
    conn.execute(
        "UPDATE queue_jobs SET status = 'done', updated_at = ?2 WHERE id = ?1",
        params![id, Utc::now().to_rfc3339()],
    )
    .map_err(MemoryError::dependency_failed)?;
    Ok(())
}

/// Marks a claimed job failed. Jobs below `max_retries` go back to
/// `pending`; jobs at or above it move to `dead` and stop being claimed.
pub fn mark_failed(conn: &Connection, id: i64, error: &str, max_retries: u32) -> MemoryResult<()> {
    let attempts: u32 = conn
        .query_row("SELECT attempts FROM queue_jobs WHERE id = ?1", params![id], |row| row.get(0))
        .map_err(MemoryError::dependency_failed)?;
    let next_status = if attempts >= max_retries { "dead" } else { "pending" };
    conn.execute(
        "UPDATE queue_jobs SET status = ?2, last_error = ?3, updated_at = ?4 WHERE id = ?1",
        params![id, next_status, error, Utc::now().to_rfc3339()],
    )
    .map_err(MemoryError::dependency_failed)?;
    Ok(())
}

/// Requeues `in_progress` jobs whose `updated_at` is older than
/// `stale_after_s` seconds, recovering from a consumer crash.
pub fn reclaim_stale(conn: &Connection, now: DateTime<Utc>, stale_after_s: i64) -> MemoryResult<usize> {
    let cutoff = (now - chrono::Duration::seconds(stale_after_s)).to_rfc3339();
    let n = conn
        .execute(
            "UPDATE queue_jobs SET status = 'pending', updated_at = ?2
             WHERE status = 'in_progress' AND updated_at < ?1",
            params![cutoff, now.to_rfc3339()],
        )
        .map_err(MemoryError::dependency_failed)?;
    Ok(n)
}

pub fn pending_count(conn: &Connection) -> MemoryResult<usize> {
    conn.query_row("SELECT COUNT(*) FROM queue_jobs WHERE status = 'pending'", [], |row| row.get::<_, i64>(0))
        .map(|n| n as usize)
        .map_err(MemoryError::dependency_failed)
}

pub fn dead_letter_count(conn: &Connection) -> MemoryResult<usize> {
    conn.query_row("SELECT COUNT(*) FROM queue_jobs WHERE status = 'dead'", [], |row| row.get::<_, i64>(0))
        .map(|n| n as usize)
        .map_err(MemoryError::dependency_failed)
}
