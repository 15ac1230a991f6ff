//! Background consumer loop (spec §4.K). Polls `queue_jobs` on an
//! interval, claiming and running one job at a time. Each tick opens its
//! own `rusqlite::Connection` inside `spawn_blocking`, since `Connection`
//! is not `Send` across an `.await` point.

use std::future::Future;
use std::path::PathBuf;

use chrono::Utc;
use rusqlite::Connection;
use tracing::{error, info, warn};

use memory_core::config::QueueConfig;
use memory_core::error::{MemoryError, MemoryResult};

use crate::job::IngestJob;
use crate::queue;

fn open(db_path: &PathBuf) -> MemoryResult<Connection> {
    let conn = Connection::open(db_path).map_err(MemoryError::dependency_failed)?;
    crate::migrations::run_migrations(&conn)?;
    Ok(conn)
}

/// Claims and processes at most one job. Returns `true` if a job was
/// found (regardless of whether `handler` succeeded).
pub async fn run_once<F, Fut>(db_path: PathBuf, max_retries: u32, handler: F) -> MemoryResult<bool>
where
    F: FnOnce(IngestJob) -> Fut + Send + 'static,
    Fut: Future<Output = MemoryResult<()>> + Send,
{
    let claimed = {
        let db_path = db_path.clone();
        tokio::task::spawn_blocking(move || -> MemoryResult<_> {
            let conn = open(&db_path)?;
            queue::claim_next(&conn, Utc::now())
        })
        .await
        .map_err(|e| MemoryError::dependency_failed(format!("consumer task panicked: {e}")))??
    };

    let Some(claimed) = claimed else { return Ok(false) };
    let id = claimed.id;
    let result = handler(claimed.job).await;

    tokio::task::spawn_blocking(move || -> MemoryResult<()> {
        let conn = open(&db_path)?;
        match &result {
            Ok(()) => queue::mark_done(&conn, id),
            Err(e) => queue::mark_failed(&conn, id, &e.to_string(), max_retries),
        }
    })
    .await
    .map_err(|e| MemoryError::dependency_failed(format!("consumer task panicked: {e}")))??;

    Ok(true)
}

/// Runs `run_once` forever on `config.poll_interval_ms`, logging and
/// continuing past individual job failures so one bad transcript never
/// stalls the queue.
pub async fn run_forever<F, Fut>(db_path: PathBuf, config: QueueConfig, mut handler: F)
where
    F: FnMut(IngestJob) -> Fut + Send + 'static,
    Fut: Future<Output = MemoryResult<()>> + Send,
{
    info!(poll_interval_ms = config.poll_interval_ms, "ingestion queue consumer started");
    loop {
        let outcome = run_once(db_path.clone(), config.max_retries, |job| handler(job)).await;
        match outcome {
            Ok(true) => continue,
            Ok(false) => {
                tokio::time::sleep(std::time::Duration::from_millis(config.poll_interval_ms)).await;
            }
            Err(e) => {
                error!(error = %e, "consumer tick failed");
                tokio::time::sleep(std::time::Duration::from_millis(config.poll_interval_ms)).await;
            }
        }
    }
}

pub fn reclaim_stale_blocking(db_path: &PathBuf, stale_after_s: i64) -> MemoryResult<usize> {
    let conn = open(db_path)?;
    let n = queue::reclaim_stale(&conn, Utc::now(), stale_after_s)?;
    if n > 0 {
        warn!(count = n, "reclaimed stale in-progress jobs");
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn run_once_processes_a_pending_job() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("queue.db");
        {
            let conn = open(&db_path).unwrap();
            queue::enqueue(
                &conn,
                &IngestJob { project_id: "p".into(), session_id: "s".into(), transcript_path: "/tmp/hi.json".into() },
            )
            .unwrap();
        }

        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        let processed = run_once(db_path.clone(), 5, move |_job| {
            let seen = seen_clone.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await
        .unwrap();

        assert!(processed);
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        let conn = open(&db_path).unwrap();
        assert_eq!(queue::pending_count(&conn).unwrap(), 0);
    }

    #[tokio::test]
    async fn run_once_on_empty_queue_returns_false() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("queue.db");
        let processed = run_once(db_path, 5, |_job| async { Ok(()) }).await.unwrap();
        assert!(!processed);
    }
}
