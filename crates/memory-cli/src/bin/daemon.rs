//! Long-running background process (spec §4.K, §5): drains the
//! ingestion queue at-least-once, running the consolidator on each
//! claimed job. This is the "single long-running background process"
//! spec §5 distinguishes from the ephemeral hook/CLI/dashboard callers --
//! the session-end hook only ever enqueues; this binary is what actually
//! runs the consolidator.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing_subscriber::EnvFilter;

use memory_consolidation::ConsolidationEngine;
use memory_core::error::{MemoryError, MemoryResult};
use memory_queue::IngestJob;

#[path = "../context.rs"]
mod context;

use context::AppContext;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run().await {
        tracing::error!(error = %err, "daemon exited");
        std::process::exit(err.exit_code());
    }
}

async fn run() -> MemoryResult<()> {
    let ctx = Arc::new(AppContext::load()?);
    let queue_db = ctx.session_db_path();
    let queue_config = ctx.config.queue.clone();

    tracing::info!(queue_db = %queue_db.display(), "starting ingestion consumer");

    reclaim_stale(&queue_db).await?;

    memory_queue::consumer::run_forever(queue_db, queue_config, move |job| {
        let ctx = ctx.clone();
        async move { process_job(ctx, job).await }
    })
    .await;

    Ok(())
}

async fn reclaim_stale(queue_db: &PathBuf) -> MemoryResult<()> {
    let queue_db = queue_db.clone();
    tokio::task::spawn_blocking(move || memory_queue::consumer::reclaim_stale_blocking(&queue_db, 300))
        .await
        .map_err(|e| MemoryError::dependency_failed(format!("reclaim task panicked: {e}")))??;
    Ok(())
}

/// Reads the transcript off disk and runs one consolidation sweep. Every
/// blocking step (file I/O, SQLite, the consolidator's regex pass) is
/// pushed onto `spawn_blocking` since none of it is `Send`-across-`.await`
/// friendly and none of it belongs on an async executor thread.
async fn process_job(ctx: Arc<AppContext>, job: IngestJob) -> MemoryResult<()> {
    tokio::task::spawn_blocking(move || -> MemoryResult<()> {
        let transcript = std::fs::read_to_string(&job.transcript_path)?;
        let fsrs_conn = ctx.fsrs_conn()?;
        let engine = ConsolidationEngine::with_decay_config(ctx.config.consolidation.clone(), ctx.config.decay.clone());

        let report = engine.consolidate(
            ctx.store.as_ref(),
            &fsrs_conn,
            &job.project_id,
            Some(job.session_id.as_str()),
            &transcript,
            Utc::now(),
        )?;

        tracing::info!(
            project_id = %job.project_id,
            session_id = %job.session_id,
            created = report.created,
            duplicates_skipped = report.duplicates_skipped,
            quality_score = report.quality_score,
            "consolidated session transcript"
        );
        Ok(())
    })
    .await
    .map_err(|e| MemoryError::dependency_failed(format!("consolidation task panicked: {e}")))?
}
