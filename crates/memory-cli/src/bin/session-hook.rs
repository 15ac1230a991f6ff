//! Session-end hook. Reads a transcript payload from stdin, enqueues it
//! for consolidation, and always exits 0 — a hook that can fail the
//! caller's shell session is worse than one that silently drops a job.

use std::io::Read;

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use memory_queue::IngestJob;

#[derive(Debug, Deserialize)]
struct HookPayload {
    project_id: String,
    session_id: String,
    transcript_path: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run() {
        tracing::error!(error = %err, "session-hook failed to enqueue job");
    }
    std::process::exit(0);
}

fn run() -> memory_core::error::MemoryResult<()> {
    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .map_err(memory_core::error::MemoryError::from)?;

    let payload: HookPayload = serde_json::from_str(&raw).map_err(memory_core::error::MemoryError::from)?;

    let job = IngestJob {
        project_id: payload.project_id,
        session_id: payload.session_id,
        transcript_path: payload.transcript_path,
    };

    let config_path = std::env::var("MEMORY_SYSTEM_CONFIG").unwrap_or_else(|_| "./memory-system.toml".to_string());
    let mut config = match std::fs::read_to_string(&config_path) {
        Ok(contents) => memory_core::config::MemoryConfig::from_toml(&contents)?,
        Err(_) => memory_core::config::MemoryConfig::default(),
    };
    config.apply_env_overrides();

    if let Some(parent) = std::path::Path::new(&config.storage.session_db).parent() {
        std::fs::create_dir_all(parent).map_err(memory_core::error::MemoryError::from)?;
    }
    let conn = rusqlite::Connection::open(&config.storage.session_db).map_err(memory_core::error::MemoryError::dependency_failed)?;
    memory_queue::migrations::run_migrations(&conn)?;
    let job_id = memory_queue::enqueue(&conn, &job)?;
    tracing::info!(job_id, project_id = %job.project_id, "enqueued ingestion job");
    Ok(())
}
