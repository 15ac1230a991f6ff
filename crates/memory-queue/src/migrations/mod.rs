//! Migration runner for the ingestion-queue sidecar, same pattern as
//! `memory-storage::migrations`.

mod v001_queue_tables;

use rusqlite::Connection;
use tracing::{debug, info, warn};

use memory_core::error::{MemoryError, MemoryResult};

pub const LATEST_VERSION: u32 = 1;

type MigrationFn = fn(&Connection) -> MemoryResult<()>;

const MIGRATIONS: [(u32, &str, MigrationFn); 1] = [(1, "queue_tables", v001_queue_tables::migrate)];

pub fn current_version(conn: &Connection) -> MemoryResult<u32> {
    let exists: bool = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='queue_schema_version'")
        .and_then(|mut stmt| stmt.exists([]))
        .map_err(MemoryError::dependency_failed)?;
    if !exists {
        conn.execute_batch(
            "CREATE TABLE queue_schema_version (version INTEGER NOT NULL PRIMARY KEY, applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')));",
        )
        .map_err(MemoryError::dependency_failed)?;
        return Ok(0);
    }
    conn.query_row("SELECT COALESCE(MAX(version), 0) FROM queue_schema_version", [], |row| row.get(0))
        .map_err(MemoryError::dependency_failed)
}

pub fn run_migrations(conn: &Connection) -> MemoryResult<u32> {
    let current = current_version(conn)?;
    if current >= LATEST_VERSION {
        debug!(current, "queue sidecar schema up to date");
        return Ok(0);
    }
    info!(from = current, to = LATEST_VERSION, "running queue sidecar migrations");

    let mut applied = 0;
    for &(version, name, migrate_fn) in &MIGRATIONS {
        if version <= current {
            continue;
        }
        conn.execute_batch("BEGIN IMMEDIATE").map_err(MemoryError::dependency_failed)?;
        match migrate_fn(conn) {
            Ok(()) => {
                conn.execute("INSERT INTO queue_schema_version (version) VALUES (?1)", [version])
                    .map_err(MemoryError::dependency_failed)?;
                conn.execute_batch("COMMIT").map_err(MemoryError::dependency_failed)?;
                info!(version, name, "applied migration");
                applied += 1;
            }
            Err(e) => {
                warn!(version, name, error = %e, "migration failed, rolling back");
                let _ = conn.execute_batch("ROLLBACK");
                return Err(e);
            }
        }
    }
    Ok(applied)
}
