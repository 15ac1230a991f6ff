//! Migration runner for retrieval's sidecar tables, same discipline as
//! `memory-storage::migrations`: versioned, forward-only, one transaction
//! per step.

mod v001_retrieval_tables;

use rusqlite::Connection;
use tracing::{debug, info, warn};

use memory_core::error::{MemoryError, MemoryResult};

pub const LATEST_VERSION: u32 = 1;

type MigrationFn = fn(&Connection) -> MemoryResult<()>;

const MIGRATIONS: [(u32, &str, MigrationFn); 1] = [(1, "retrieval_tables", v001_retrieval_tables::migrate)];

pub fn current_version(conn: &Connection) -> MemoryResult<u32> {
    let exists: bool = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='retrieval_schema_version'")
        .and_then(|mut stmt| stmt.exists([]))
        .map_err(MemoryError::dependency_failed)?;
    if !exists {
        conn.execute_batch(
            "CREATE TABLE retrieval_schema_version (version INTEGER NOT NULL PRIMARY KEY, applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')));",
        )
        .map_err(MemoryError::dependency_failed)?;
        return Ok(0);
    }
    conn.query_row("SELECT COALESCE(MAX(version), 0) FROM retrieval_schema_version", [], |row| row.get(0))
        .map_err(MemoryError::dependency_failed)
}

pub fn run_migrations(conn: &Connection) -> MemoryResult<u32> {
    let current = current_version(conn)?;
    if current >= LATEST_VERSION {
        debug!(current, "retrieval sidecar schema up to date");
        return Ok(0);
    }
    info!(from = current, to = LATEST_VERSION, "running retrieval sidecar migrations");

    let mut applied = 0;
    for &(version, name, migrate_fn) in &MIGRATIONS {
        if version <= current {
            continue;
        }
        conn.execute_batch("BEGIN IMMEDIATE").map_err(MemoryError::dependency_failed)?;
        match migrate_fn(conn) {
            Ok(()) => {
                conn.execute("INSERT INTO retrieval_schema_version (version) VALUES (?1)", [version])
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_migrations_once() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(run_migrations(&conn).unwrap(), 1);
        assert_eq!(run_migrations(&conn).unwrap(), 0);
    }
}
