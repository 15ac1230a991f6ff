use rusqlite::Connection;

use memory_core::error::{MemoryError, MemoryResult};

pub fn migrate(conn: &Connection) -> MemoryResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE queue_jobs (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            payload      TEXT NOT NULL,
            status       TEXT NOT NULL DEFAULT 'pending',
            attempts     INTEGER NOT NULL DEFAULT 0,
            last_error   TEXT,
            created_at   TEXT NOT NULL,
            updated_at   TEXT NOT NULL
        );
        CREATE INDEX idx_queue_jobs_status ON queue_jobs(status, id);
        ",
    )
    .map_err(MemoryError::dependency_failed)?;
    Ok(())
}
