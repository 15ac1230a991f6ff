use rusqlite::Connection;

use memory_core::error::{MemoryError, MemoryResult};

pub fn migrate(conn: &Connection) -> MemoryResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE fsrs_state (
            memory_id           TEXT NOT NULL PRIMARY KEY,
            difficulty          REAL NOT NULL,
            stability           REAL NOT NULL,
            last_review         TEXT NOT NULL,
            next_due            TEXT NOT NULL,
            review_count        INTEGER NOT NULL DEFAULT 0,
            validated_projects  TEXT NOT NULL DEFAULT ''
        );
        CREATE INDEX idx_fsrs_state_next_due ON fsrs_state(next_due);

        CREATE TABLE review_history (
            id                   INTEGER PRIMARY KEY AUTOINCREMENT,
            memory_id            TEXT NOT NULL,
            time                 TEXT NOT NULL,
            grade                TEXT NOT NULL,
            stability_before     REAL NOT NULL,
            stability_after      REAL NOT NULL,
            difficulty_before    REAL NOT NULL,
            difficulty_after     REAL NOT NULL,
            interval_before_days REAL NOT NULL,
            interval_after_days  REAL NOT NULL
        );
        CREATE INDEX idx_review_history_memory ON review_history(memory_id, time);
        ",
    )
    .map_err(MemoryError::dependency_failed)?;
    Ok(())
}
