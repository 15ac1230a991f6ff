//! Idempotency gate for the daily/weekly maintenance jobs (spec §4.J).
//!
//! Each job records its last run in a tiny `maintenance_runs` sidecar
//! table keyed by job name. A job whose window (day or ISO week) matches
//! the last recorded run is skipped, so re-running the maintenance binary
//! twice in the same window is a no-op rather than double-decaying or
//! double-promoting.

use chrono::{DateTime, Datelike, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use memory_core::error::{MemoryError, MemoryResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Daily,
    Weekly,
}

impl Window {
    fn key(&self, now: DateTime<Utc>) -> String {
        match self {
            Window::Daily => now.format("%Y-%m-%d").to_string(),
            Window::Weekly => {
                let iso = now.iso_week();
                format!("{}-W{:02}", iso.year(), iso.week())
            }
        }
    }
}

pub fn ensure_table(conn: &Connection) -> MemoryResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS maintenance_runs (
            job_name TEXT PRIMARY KEY,
            window_key TEXT NOT NULL,
            ran_at TEXT NOT NULL
        );",
    )
    .map_err(MemoryError::dependency_failed)?;
    Ok(())
}

fn last_window_key(conn: &Connection, job_name: &str) -> MemoryResult<Option<String>> {
    conn.query_row("SELECT window_key FROM maintenance_runs WHERE job_name = ?1", params![job_name], |row| row.get(0))
        .optional()
        .map_err(MemoryError::dependency_failed)
}

fn record_run(conn: &Connection, job_name: &str, window_key: &str, now: DateTime<Utc>) -> MemoryResult<()> {
    conn.execute(
        "INSERT INTO maintenance_runs (job_name, window_key, ran_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(job_name) DO UPDATE SET window_key = excluded.window_key, ran_at = excluded.ran_at",
        params![job_name, window_key, now.to_rfc3339()],
    )
    .map_err(MemoryError::dependency_failed)?;
    Ok(())
}

/// `true` if `job_name` has not yet run in `now`'s window.
pub fn is_due(conn: &Connection, job_name: &str, window: Window, now: DateTime<Utc>) -> MemoryResult<bool> {
    ensure_table(conn)?;
    let current_key = window.key(now);
    Ok(last_window_key(conn, job_name)?.as_deref() != Some(current_key.as_str()))
}

/// Marks `job_name` as having run in `now`'s window. Call only after the
/// job's real work (not a `--dry-run` preview) has completed.
pub fn mark_ran(conn: &Connection, job_name: &str, window: Window, now: DateTime<Utc>) -> MemoryResult<()> {
    ensure_table(conn)?;
    record_run(conn, job_name, &window.key(now), now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn job_is_due_once_per_day() {
        let conn = Connection::open_in_memory().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 9, 0, 0).unwrap();
        assert!(is_due(&conn, "decay", Window::Daily, now).unwrap());
        mark_ran(&conn, "decay", Window::Daily, now).unwrap();
        assert!(!is_due(&conn, "decay", Window::Daily, now + chrono::Duration::hours(3)).unwrap());
        assert!(is_due(&conn, "decay", Window::Daily, now + chrono::Duration::days(1)).unwrap());
    }

    #[test]
    fn job_is_due_once_per_week() {
        let conn = Connection::open_in_memory().unwrap();
        let monday = Utc.with_ymd_and_hms(2026, 7, 27, 9, 0, 0).unwrap();
        assert!(is_due(&conn, "promotion", Window::Weekly, monday).unwrap());
        mark_ran(&conn, "promotion", Window::Weekly, monday).unwrap();
        assert!(!is_due(&conn, "promotion", Window::Weekly, monday + chrono::Duration::days(3)).unwrap());
        assert!(is_due(&conn, "promotion", Window::Weekly, monday + chrono::Duration::weeks(1)).unwrap());
    }
}
