//! Captures (query, position, selected_id) tuples for later ranking
//! improvements (spec §4.E). The ranker doesn't consume click-through yet,
//! but every observation is recorded so a future CTR term has data.

use chrono::Utc;
use rusqlite::{params, Connection};

use memory_core::error::{MemoryError, MemoryResult};
use memory_core::types::SearchAnalyticsRow;

pub fn record(conn: &Connection, row: &SearchAnalyticsRow) -> MemoryResult<()> {
    conn.execute(
        "INSERT INTO search_analytics (query, result_count, selected_memory_id, position, time)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            row.query,
            row.result_count as i64,
            row.selected_memory_id,
            row.position,
            row.time.to_rfc3339(),
        ],
    )
    .map_err(MemoryError::dependency_failed)?;
    Ok(())
}

pub fn record_query(conn: &Connection, query: &str, result_count: usize) -> MemoryResult<()> {
    record(
        conn,
        &SearchAnalyticsRow {
            query: query.to_string(),
            result_count,
            selected_memory_id: None,
            position: None,
            time: Utc::now(),
        },
    )
}

pub fn record_selection(conn: &Connection, query: &str, memory_id: &str, position: u32) -> MemoryResult<()> {
    record(
        conn,
        &SearchAnalyticsRow {
            query: query.to_string(),
            result_count: 0,
            selected_memory_id: Some(memory_id.to_string()),
            position: Some(position),
            time: Utc::now(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations;

    #[test]
    fn records_are_appended_not_overwritten() {
        let conn = Connection::open_in_memory().unwrap();
        migrations::run_migrations(&conn).unwrap();
        record_query(&conn, "rust memory", 5).unwrap();
        record_selection(&conn, "rust memory", "m1", 0).unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM search_analytics", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 2);
    }
}
