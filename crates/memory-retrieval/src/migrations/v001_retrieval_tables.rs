//! Sidecar tables owned by retrieval: the vector index, the query cache,
//! and search analytics (spec §4.D, §4.E).

use rusqlite::Connection;

use memory_core::error::{MemoryError, MemoryResult};

pub fn migrate(conn: &Connection) -> MemoryResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS memory_vectors (
            memory_id TEXT PRIMARY KEY,
            vector BLOB NOT NULL,
            content_hash TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS search_cache (
            fingerprint TEXT PRIMARY KEY,
            memory_ids TEXT NOT NULL,
            hit_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS search_analytics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            query TEXT NOT NULL,
            result_count INTEGER NOT NULL,
            selected_memory_id TEXT,
            position INTEGER,
            time TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_search_cache_expires ON search_cache(expires_at);",
    )
    .map_err(MemoryError::dependency_failed)?;
    Ok(())
}
