//! Denormalized `memories` index, derived from the markdown tree
//! (spec §4.A: "SQL indices derive from it and may be rebuilt").

use rusqlite::Connection;

use memory_core::error::{MemoryError, MemoryResult};

pub fn migrate(conn: &Connection) -> MemoryResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS memories (
            id TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            scope TEXT NOT NULL,
            project_id TEXT NOT NULL,
            tags TEXT NOT NULL,
            importance REAL NOT NULL,
            created TEXT NOT NULL,
            last_reinforced TEXT NOT NULL,
            reinforcement_count INTEGER NOT NULL,
            source_session TEXT,
            archived INTEGER NOT NULL DEFAULT 0,
            archive_reason TEXT,
            superseded_by TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_memories_project ON memories(project_id);
        CREATE INDEX IF NOT EXISTS idx_memories_scope ON memories(scope);
        CREATE INDEX IF NOT EXISTS idx_memories_archived ON memories(archived);",
    )
    .map_err(MemoryError::dependency_failed)?;
    Ok(())
}
