use rusqlite::Connection;

use memory_core::error::{MemoryError, MemoryResult};

pub fn migrate(conn: &Connection) -> MemoryResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE relationship_edges (
            from_id    TEXT NOT NULL,
            to_id      TEXT NOT NULL,
            edge_type  TEXT NOT NULL,
            strength   REAL NOT NULL,
            evidence   TEXT NOT NULL,
            created_at TEXT NOT NULL,
            created_by TEXT NOT NULL,
            PRIMARY KEY (from_id, to_id, edge_type)
        );
        CREATE INDEX idx_relationship_edges_to ON relationship_edges(to_id);
        CREATE INDEX idx_relationship_edges_type ON relationship_edges(edge_type);
        ",
    )
    .map_err(MemoryError::dependency_failed)?;
    Ok(())
}
