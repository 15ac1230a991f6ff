//! Rebuilds the `memories` SQL index from the markdown tree (spec §4.A:
//! "SQL indices derive from it and may be rebuilt"). An explicit, offline
//! operation — nothing here mutates markdown, only the sidecar.

use rusqlite::{params, Connection};

use memory_core::error::MemoryResult;
use memory_core::types::Memory;

use crate::markdown::{ListFilters, MarkdownStore};

/// Truncates and repopulates the `memories` table from every markdown file
/// under `store`, archived included. Returns the row count written.
pub fn rebuild(conn: &Connection, store: &MarkdownStore) -> MemoryResult<usize> {
    let filters = ListFilters { include_archived: true, ..Default::default() };
    let memories = store.list(&filters)?;

    conn.execute_batch("BEGIN IMMEDIATE")?;
    let result = (|| -> MemoryResult<usize> {
        conn.execute("DELETE FROM memories", [])?;
        for memory in &memories {
            upsert(conn, memory)?;
        }
        Ok(memories.len())
    })();
    match result {
        Ok(n) => {
            conn.execute_batch("COMMIT")?;
            Ok(n)
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

/// Inserts or replaces a single memory's index row, used by callers that
/// keep the index live (e.g. on create/update) rather than batch-rebuilding.
pub fn upsert(conn: &Connection, memory: &Memory) -> MemoryResult<()> {
    let tags = memory.tags.join(",");
    conn.execute(
        "INSERT INTO memories (
            id, content, scope, project_id, tags, importance, created,
            last_reinforced, reinforcement_count, source_session, archived,
            archive_reason, superseded_by
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        ON CONFLICT(id) DO UPDATE SET
            content = excluded.content,
            scope = excluded.scope,
            project_id = excluded.project_id,
            tags = excluded.tags,
            importance = excluded.importance,
            last_reinforced = excluded.last_reinforced,
            reinforcement_count = excluded.reinforcement_count,
            archived = excluded.archived,
            archive_reason = excluded.archive_reason,
            superseded_by = excluded.superseded_by",
        params![
            memory.id,
            memory.content,
            memory.scope.as_str(),
            memory.project_id,
            tags,
            memory.importance,
            memory.created.to_rfc3339(),
            memory.last_reinforced.to_rfc3339(),
            memory.reinforcement_count,
            memory.source_session,
            memory.archived,
            memory.archive_reason,
            memory.superseded_by,
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations;
    use chrono::Utc;
    use memory_core::types::Scope;

    #[test]
    fn rebuild_populates_index_from_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let store = MarkdownStore::open(dir.path()).unwrap();
        let memory = Memory::new(
            "reindex me".to_string(),
            Scope::Project,
            "proj-a".to_string(),
            vec![],
            0.5,
            None,
            Utc::now(),
        )
        .unwrap();
        store.create(&memory).unwrap();

        let conn = Connection::open_in_memory().unwrap();
        migrations::run_migrations(&conn).unwrap();
        let written = rebuild(&conn, &store).unwrap();
        assert_eq!(written, 1);

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM memories", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn rebuild_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = MarkdownStore::open(dir.path()).unwrap();
        let memory = Memory::new(
            "stable".to_string(),
            Scope::Project,
            "proj-a".to_string(),
            vec![],
            0.5,
            None,
            Utc::now(),
        )
        .unwrap();
        store.create(&memory).unwrap();

        let conn = Connection::open_in_memory().unwrap();
        migrations::run_migrations(&conn).unwrap();
        rebuild(&conn, &store).unwrap();
        let second = rebuild(&conn, &store).unwrap();
        assert_eq!(second, 1);
    }
}
