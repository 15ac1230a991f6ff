//! Per-memory embedding store plus brute-force cosine search (spec §4.D:
//! "if the vector index is unavailable, the store falls back to
//! brute-force cosine over the sidecar"). No ANN library is in the
//! dependency stack, so the index and the fallback are the same scan —
//! fine at the scale this system runs at (one user's memories).

use chrono::Utc;
use rusqlite::{params, Connection};

use memory_core::error::{MemoryError, MemoryResult};
use memory_embeddings::matryoshka::cosine_similarity;

pub struct VectorIndex<'a> {
    conn: &'a Connection,
}

impl<'a> VectorIndex<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn encode(vector: &[f32]) -> Vec<u8> {
        vector.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn decode(bytes: &[u8]) -> Vec<f32> {
        bytes.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect()
    }

    pub fn upsert(&self, memory_id: &str, vector: &[f32], content_hash: &str) -> MemoryResult<()> {
        self.conn
            .execute(
                "INSERT INTO memory_vectors (memory_id, vector, content_hash, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(memory_id) DO UPDATE SET
                    vector = excluded.vector,
                    content_hash = excluded.content_hash,
                    updated_at = excluded.updated_at",
                params![memory_id, Self::encode(vector), content_hash, Utc::now().to_rfc3339()],
            )
            .map_err(MemoryError::dependency_failed)?;
        Ok(())
    }

    pub fn get(&self, memory_id: &str) -> MemoryResult<Option<Vec<f32>>> {
        self.conn
            .query_row("SELECT vector FROM memory_vectors WHERE memory_id = ?1", params![memory_id], |row| {
                let bytes: Vec<u8> = row.get(0)?;
                Ok(Self::decode(&bytes))
            })
            .map(Some)
            .or_else(|e| if e == rusqlite::Error::QueryReturnedNoRows { Ok(None) } else { Err(e) })
            .map_err(MemoryError::dependency_failed)
    }

    pub fn delete(&self, memory_id: &str) -> MemoryResult<()> {
        self.conn
            .execute("DELETE FROM memory_vectors WHERE memory_id = ?1", params![memory_id])
            .map_err(MemoryError::dependency_failed)?;
        Ok(())
    }

    /// Scans every stored vector and returns the top-k by cosine
    /// similarity to `query`, descending.
    pub fn brute_force_top_k(&self, query: &[f32], k: usize) -> MemoryResult<Vec<(String, f32)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT memory_id, vector FROM memory_vectors")
            .map_err(MemoryError::dependency_failed)?;
        let rows = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let bytes: Vec<u8> = row.get(1)?;
                Ok((id, Self::decode(&bytes)))
            })
            .map_err(MemoryError::dependency_failed)?;

        let mut scored: Vec<(String, f32)> = Vec::new();
        for row in rows {
            let (id, vector) = row.map_err(MemoryError::dependency_failed)?;
            scored.push((id, cosine_similarity(query, &vector)));
        }
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrations::run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn upsert_then_get_round_trips() {
        let conn = setup();
        let idx = VectorIndex::new(&conn);
        idx.upsert("m1", &[1.0, 0.0, 0.0], "hash1").unwrap();
        assert_eq!(idx.get("m1").unwrap(), Some(vec![1.0, 0.0, 0.0]));
    }

    #[test]
    fn upsert_overwrites_existing() {
        let conn = setup();
        let idx = VectorIndex::new(&conn);
        idx.upsert("m1", &[1.0, 0.0], "hash1").unwrap();
        idx.upsert("m1", &[0.0, 1.0], "hash2").unwrap();
        assert_eq!(idx.get("m1").unwrap(), Some(vec![0.0, 1.0]));
    }

    #[test]
    fn delete_removes_vector() {
        let conn = setup();
        let idx = VectorIndex::new(&conn);
        idx.upsert("m1", &[1.0], "hash1").unwrap();
        idx.delete("m1").unwrap();
        assert_eq!(idx.get("m1").unwrap(), None);
    }

    #[test]
    fn brute_force_top_k_ranks_by_cosine_similarity() {
        let conn = setup();
        let idx = VectorIndex::new(&conn);
        idx.upsert("close", &[1.0, 0.0], "h1").unwrap();
        idx.upsert("orthogonal", &[0.0, 1.0], "h2").unwrap();
        idx.upsert("opposite", &[-1.0, 0.0], "h3").unwrap();

        let ranked = idx.brute_force_top_k(&[1.0, 0.0], 2).unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].0, "close");
    }
}
