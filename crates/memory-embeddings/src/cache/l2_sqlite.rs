//! L2 cache: a `rusqlite` table keyed by content hash, surviving process
//! restarts (spec §4.D "sidecar cache ... for warm restarts").

use std::sync::Mutex;

use rusqlite::{params, Connection};

use memory_core::error::{MemoryError, MemoryResult};

pub struct L2SqliteCache {
    conn: Mutex<Connection>,
}

impl L2SqliteCache {
    fn with_conn(conn: Connection) -> MemoryResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS embedding_cache (
                hash TEXT PRIMARY KEY,
                vector BLOB NOT NULL
            );",
        )
        .map_err(MemoryError::dependency_failed)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open(path: &std::path::Path) -> MemoryResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(MemoryError::dependency_failed)?;
        Self::with_conn(conn)
    }

    pub fn in_memory() -> MemoryResult<Self> {
        let conn = Connection::open_in_memory().map_err(MemoryError::dependency_failed)?;
        Self::with_conn(conn)
    }

    fn encode(vector: &[f32]) -> Vec<u8> {
        vector.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn decode(bytes: &[u8]) -> Vec<f32> {
        bytes.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect()
    }

    pub fn insert(&self, hash: String, vector: &[f32]) {
        let conn = self.conn.lock().unwrap();
        let _ = conn.execute(
            "INSERT OR REPLACE INTO embedding_cache (hash, vector) VALUES (?1, ?2)",
            params![hash, Self::encode(vector)],
        );
    }

    pub fn get(&self, hash: &str) -> Option<Vec<f32>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT vector FROM embedding_cache WHERE hash = ?1", params![hash], |row| {
            let bytes: Vec<u8> = row.get(0)?;
            Ok(Self::decode(&bytes))
        })
        .ok()
    }

    pub fn is_empty(&self) -> bool {
        let conn = self.conn.lock().unwrap();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM embedding_cache", [], |row| row.get(0)).unwrap_or(0);
        count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_get_round_trips() {
        let cache = L2SqliteCache::in_memory().unwrap();
        cache.insert("h1".to_string(), &[1.0, 2.0, 3.0]);
        assert_eq!(cache.get("h1"), Some(vec![1.0, 2.0, 3.0]));
    }

    #[test]
    fn missing_hash_returns_none() {
        let cache = L2SqliteCache::in_memory().unwrap();
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn survives_across_handles_to_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embed.db");
        {
            let cache = L2SqliteCache::open(&path).unwrap();
            cache.insert("persist".to_string(), &[9.0]);
        }
        let cache = L2SqliteCache::open(&path).unwrap();
        assert!(!cache.is_empty());
        assert_eq!(cache.get("persist"), Some(vec![9.0]));
    }
}
