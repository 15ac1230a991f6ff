//! TTL query cache, keyed by a fingerprint of the normalized query plus
//! filters (spec §4.E). Cached entries store memory ids only; results are
//! re-materialized from the store on hit so mutated non-filter fields
//! (content, importance, tags) are always fresh.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};

use memory_core::error::{MemoryError, MemoryResult};
use memory_core::types::Scope;

#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub project_id: Option<String>,
    pub scope: Option<Scope>,
    pub tags: Vec<String>,
    pub min_importance: Option<f64>,
}

/// Fingerprint per spec §4.E: hash of (normalized query, project filter,
/// tag set, min-importance, scope filter).
pub fn fingerprint(query: &str, filters: &SearchFilters) -> String {
    let normalized_query = query.trim().to_lowercase();
    let mut tags = filters.tags.clone();
    tags.sort();
    let key = format!(
        "{normalized_query}|{:?}|{:?}|{:?}|{:?}",
        filters.project_id, tags, filters.min_importance, filters.scope.map(|s| s.as_str())
    );
    blake3::hash(key.as_bytes()).to_hex().to_string()
}

pub struct SearchCache<'a> {
    conn: &'a Connection,
    ttl: Duration,
    min_results: usize,
    max_results: usize,
}

impl<'a> SearchCache<'a> {
    pub fn new(conn: &'a Connection, ttl_s: u64, min_results: usize, max_results: usize) -> Self {
        Self { conn, ttl: Duration::seconds(ttl_s as i64), min_results, max_results }
    }

    /// Returns cached memory ids if present and unexpired.
    pub fn get(&self, fingerprint: &str, now: DateTime<Utc>) -> MemoryResult<Option<Vec<String>>> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT memory_ids, expires_at FROM search_cache WHERE fingerprint = ?1",
                params![fingerprint],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map(Some)
            .or_else(|e| if e == rusqlite::Error::QueryReturnedNoRows { Ok(None) } else { Err(e) })
            .map_err(MemoryError::dependency_failed)?;

        let Some((ids_csv, expires_at)) = row else { return Ok(None) };
        let expires_at: DateTime<Utc> =
            DateTime::parse_from_rfc3339(&expires_at).map_err(MemoryError::dependency_failed)?.into();
        if expires_at <= now {
            return Ok(None);
        }
        self.conn
            .execute("UPDATE search_cache SET hit_count = hit_count + 1 WHERE fingerprint = ?1", params![fingerprint])
            .map_err(MemoryError::dependency_failed)?;
        let ids: Vec<String> = if ids_csv.is_empty() {
            Vec::new()
        } else {
            ids_csv.split(',').map(String::from).collect()
        };
        Ok(Some(ids))
    }

    /// Stores `ids` for `fingerprint`, unless the result count falls
    /// outside [min_results, max_results] (spec §4.E "else bypassed").
    pub fn put(&self, fingerprint: &str, ids: &[String], now: DateTime<Utc>) -> MemoryResult<()> {
        if ids.len() < self.min_results || ids.len() > self.max_results {
            return Ok(());
        }
        let expires_at = now + self.ttl;
        self.conn
            .execute(
                "INSERT INTO search_cache (fingerprint, memory_ids, hit_count, created_at, expires_at)
                 VALUES (?1, ?2, 0, ?3, ?4)
                 ON CONFLICT(fingerprint) DO UPDATE SET
                    memory_ids = excluded.memory_ids,
                    created_at = excluded.created_at,
                    expires_at = excluded.expires_at,
                    hit_count = 0",
                params![fingerprint, ids.join(","), now.to_rfc3339(), expires_at.to_rfc3339()],
            )
            .map_err(MemoryError::dependency_failed)?;
        Ok(())
    }

    /// Invalidates every cache entry whose stored ids intersect
    /// `mutated_id` (spec §4.E "writes to the store emit invalidation
    /// events").
    pub fn invalidate_touching(&self, mutated_id: &str) -> MemoryResult<usize> {
        let mut stmt = self
            .conn
            .prepare("SELECT fingerprint, memory_ids FROM search_cache")
            .map_err(MemoryError::dependency_failed)?;
        let rows: Vec<(String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(MemoryError::dependency_failed)?
            .collect::<Result<_, _>>()
            .map_err(MemoryError::dependency_failed)?;
        drop(stmt);

        let mut removed = 0;
        for (fp, ids_csv) in rows {
            if ids_csv.split(',').any(|id| id == mutated_id) {
                self.conn
                    .execute("DELETE FROM search_cache WHERE fingerprint = ?1", params![fp])
                    .map_err(MemoryError::dependency_failed)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Conservatively invalidates every entry (spec §4.E: "for create
    /// events any entry may be conservatively invalidated by textual
    /// overlap" — in the absence of a cheap overlap test we invalidate
    /// the whole cache, which is always a safe over-approximation).
    pub fn invalidate_all(&self) -> MemoryResult<usize> {
        let removed = self.conn.execute("DELETE FROM search_cache", []).map_err(MemoryError::dependency_failed)?;
        Ok(removed)
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
    fn put_then_get_round_trips_within_ttl() {
        let conn = setup();
        let cache = SearchCache::new(&conn, 3600, 1, 100);
        let now = Utc::now();
        let fp = fingerprint("hello", &SearchFilters::default());
        cache.put(&fp, &["a".to_string(), "b".to_string()], now).unwrap();
        let got = cache.get(&fp, now).unwrap();
        assert_eq!(got, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn expired_entry_is_not_returned() {
        let conn = setup();
        let cache = SearchCache::new(&conn, 1, 1, 100);
        let now = Utc::now();
        let fp = fingerprint("hello", &SearchFilters::default());
        cache.put(&fp, &["a".to_string()], now).unwrap();
        let later = now + Duration::seconds(10);
        assert_eq!(cache.get(&fp, later).unwrap(), None);
    }

    #[test]
    fn below_min_results_bypasses_cache() {
        let conn = setup();
        let cache = SearchCache::new(&conn, 3600, 3, 100);
        let now = Utc::now();
        let fp = fingerprint("hello", &SearchFilters::default());
        cache.put(&fp, &["a".to_string()], now).unwrap();
        assert_eq!(cache.get(&fp, now).unwrap(), None);
    }

    #[test]
    fn above_max_results_bypasses_cache() {
        let conn = setup();
        let cache = SearchCache::new(&conn, 3600, 1, 2);
        let now = Utc::now();
        let fp = fingerprint("hello", &SearchFilters::default());
        cache.put(&fp, &["a".to_string(), "b".to_string(), "c".to_string()], now).unwrap();
        assert_eq!(cache.get(&fp, now).unwrap(), None);
    }

    #[test]
    fn invalidate_touching_removes_matching_entries_only() {
        let conn = setup();
        let cache = SearchCache::new(&conn, 3600, 1, 100);
        let now = Utc::now();
        let fp_a = fingerprint("alpha", &SearchFilters::default());
        let fp_b = fingerprint("beta", &SearchFilters::default());
        cache.put(&fp_a, &["m1".to_string()], now).unwrap();
        cache.put(&fp_b, &["m2".to_string()], now).unwrap();

        let removed = cache.invalidate_touching("m1").unwrap();
        assert_eq!(removed, 1);
        assert_eq!(cache.get(&fp_a, now).unwrap(), None);
        assert!(cache.get(&fp_b, now).unwrap().is_some());
    }

    #[test]
    fn fingerprint_differs_by_filters() {
        let a = fingerprint("q", &SearchFilters::default());
        let b = fingerprint(
            "q",
            &SearchFilters { project_id: Some("p1".to_string()), ..Default::default() },
        );
        assert_ne!(a, b);
    }
}
