//! Orchestrates the full search pipeline (spec §4.D, §4.E): vector
//! candidate generation, BM25 scoring, hybrid + final ranking, caching,
//! and explainability.

use std::sync::Arc;

use chrono::Utc;
use rusqlite::Connection;

use memory_core::config::{EmbeddingConfig, RetrievalConfig};
use memory_core::error::MemoryResult;
use memory_core::traits::MemoryStore;
use memory_core::types::{Memory, Scope, SearchResult};
use memory_embeddings::engine::EmbeddingEngine;

use crate::bm25::{min_max_normalize, Bm25Index};
use crate::cache::{fingerprint, SearchCache, SearchFilters};
use crate::ranking::{final_score, hybrid_score, recency};
use crate::snippet::{build_snippet, match_reasons};
use crate::vector_index::VectorIndex;

pub struct SearchEngine {
    store: Arc<dyn MemoryStore>,
    embeddings: Arc<EmbeddingEngine>,
    retrieval: RetrievalConfig,
    embedding: EmbeddingConfig,
}

impl SearchEngine {
    pub fn new(
        store: Arc<dyn MemoryStore>,
        embeddings: Arc<EmbeddingEngine>,
        retrieval: RetrievalConfig,
        embedding: EmbeddingConfig,
    ) -> Self {
        Self { store, embeddings, retrieval, embedding }
    }

    fn candidates(&self, filters: &SearchFilters) -> MemoryResult<Vec<Memory>> {
        let all = self.store.list(false)?;
        Ok(all
            .into_iter()
            .filter(|m| match &filters.project_id {
                Some(p) => &m.project_id == p,
                None => true,
            })
            .filter(|m| match filters.scope {
                Some(s) => m.scope == s,
                None => true,
            })
            .filter(|m| filters.tags.is_empty() || filters.tags.iter().any(|t| m.tags.contains(t)))
            .filter(|m| match filters.min_importance {
                Some(min) => m.importance >= min,
                None => true,
            })
            .collect())
    }

    /// Ensures every candidate has a search-dimension vector in the
    /// sidecar index, then delegates scoring to `VectorIndex::brute_force_top_k`
    /// (spec §4.D's "brute-force cosine over the sidecar" fallback path --
    /// at this system's scale it doubles as the only path) and narrows the
    /// result to just this query's candidate set.
    fn semantic_scores(
        &self,
        sidecar: &Connection,
        query_vec: &[f32],
        candidates: &[Memory],
    ) -> MemoryResult<Vec<(String, f32)>> {
        let index = VectorIndex::new(sidecar);
        for memory in candidates {
            if index.get(&memory.id)?.is_none() {
                let v = self.embeddings.embed_memory_for_search(memory)?;
                let hash = blake3::hash(memory.content.as_bytes()).to_hex().to_string();
                index.upsert(&memory.id, &v, &hash)?;
            }
        }

        let candidate_ids: std::collections::HashSet<&str> = candidates.iter().map(|m| m.id.as_str()).collect();
        let ranked = index.brute_force_top_k(query_vec, usize::MAX)?;
        Ok(ranked.into_iter().filter(|(id, _)| candidate_ids.contains(id.as_str())).collect())
    }

    /// Runs the full pipeline against `sidecar` (the retrieval/intelligence
    /// connection holding `memory_vectors` and `search_cache`).
    pub fn search(&self, sidecar: &Connection, query: &str, filters: SearchFilters) -> MemoryResult<Vec<SearchResult>> {
        let now = Utc::now();
        let fp = fingerprint(query, &filters);
        let cache = SearchCache::new(
            sidecar,
            self.retrieval.cache_ttl_s,
            self.retrieval.cache_min_results,
            self.retrieval.cache_max_results,
        );

        if let Some(ids) = cache.get(&fp, now)? {
            return self.materialize(&ids, query, now);
        }

        let candidates = self.candidates(&filters)?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = self.embeddings.embed_query_for_search(query)?;
        let raw_semantic = self.semantic_scores(sidecar, &query_vec, &candidates)?;

        let by_id: std::collections::HashMap<&str, &Memory> =
            candidates.iter().map(|m| (m.id.as_str(), m)).collect();

        // BM25 IDF is corpus-wide over every non-archived candidate (spec
        // §4.E); only the later min-max normalization is scoped to the
        // narrowed top-k set.
        let bm25 = Bm25Index::build(candidates.iter().map(|m| (m.id.as_str(), m.content.as_str())));
        let bm25_raw_all = bm25.score(query);

        let above_threshold: Vec<&(String, f32)> = raw_semantic
            .iter()
            .filter(|(_, s)| *s as f64 >= self.embedding.similarity_threshold)
            .collect();
        let selected: Vec<(String, f32)> = if above_threshold.is_empty() {
            raw_semantic.clone()
        } else {
            above_threshold.into_iter().cloned().collect()
        };

        let bm25_raw_selected: std::collections::HashMap<String, f64> = selected
            .iter()
            .filter_map(|(id, _)| bm25_raw_all.get(id.as_str()).map(|v| (id.clone(), *v)))
            .collect();
        let bm25_norm = min_max_normalize(&bm25_raw_selected);

        // Rank candidates for top-k selection by the §4.E hybrid fusion
        // score (semantic + bm25), not raw semantic alone.
        let mut selected: Vec<(String, f32, f64)> = selected
            .into_iter()
            .map(|(id, semantic_raw)| {
                let semantic = (semantic_raw as f64).clamp(0.0, 1.0);
                let keyword_norm = bm25_norm.get(&id).copied().unwrap_or(0.0);
                let hybrid = hybrid_score(semantic, keyword_norm, &self.retrieval);
                (id, semantic_raw, hybrid)
            })
            .collect();
        selected.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
        selected.truncate(self.embedding.top_k);

        let mut results = Vec::with_capacity(selected.len());
        for (id, semantic_raw, hybrid) in &selected {
            let Some(memory) = by_id.get(id.as_str()) else { continue };
            let semantic = (*semantic_raw as f64).clamp(0.0, 1.0);
            let keyword_norm = bm25_norm.get(id).copied().unwrap_or(0.0);
            let r = recency(memory.created, now, &self.retrieval);
            let score = final_score(*hybrid, keyword_norm, r, memory.importance, &self.retrieval);
            let reasons = match_reasons(
                &memory.content,
                query,
                &memory.tags,
                filters.project_id.as_deref() == Some(memory.project_id.as_str()),
                semantic,
            );
            results.push(SearchResult {
                memory: (*memory).clone(),
                score,
                snippet: build_snippet(&memory.content, query, self.retrieval.snippet_max_chars),
                match_reasons: reasons,
            });
        }

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.memory.importance.partial_cmp(&a.memory.importance).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| b.memory.created.cmp(&a.memory.created))
                .then_with(|| a.memory.id.cmp(&b.memory.id))
        });

        let ids: Vec<String> = results.iter().map(|r| r.memory.id.clone()).collect();
        cache.put(&fp, &ids, now)?;
        crate::analytics::record_query(sidecar, query, results.len())?;

        Ok(results)
    }

    fn materialize(
        &self,
        ids: &[String],
        query: &str,
        now: chrono::DateTime<Utc>,
    ) -> MemoryResult<Vec<SearchResult>> {
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(memory) = self.store.get(id)? else { continue };
            if memory.archived {
                continue;
            }
            let semantic = 0.0;
            let reasons = match_reasons(&memory.content, query, &memory.tags, false, semantic);
            results.push(SearchResult {
                score: final_score(0.0, 0.0, recency(memory.created, now, &self.retrieval), memory.importance, &self.retrieval),
                snippet: build_snippet(&memory.content, query, self.retrieval.snippet_max_chars),
                match_reasons: reasons,
                memory,
            });
        }
        Ok(results)
    }
}

pub fn invalidate_on_write(sidecar: &Connection, memory_id: &str) -> MemoryResult<()> {
    let cache = SearchCache::new(sidecar, 0, 0, usize::MAX);
    cache.invalidate_touching(memory_id)?;
    Ok(())
}

pub fn invalidate_on_create(sidecar: &Connection) -> MemoryResult<()> {
    let cache = SearchCache::new(sidecar, 0, 0, usize::MAX);
    cache.invalidate_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_core::config::EmbeddingConfig;
    use std::sync::Mutex;

    struct InMemoryStore {
        memories: Mutex<std::collections::HashMap<String, Memory>>,
    }

    impl InMemoryStore {
        fn new() -> Self {
            Self { memories: Mutex::new(std::collections::HashMap::new()) }
        }
    }

    impl MemoryStore for InMemoryStore {
        fn create(&self, memory: &Memory) -> MemoryResult<()> {
            self.memories.lock().unwrap().insert(memory.id.clone(), memory.clone());
            Ok(())
        }
        fn get(&self, id: &str) -> MemoryResult<Option<Memory>> {
            Ok(self.memories.lock().unwrap().get(id).cloned())
        }
        fn update(&self, memory: &Memory) -> MemoryResult<()> {
            self.memories.lock().unwrap().insert(memory.id.clone(), memory.clone());
            Ok(())
        }
        fn list(&self, include_archived: bool) -> MemoryResult<Vec<Memory>> {
            Ok(self
                .memories
                .lock()
                .unwrap()
                .values()
                .filter(|m| include_archived || !m.archived)
                .cloned()
                .collect())
        }
    }

    fn mk(content: &str, project: &str) -> Memory {
        Memory::new(
            content.to_string(),
            Scope::Project,
            project.to_string(),
            vec![],
            0.5,
            None,
            Utc::now(),
        )
        .unwrap()
    }

    fn test_engine(store: Arc<InMemoryStore>) -> SearchEngine {
        let embedding_config =
            EmbeddingConfig { provider: "tfidf".to_string(), dimensions: 64, ..Default::default() };
        let embeddings = Arc::new(EmbeddingEngine::new(embedding_config.clone()));
        SearchEngine::new(store, embeddings, RetrievalConfig::default(), embedding_config)
    }

    #[test]
    fn search_returns_matching_memory() {
        let store = Arc::new(InMemoryStore::new());
        let m = mk("rust ownership and borrowing rules", "proj-a");
        store.create(&m).unwrap();

        let engine = test_engine(store);
        let conn = Connection::open_in_memory().unwrap();
        crate::migrations::run_migrations(&conn).unwrap();

        let results = engine.search(&conn, "ownership borrowing", SearchFilters::default()).unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].memory.id, m.id);
    }

    #[test]
    fn search_respects_project_filter() {
        let store = Arc::new(InMemoryStore::new());
        store.create(&mk("shared topic alpha", "proj-a")).unwrap();
        store.create(&mk("shared topic beta", "proj-b")).unwrap();

        let engine = test_engine(store);
        let conn = Connection::open_in_memory().unwrap();
        crate::migrations::run_migrations(&conn).unwrap();

        let filters = SearchFilters { project_id: Some("proj-a".to_string()), ..Default::default() };
        let results = engine.search(&conn, "shared topic", filters).unwrap();
        assert!(results.iter().all(|r| r.memory.project_id == "proj-a"));
    }

    #[test]
    fn second_identical_search_hits_cache() {
        let store = Arc::new(InMemoryStore::new());
        store.create(&mk("caching behavior test content", "proj-a")).unwrap();

        let engine = test_engine(store);
        let conn = Connection::open_in_memory().unwrap();
        crate::migrations::run_migrations(&conn).unwrap();

        let first = engine.search(&conn, "caching behavior", SearchFilters::default()).unwrap();
        let second = engine.search(&conn, "caching behavior", SearchFilters::default()).unwrap();
        assert_eq!(first.len(), second.len());
    }

    #[test]
    fn empty_corpus_returns_no_results() {
        let store = Arc::new(InMemoryStore::new());
        let engine = test_engine(store);
        let conn = Connection::open_in_memory().unwrap();
        crate::migrations::run_migrations(&conn).unwrap();
        let results = engine.search(&conn, "anything", SearchFilters::default()).unwrap();
        assert!(results.is_empty());
    }
}
