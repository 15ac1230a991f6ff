//! Top-level embedding API: wires the provider degradation chain, the
//! two-tier cache, enrichment and matryoshka truncation together (spec
//! §4.D).

use std::path::Path;
use std::sync::Mutex;

use memory_core::config::EmbeddingConfig;
use memory_core::error::MemoryResult;
use memory_core::traits::EmbeddingProvider;
use memory_core::types::Memory;

use crate::cache::{CacheCoordinator, CacheHitTier, L2SqliteCache};
use crate::degradation::{DegradationChain, DegradationEvent};
use crate::enrichment::{enrich_for_embedding, enrich_query};
use crate::matryoshka;
use crate::providers::{create_provider, TfIdfFallback};

pub struct EmbeddingEngine {
    chain: Mutex<DegradationChain>,
    cache: CacheCoordinator,
    dims: usize,
    search_dims: usize,
}

impl EmbeddingEngine {
    fn build_chain(config: &EmbeddingConfig) -> DegradationChain {
        let mut chain = DegradationChain::new();
        let primary = create_provider(config);
        if primary.name() != "tfidf-fallback" {
            chain.push(primary);
        }
        chain.push_cache_fallback(Box::new(TfIdfFallback::new(config.dimensions)));
        chain
    }

    pub fn new(config: EmbeddingConfig) -> Self {
        let dims = config.dimensions;
        let search_dims = config.search_dimensions.min(dims);
        let l1_capacity = config.l1_cache_capacity;
        let chain = Self::build_chain(&config);
        let cache = CacheCoordinator::new(l1_capacity).expect("in-memory l2 cache never fails to open");
        Self { chain: Mutex::new(chain), cache, dims, search_dims }
    }

    pub fn new_with_db_path(config: EmbeddingConfig, db_path: &Path) -> Self {
        let dims = config.dimensions;
        let search_dims = config.search_dimensions.min(dims);
        let l1_capacity = config.l1_cache_capacity;
        let chain = Self::build_chain(&config);
        let l2 = L2SqliteCache::open(db_path).expect("open l2 embedding cache");
        let cache = CacheCoordinator::with_l2(l1_capacity, l2);
        Self { chain: Mutex::new(chain), cache, dims, search_dims }
    }

    fn embed_enriched(&self, enriched: &str) -> MemoryResult<Vec<f32>> {
        let hash = blake3::hash(enriched.as_bytes()).to_hex().to_string();
        let (cached, _tier) = self.cache.get(&hash);
        if let Some(vec) = cached {
            return Ok(vec);
        }
        let (vec, _provider) = self.chain.lock().unwrap().embed(enriched)?;
        self.cache.insert(hash, vec.clone());
        Ok(vec)
    }

    pub fn embed_memory(&self, memory: &Memory) -> MemoryResult<Vec<f32>> {
        self.embed_enriched(&enrich_for_embedding(memory))
    }

    pub fn embed_memory_for_search(&self, memory: &Memory) -> MemoryResult<Vec<f32>> {
        let full = self.embed_memory(memory)?;
        matryoshka::truncate(&full, self.search_dims)
    }

    pub fn embed_query(&self, query: &str) -> MemoryResult<Vec<f32>> {
        self.embed_enriched(&enrich_query(query))
    }

    pub fn embed_query_for_search(&self, query: &str) -> MemoryResult<Vec<f32>> {
        let full = self.embed_query(query)?;
        matryoshka::truncate(&full, self.search_dims)
    }

    pub fn active_provider(&self) -> String {
        self.chain.lock().unwrap().active_provider_name().to_string()
    }

    pub fn dimensions(&self) -> usize {
        self.dims
    }

    pub fn search_dimensions(&self) -> usize {
        self.search_dims
    }

    pub fn drain_degradation_events(&self) -> Vec<DegradationEvent> {
        self.chain.lock().unwrap().drain_events()
    }

    pub fn cache_hit_tier(&self, enriched_text: &str) -> CacheHitTier {
        let hash = blake3::hash(enriched_text.as_bytes()).to_hex().to_string();
        self.cache.get(&hash).1
    }
}

impl EmbeddingProvider for EmbeddingEngine {
    fn embed(&self, text: &str) -> MemoryResult<Vec<f32>> {
        self.embed_enriched(text)
    }

    fn embed_batch(&self, texts: &[String]) -> MemoryResult<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn name(&self) -> &str {
        // Callers wanting the live provider name use `active_provider()`;
        // the trait signature requires a `&str` we can't allocate here.
        "embedding-engine"
    }

    fn is_available(&self) -> bool {
        self.chain.lock().unwrap().active_provider_name() != "none"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tfidf_config() -> EmbeddingConfig {
        EmbeddingConfig {
            provider: "tfidf".to_string(),
            dimensions: 128,
            search_dimensions: 64,
            ..Default::default()
        }
    }

    #[test]
    fn embed_memory_roundtrips_dimensions() {
        let engine = EmbeddingEngine::new(tfidf_config());
        let memory = Memory::new(
            "test memory for embedding".to_string(),
            memory_core::types::Scope::Project,
            "proj-a".to_string(),
            vec![],
            0.5,
            None,
            chrono::Utc::now(),
        )
        .unwrap();
        let vec = engine.embed_memory(&memory).unwrap();
        assert_eq!(vec.len(), 128);
    }

    #[test]
    fn embed_memory_is_cached() {
        let engine = EmbeddingEngine::new(tfidf_config());
        let memory = Memory::new(
            "cached memory test".to_string(),
            memory_core::types::Scope::Project,
            "proj-a".to_string(),
            vec![],
            0.5,
            None,
            chrono::Utc::now(),
        )
        .unwrap();
        let a = engine.embed_memory(&memory).unwrap();
        let b = engine.embed_memory(&memory).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn embed_memory_for_search_truncates_to_search_dims() {
        let engine = EmbeddingEngine::new(tfidf_config());
        let memory = Memory::new(
            "search truncation test".to_string(),
            memory_core::types::Scope::Project,
            "proj-a".to_string(),
            vec![],
            0.5,
            None,
            chrono::Utc::now(),
        )
        .unwrap();
        let vec = engine.embed_memory_for_search(&memory).unwrap();
        assert_eq!(vec.len(), 64);
    }

    #[test]
    fn embed_query_for_search_truncates() {
        let engine = EmbeddingEngine::new(tfidf_config());
        let vec = engine.embed_query_for_search("test query").unwrap();
        assert_eq!(vec.len(), 64);
    }

    #[test]
    fn drain_degradation_events_empty_when_primary_always_succeeds() {
        let engine = EmbeddingEngine::new(tfidf_config());
        engine.embed_query("test").unwrap();
        assert!(engine.drain_degradation_events().is_empty());
    }

    #[test]
    fn active_provider_reports_tfidf() {
        let engine = EmbeddingEngine::new(tfidf_config());
        assert_eq!(engine.active_provider(), "tfidf-fallback");
    }

    #[test]
    fn dimensions_and_search_dimensions_match_config() {
        let engine = EmbeddingEngine::new(tfidf_config());
        assert_eq!(engine.dimensions(), 128);
        assert_eq!(engine.search_dimensions(), 64);
    }

    #[test]
    fn trait_impl_embed_and_batch() {
        let engine = EmbeddingEngine::new(tfidf_config());
        let provider: &dyn EmbeddingProvider = &engine;
        assert!(provider.is_available());
        let vec = provider.embed("hello world").unwrap();
        assert_eq!(vec.len(), 128);
        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let vecs = provider.embed_batch(&texts).unwrap();
        assert_eq!(vecs.len(), 3);
        assert!(vecs.iter().all(|v| v.len() == 128));
    }

    #[test]
    fn l2_cache_survives_restart_via_db_path() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("embed.db");
        {
            let engine = EmbeddingEngine::new_with_db_path(tfidf_config(), &db_path);
            let vec = engine.embed_query("persistent query").unwrap();
            assert_eq!(vec.len(), 128);
        }
        let cache = L2SqliteCache::open(&db_path).unwrap();
        assert!(!cache.is_empty());
    }
}
