//! Aggregate configuration (spec §6, §9's "frozen record" note).
//!
//! Each subsystem gets its own `#[serde(default)]` section so a partial
//! TOML file only needs to mention what it overrides; a manual `Default`
//! impl documents the spec's literal default constants next to the field
//! they belong to.

use serde::{Deserialize, Serialize};

use crate::error::MemoryResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub memory_dir: String,
    pub session_db: String,
    pub fsrs_db: String,
    pub intelligence_db: String,
    pub connection_pool_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            memory_dir: "./memory".to_string(),
            session_db: "./memory/session.sqlite3".to_string(),
            fsrs_db: "./memory/fsrs.sqlite3".to_string(),
            intelligence_db: "./memory/intelligence.sqlite3".to_string(),
            // spec §5: bounded connection pool, default 5.
            connection_pool_size: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayConfig {
    // spec §4.B: new = old * 0.99^days_since_last_reinforcement.
    pub daily_decay_base: f64,
    // spec §4.B: new = min(0.95, old * 1.15).
    pub reinforcement_multiplier: f64,
    pub importance_cap: f64,
    // spec §4.B: archive below 0.2 importance.
    pub archive_importance_floor: f64,
    // spec §4.B / §4.J: default stale threshold, 180 days.
    pub stale_threshold_days: i64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            daily_decay_base: 0.99,
            reinforcement_multiplier: 1.15,
            importance_cap: 0.95,
            archive_importance_floor: 0.2,
            stale_threshold_days: 180,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    // spec §4.C: default 3.
    pub failure_threshold: u32,
    // spec §4.C: default 60s.
    pub recovery_timeout_s: u64,
    // spec §5: default 30s hard timeout on outbound LLM calls.
    pub call_timeout_s: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout_s: 60,
            call_timeout_s: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub dimensions: usize,
    pub model_path: Option<String>,
    // spec §4.D: threshold filter defaults to 0.65, top-k default 50.
    pub similarity_threshold: f64,
    pub top_k: usize,
    pub l1_cache_capacity: u64,
    // matryoshka-truncated dimensionality used for search-time vectors;
    // full-width embeddings are still what gets stored and re-ranked with.
    pub search_dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "tfidf".to_string(),
            dimensions: crate::types::EMBEDDING_DIMENSIONS,
            model_path: None,
            similarity_threshold: 0.65,
            top_k: 50,
            l1_cache_capacity: 10_000,
            search_dimensions: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    // spec §4.E hybrid score weights.
    pub hybrid_semantic_weight: f64,
    pub hybrid_bm25_weight: f64,
    // spec §4.E final ranking weights.
    pub rank_semantic_weight: f64,
    pub rank_keyword_weight: f64,
    pub rank_recency_weight: f64,
    pub rank_importance_weight: f64,
    pub rank_ctr_weight: f64,
    pub recency_half_life_days: f64,
    // spec §4.E: TTL = 24h.
    pub cache_ttl_s: u64,
    pub cache_min_results: usize,
    pub cache_max_results: usize,
    pub snippet_max_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            hybrid_semantic_weight: 0.7,
            hybrid_bm25_weight: 0.3,
            rank_semantic_weight: 0.5,
            rank_keyword_weight: 0.2,
            rank_recency_weight: 0.2,
            rank_importance_weight: 0.1,
            rank_ctr_weight: 0.0,
            recency_half_life_days: 365.0,
            cache_ttl_s: 24 * 60 * 60,
            cache_min_results: 3,
            cache_max_results: 100,
            snippet_max_chars: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    // spec §4.F step 4: dedup threshold 0.70.
    pub dedup_ratio: f64,
    pub llm_enabled: bool,
    pub llm_timeout_ms: u64,
    // local-first default: a same-host Ollama-style completion endpoint.
    pub llm_endpoint: String,
    pub llm_model: String,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            dedup_ratio: 0.70,
            llm_enabled: false,
            llm_timeout_ms: 5_000,
            llm_endpoint: "http://localhost:11434/api/generate".to_string(),
            llm_model: "llama3.1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FsrsConfig {
    // spec §4.G: due_reviews default limit 10.
    pub due_queue_default_limit: usize,
    // spec §4.H promotion thresholds.
    pub promotion_min_stability: f64,
    pub promotion_min_review_count: u32,
    pub promotion_min_validated_projects: usize,
}

impl Default for FsrsConfig {
    fn default() -> Self {
        Self {
            due_queue_default_limit: 10,
            promotion_min_stability: 3.0,
            promotion_min_review_count: 3,
            promotion_min_validated_projects: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    // resolves spec §9 open question: single configurable value.
    pub contradiction_min_confidence: f64,
    pub max_causal_chain_depth: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            contradiction_min_confidence: 0.75,
            max_causal_chain_depth: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub soft_cap: usize,
    pub poll_interval_ms: u64,
    pub max_retries: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            soft_cap: 10_000,
            poll_interval_ms: 500,
            max_retries: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub json_logs: bool,
    pub env_filter: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            json_logs: false,
            env_filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub project_id: String,
    pub storage: StorageConfig,
    pub decay: DecayConfig,
    pub breaker: BreakerConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub consolidation: ConsolidationConfig,
    pub fsrs: FsrsConfig,
    pub graph: GraphConfig,
    pub queue: QueueConfig,
    pub observability: ObservabilityConfig,
}

impl MemoryConfig {
    pub fn from_toml(toml_str: &str) -> MemoryResult<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Overlay the environment variables documented in spec §6. Absent
    /// variables leave the existing value untouched.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("MEMORY_SYSTEM_PROJECT_ID") {
            self.project_id = v;
        }
        if let Ok(v) = std::env::var("MEMORY_SYSTEM_MEMORY_DIR") {
            self.storage.memory_dir = v;
        }
        if let Ok(v) = std::env::var("MEMORY_SYSTEM_SESSION_DB") {
            self.storage.session_db = v;
        }
        if let Ok(v) = std::env::var("MEMORY_SYSTEM_FSRS_DB") {
            self.storage.fsrs_db = v;
        }
        if let Ok(v) = std::env::var("MEMORY_SYSTEM_INTELLIGENCE_DB") {
            self.storage.intelligence_db = v;
        }
        if let Ok(v) = std::env::var("MEMORY_SYSTEM_LLM_ENABLED") {
            self.consolidation.llm_enabled = matches!(v.as_str(), "1" | "true" | "yes");
        }
        if let Ok(v) = std::env::var("MEMORY_SYSTEM_LLM_TIMEOUT_MS") {
            if let Ok(ms) = v.parse() {
                self.consolidation.llm_timeout_ms = ms;
            }
        }
    }
}
