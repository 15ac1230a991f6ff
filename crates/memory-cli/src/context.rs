//! Wires together the per-crate stores and sidecar connections from one
//! loaded `MemoryConfig` (spec §6). The three sidecar SQLite files map to
//! concerns as follows: `intelligence_db` holds the storage index,
//! vector/search cache, and relationship graph; `fsrs_db` holds spaced
//! repetition state; `session_db` holds the ingestion queue, breaker
//! state, and maintenance run markers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::Connection;

use memory_core::config::MemoryConfig;
use memory_core::error::{MemoryError, MemoryResult};
use memory_embeddings::engine::EmbeddingEngine;
use memory_storage::MarkdownStore;

pub struct AppContext {
    pub config: MemoryConfig,
    pub store: Arc<MarkdownStore>,
    pub embeddings: Arc<EmbeddingEngine>,
}

fn open_at(path: &str) -> MemoryResult<Connection> {
    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Connection::open(path).map_err(MemoryError::dependency_failed)
}

impl AppContext {
    /// Loads config from `MEMORY_SYSTEM_CONFIG` (defaulting to
    /// `./memory-system.toml` if present) then overlays `MEMORY_SYSTEM_*`
    /// env vars, per spec §6.
    pub fn load() -> MemoryResult<Self> {
        let config_path = std::env::var("MEMORY_SYSTEM_CONFIG").unwrap_or_else(|_| "./memory-system.toml".to_string());
        let mut config = match std::fs::read_to_string(&config_path) {
            Ok(contents) => MemoryConfig::from_toml(&contents)?,
            Err(_) => MemoryConfig::default(),
        };
        config.apply_env_overrides();

        let store = Arc::new(MarkdownStore::open(&config.storage.memory_dir)?);
        let embeddings = Arc::new(EmbeddingEngine::new_with_db_path(
            config.embedding.clone(),
            Path::new(&config.storage.intelligence_db),
        ));

        {
            let conn = open_at(&config.storage.intelligence_db)?;
            memory_storage::migrations::run_migrations(&conn)?;
            memory_retrieval::migrations::run_migrations(&conn)?;
            memory_graph::migrations::run_migrations(&conn)?;
        }
        {
            let conn = open_at(&config.storage.fsrs_db)?;
            memory_fsrs::migrations::run_migrations(&conn)?;
        }
        {
            let conn = open_at(&config.storage.session_db)?;
            memory_queue::migrations::run_migrations(&conn)?;
        }

        // spec §4.A's "observable side effect": a content edit invalidates
        // cached embeddings and cached searches touching that id. Both live
        // in the intelligence sidecar, so the callback opens its own short
        // lived connection per mutation rather than holding one open.
        let intelligence_db = config.storage.intelligence_db.clone();
        store.on_mutate(move |id| {
            let Ok(conn) = open_at(&intelligence_db) else { return };
            let _ = memory_retrieval::VectorIndex::new(&conn).delete(id);
            let _ = memory_retrieval::search::invalidate_on_write(&conn, id);
        });

        Ok(Self { config, store, embeddings })
    }

    pub fn intelligence_conn(&self) -> MemoryResult<Connection> {
        open_at(&self.config.storage.intelligence_db)
    }

    pub fn fsrs_conn(&self) -> MemoryResult<Connection> {
        open_at(&self.config.storage.fsrs_db)
    }

    pub fn session_conn(&self) -> MemoryResult<Connection> {
        open_at(&self.config.storage.session_db)
    }

    pub fn session_db_path(&self) -> PathBuf {
        PathBuf::from(&self.config.storage.session_db)
    }
}
