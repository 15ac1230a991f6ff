//! Embedding generation and caching (spec §4.D).
//!
//! A degradation chain tries the configured provider first and always
//! falls back to a deterministic hashing scheme so a memory is never left
//! unembedded. A two-tier cache (in-process `moka` + `rusqlite` sidecar)
//! avoids re-embedding unchanged content across restarts.

pub mod cache;
pub mod degradation;
pub mod engine;
pub mod enrichment;
pub mod matryoshka;
pub mod providers;

pub use cache::{CacheCoordinator, CacheHitTier};
pub use degradation::{DegradationChain, DegradationEvent};
pub use engine::EmbeddingEngine;
