//! Cross-crate seams. Downstream crates depend on these traits rather
//! than on each other's concrete types, so e.g. `memory-retrieval` can be
//! tested against an in-memory `MemoryStore` without pulling in
//! `memory-storage`'s SQL sidecar.

use crate::error::MemoryResult;
use crate::types::Memory;

/// Implemented by `memory-storage::MarkdownStore`.
pub trait MemoryStore: Send + Sync {
    fn create(&self, memory: &Memory) -> MemoryResult<()>;
    fn get(&self, id: &str) -> MemoryResult<Option<Memory>>;
    fn update(&self, memory: &Memory) -> MemoryResult<()>;
    fn list(&self, include_archived: bool) -> MemoryResult<Vec<Memory>>;
}

/// Implemented by `memory-embeddings::EmbeddingEngine`.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> MemoryResult<Vec<f32>>;
    fn embed_batch(&self, texts: &[String]) -> MemoryResult<Vec<Vec<f32>>>;
    fn dimensions(&self) -> usize;
    fn name(&self) -> &str;
    fn is_available(&self) -> bool;
}
