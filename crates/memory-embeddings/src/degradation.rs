//! Ordered fallback chain: try each provider in turn, record a
//! degradation event when a non-final provider had to be skipped (spec
//! §4.D "local text embedder" should never leave a memory unembedded).

use memory_core::error::{MemoryError, MemoryResult};
use memory_core::traits::EmbeddingProvider;

#[derive(Debug, Clone, PartialEq)]
pub struct DegradationEvent {
    pub skipped_provider: String,
    pub reason: String,
}

#[derive(Default)]
pub struct DegradationChain {
    providers: Vec<Box<dyn EmbeddingProvider>>,
    events: Vec<DegradationEvent>,
}

impl DegradationChain {
    pub fn new() -> Self {
        Self { providers: Vec::new(), events: Vec::new() }
    }

    pub fn push(&mut self, provider: Box<dyn EmbeddingProvider>) {
        self.providers.push(provider);
    }

    /// Alias kept for callers that want to express "this is the guaranteed
    /// last resort" at the call site; behavior is identical to `push`.
    pub fn push_cache_fallback(&mut self, provider: Box<dyn EmbeddingProvider>) {
        self.push(provider);
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn active_provider_name(&self) -> &str {
        self.providers
            .iter()
            .find(|p| p.is_available())
            .map(|p| p.name())
            .unwrap_or("none")
    }

    /// Tries providers in order, recording a degradation event per skip.
    /// Returns the embedding and the name of the provider that produced it.
    pub fn embed(&mut self, text: &str) -> MemoryResult<(Vec<f32>, String)> {
        for provider in &self.providers {
            if !provider.is_available() {
                self.events.push(DegradationEvent {
                    skipped_provider: provider.name().to_string(),
                    reason: "provider reports unavailable".to_string(),
                });
                continue;
            }
            match provider.embed(text) {
                Ok(vec) => return Ok((vec, provider.name().to_string())),
                Err(e) => {
                    self.events.push(DegradationEvent {
                        skipped_provider: provider.name().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Err(MemoryError::DependencyFailed("no embedding provider in the chain succeeded".to_string()))
    }

    pub fn embed_batch(&mut self, texts: &[String]) -> MemoryResult<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t).map(|(v, _)| v)).collect()
    }

    pub fn drain_events(&mut self) -> Vec<DegradationEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::TfIdfFallback;

    #[test]
    fn empty_chain_errors() {
        let mut chain = DegradationChain::new();
        assert!(chain.embed("test").is_err());
    }

    #[test]
    fn len_and_empty_track_pushes() {
        let mut chain = DegradationChain::new();
        assert!(chain.is_empty());
        chain.push(Box::new(TfIdfFallback::new(64)));
        assert!(!chain.is_empty());
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn active_provider_name_reports_none_when_empty() {
        let chain = DegradationChain::new();
        assert_eq!(chain.active_provider_name(), "none");
    }

    #[test]
    fn active_provider_name_reports_first_available() {
        let mut chain = DegradationChain::new();
        chain.push(Box::new(TfIdfFallback::new(64)));
        assert_eq!(chain.active_provider_name(), "tfidf-fallback");
    }

    #[test]
    fn push_cache_fallback_is_used_on_embed() {
        let mut chain = DegradationChain::new();
        chain.push_cache_fallback(Box::new(TfIdfFallback::new(64)));
        let (vec, name) = chain.embed("test").unwrap();
        assert_eq!(name, "tfidf-fallback");
        assert_eq!(vec.len(), 64);
    }

    #[test]
    fn batch_embed_on_empty_chain_fails() {
        let mut chain = DegradationChain::new();
        assert!(chain.embed_batch(&["a".to_string(), "b".to_string()]).is_err());
    }

    #[test]
    fn drain_events_clears_and_is_idempotent() {
        let mut chain = DegradationChain::new();
        chain.push(Box::new(TfIdfFallback::new(64)));
        chain.embed("test").unwrap();
        assert!(chain.drain_events().is_empty());
        assert!(chain.drain_events().is_empty());
    }
}
