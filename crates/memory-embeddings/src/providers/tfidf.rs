//! Always-available deterministic fallback: hashes tokens into fixed-width
//! buckets with log-scaled term frequency, then L2-normalizes. Not a real
//! semantic embedder, but stable and dependency-free, so the chain never
//! bottoms out with "no embedding available" (spec §4.D).

use std::collections::HashMap;

use memory_core::error::MemoryResult;
use memory_core::traits::EmbeddingProvider;

pub struct TfIdfFallback {
    dims: usize,
}

impl TfIdfFallback {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }

    fn tokenize(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .map(|t| t.to_lowercase())
            .filter(|t| t.chars().count() >= 2)
            .collect()
    }

    fn bucket(&self, token: &str) -> usize {
        (blake3::hash(token.as_bytes()).as_bytes()[0] as usize
            | (blake3::hash(token.as_bytes()).as_bytes()[1] as usize) << 8)
            % self.dims
    }
}

impl EmbeddingProvider for TfIdfFallback {
    fn embed(&self, text: &str) -> MemoryResult<Vec<f32>> {
        let tokens = Self::tokenize(text);
        let mut counts: HashMap<usize, f32> = HashMap::new();
        for token in &tokens {
            *counts.entry(self.bucket(token)).or_insert(0.0) += 1.0;
        }
        let mut vec = vec![0.0f32; self.dims];
        for (bucket, count) in counts {
            vec[bucket] = (1.0 + count).ln();
        }
        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in vec.iter_mut() {
                *x /= norm;
            }
        }
        Ok(vec)
    }

    fn embed_batch(&self, texts: &[String]) -> MemoryResult<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn name(&self) -> &str {
        "tfidf-fallback"
    }

    fn is_available(&self) -> bool {
        true
    }
}
