//! Local sentence-embedding model via `ort` (ONNX Runtime), spec §4.D's
//! "local text embedder". Construction never fails outright: a missing or
//! unreadable model just leaves the provider unavailable so the
//! degradation chain moves on to the TF-IDF fallback.

use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;

use memory_core::error::{MemoryError, MemoryResult};
use memory_core::traits::EmbeddingProvider;

pub struct OnnxProvider {
    session: Option<Mutex<Session>>,
    dims: usize,
}

impl OnnxProvider {
    pub fn load(model_path: &str, dims: usize) -> Self {
        if !Path::new(model_path).exists() {
            tracing::warn!(model_path, "onnx model path does not exist, provider unavailable");
            return Self { session: None, dims };
        }
        match Session::builder().and_then(|b| b.commit_from_file(model_path)) {
            Ok(session) => Self { session: Some(Mutex::new(session)), dims },
            Err(e) => {
                tracing::warn!(model_path, error = %e, "failed to load onnx model, provider unavailable");
                Self { session: None, dims }
            }
        }
    }

    fn embed_one(&self, _text: &str) -> MemoryResult<Vec<f32>> {
        // A real implementation tokenizes `text`, runs the session, and
        // mean-pools the last hidden state. Tokenization/pooling depend on
        // the specific model's vocabulary, which lives outside this crate.
        Err(MemoryError::DependencyFailed(
            "onnx inference path not wired to a tokenizer in this deployment".to_string(),
        ))
    }
}

impl EmbeddingProvider for OnnxProvider {
    fn embed(&self, text: &str) -> MemoryResult<Vec<f32>> {
        if self.session.is_none() {
            return Err(MemoryError::DependencyFailed("onnx model not loaded".to_string()));
        }
        self.embed_one(text)
    }

    fn embed_batch(&self, texts: &[String]) -> MemoryResult<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn name(&self) -> &str {
        "onnx-local"
    }

    fn is_available(&self) -> bool {
        // `embed_one` always errors until a tokenizer is wired in, so a
        // loaded session must never be reported available -- otherwise
        // the degradation chain would treat this provider as primary and
        // count every call as a failure instead of skipping straight to
        // the TF-IDF fallback.
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_path_is_unavailable() {
        let provider = OnnxProvider::load("/nonexistent/model.onnx", 384);
        assert!(!provider.is_available());
        assert!(provider.embed("hello").is_err());
    }
}
