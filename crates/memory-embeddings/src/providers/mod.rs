mod onnx;
mod tfidf;

pub use onnx::OnnxProvider;
pub use tfidf::TfIdfFallback;

use memory_core::config::EmbeddingConfig;
use memory_core::traits::EmbeddingProvider;

/// Resolves the configured provider. Unknown provider names, missing
/// model paths, and load failures all fall back to TF-IDF rather than
/// erroring — the degradation chain is what actually enforces
/// availability at embed time.
pub fn create_provider(config: &EmbeddingConfig) -> Box<dyn EmbeddingProvider> {
    match config.provider.as_str() {
        "onnx" => match &config.model_path {
            Some(path) => Box::new(OnnxProvider::load(path, config.dimensions)),
            None => Box::new(TfIdfFallback::new(config.dimensions)),
        },
        "tfidf" => Box::new(TfIdfFallback::new(config.dimensions)),
        other => {
            tracing::warn!(provider = other, "unknown embedding provider, falling back to tfidf");
            Box::new(TfIdfFallback::new(config.dimensions))
        }
    }
}
