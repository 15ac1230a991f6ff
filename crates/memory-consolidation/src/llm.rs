//! Optional LLM-assisted extraction (spec §4.F step 3), gated behind the
//! circuit breaker so a hung or unreachable local model degrades to the
//! regex-only extraction path instead of stalling consolidation.

use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use memory_breaker::BreakerRegistry;
use memory_core::config::ConsolidationConfig;
use memory_core::error::{MemoryError, MemoryResult};
use memory_core::types::MemoryCandidate;

pub trait LlmExtractor: Send + Sync {
    fn extract(&self, transcript: &str) -> MemoryResult<Vec<MemoryCandidate>>;
}

#[derive(Debug, Deserialize)]
struct ExtractedCandidate {
    content: String,
    #[serde(default = "default_importance")]
    importance: f64,
    #[serde(default)]
    tags: Vec<String>,
}

fn default_importance() -> f64 {
    0.6
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Talks to a local Ollama-compatible `/api/generate` endpoint, asking
/// for a JSON array of candidate memories extracted from `transcript`.
pub struct OllamaExtractor {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
}

impl OllamaExtractor {
    pub fn new(config: &ConsolidationConfig) -> MemoryResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(config.llm_timeout_ms))
            .build()
            .map_err(MemoryError::dependency_failed)?;
        Ok(Self { client, endpoint: config.llm_endpoint.clone(), model: config.llm_model.clone() })
    }
}

impl LlmExtractor for OllamaExtractor {
    fn extract(&self, transcript: &str) -> MemoryResult<Vec<MemoryCandidate>> {
        let prompt = format!(
            "Extract durable facts worth remembering from this conversation as a JSON array \
             of objects with keys content, importance (0-1), tags (array of strings). \
             Conversation:\n{transcript}"
        );
        let body = json!({ "model": self.model, "prompt": prompt, "stream": false, "format": "json" });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(MemoryError::dependency_failed)?
            .error_for_status()
            .map_err(MemoryError::dependency_failed)?
            .json::<GenerateResponse>()
            .map_err(MemoryError::dependency_failed)?;

        let extracted: Vec<ExtractedCandidate> = serde_json::from_str(&response.response)
            .map_err(|e| MemoryError::dependency_failed(format!("unparseable llm response: {e}")))?;

        Ok(extracted
            .into_iter()
            .map(|e| MemoryCandidate { content: e.content, base_importance: e.importance.clamp(0.0, 1.0), tags: e.tags })
            .collect())
    }
}

/// Runs `extractor` through the `llm-extraction` named breaker in
/// `registry`, returning an empty candidate set (rather than an error) if
/// the breaker is open or the call fails -- LLM extraction is a quality
/// boost on top of regex extraction, never a hard dependency for
/// consolidation to proceed.
pub fn extract_with_breaker(registry: &BreakerRegistry, extractor: &dyn LlmExtractor, transcript: &str) -> Vec<MemoryCandidate> {
    match registry.call("llm-extraction", Utc::now(), || extractor.extract(transcript)) {
        Ok(candidates) => candidates,
        Err(e) => {
            tracing::warn!(error = %e, "llm extraction unavailable, continuing with regex candidates only");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    struct FailingExtractor;
    impl LlmExtractor for FailingExtractor {
        fn extract(&self, _transcript: &str) -> MemoryResult<Vec<MemoryCandidate>> {
            Err(MemoryError::dependency_failed("unreachable"))
        }
    }

    struct WorkingExtractor;
    impl LlmExtractor for WorkingExtractor {
        fn extract(&self, _transcript: &str) -> MemoryResult<Vec<MemoryCandidate>> {
            Ok(vec![MemoryCandidate { content: "found it".to_string(), base_importance: 0.8, tags: vec![] }])
        }
    }

    #[test]
    fn breaker_failure_degrades_to_empty_candidates() {
        let registry = BreakerRegistry::new(1, StdDuration::from_secs(60));
        let extracted = extract_with_breaker(&registry, &FailingExtractor, "transcript");
        assert!(extracted.is_empty());
    }

    #[test]
    fn breaker_closed_returns_extractor_output() {
        let registry = BreakerRegistry::new(3, StdDuration::from_secs(60));
        let extracted = extract_with_breaker(&registry, &WorkingExtractor, "transcript");
        assert_eq!(extracted.len(), 1);
    }
}
