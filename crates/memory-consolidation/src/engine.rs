//! Consolidation pipeline orchestration (spec §4.F): normalize transcript,
//! extract candidates (regex, optionally LLM-boosted), dedup against
//! existing memories, persist survivors, and seed their FSRS cold-start
//! row. Single-execution guard modeled on the teacher's
//! `ConsolidationEngine::is_running` field.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use memory_breaker::BreakerRegistry;
use memory_core::config::{ConsolidationConfig, DecayConfig};
use memory_core::error::{MemoryError, MemoryResult};
use memory_core::traits::MemoryStore;
use memory_core::types::{Grade, Memory, Scope};

use crate::dedup::find_duplicate;
use crate::extraction::extract_candidates;
use crate::llm::{extract_with_breaker, LlmExtractor};
use crate::quality::quality_score;
use crate::transcript::normalize;

#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidationReport {
    pub candidates_extracted: usize,
    pub duplicates_skipped: usize,
    pub created: usize,
    pub quality_score: f64,
}

pub struct ConsolidationEngine {
    config: ConsolidationConfig,
    decay_config: DecayConfig,
    is_running: Arc<AtomicBool>,
    llm_extractor: Option<Box<dyn LlmExtractor>>,
    breaker_registry: Option<Arc<BreakerRegistry>>,
}

impl ConsolidationEngine {
    pub fn new(config: ConsolidationConfig) -> Self {
        Self::with_decay_config(config, DecayConfig::default())
    }

    pub fn with_decay_config(config: ConsolidationConfig, decay_config: DecayConfig) -> Self {
        Self {
            config,
            decay_config,
            is_running: Arc::new(AtomicBool::new(false)),
            llm_extractor: None,
            breaker_registry: None,
        }
    }

    pub fn with_llm(mut self, extractor: Box<dyn LlmExtractor>, breaker_registry: Arc<BreakerRegistry>) -> Self {
        self.llm_extractor = Some(extractor);
        self.breaker_registry = Some(breaker_registry);
        self
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    /// Runs one consolidation pass over `transcript_json`. Returns an
    /// error if another consolidation is already in flight on this
    /// engine -- at most one sweep runs at a time (spec §4.F).
    pub fn consolidate(
        &self,
        store: &dyn MemoryStore,
        fsrs_conn: &Connection,
        project_id: &str,
        session_id: Option<&str>,
        transcript_json: &str,
        now: DateTime<Utc>,
    ) -> MemoryResult<ConsolidationReport> {
        if self.is_running.compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed).is_err() {
            return Err(MemoryError::dependency_failed("a consolidation sweep is already in progress"));
        }
        let result = self.run(store, fsrs_conn, project_id, session_id, transcript_json, now);
        self.is_running.store(false, Ordering::Release);
        result
    }

    fn run(
        &self,
        store: &dyn MemoryStore,
        fsrs_conn: &Connection,
        project_id: &str,
        session_id: Option<&str>,
        transcript_json: &str,
        now: DateTime<Utc>,
    ) -> MemoryResult<ConsolidationReport> {
        let messages = normalize(transcript_json)?;
        let mut candidates = extract_candidates(&messages);

        if self.config.llm_enabled {
            if let (Some(extractor), Some(registry)) = (&self.llm_extractor, &self.breaker_registry) {
                candidates.extend(extract_with_breaker(registry, extractor.as_ref(), transcript_json));
            }
        }

        let score = quality_score(&candidates);

        // spec §4.F step 4: dedup checks every existing non-archived memory,
        // not just ones in the current project -- a cross-project match is
        // what triggers the EASY-grade reinforcement in step 6.
        let mut corpus: Vec<(String, String)> =
            store.list(false)?.into_iter().map(|m| (m.id, m.content)).collect();

        let mut created = 0usize;
        let mut duplicates = 0usize;
        let extracted_count = candidates.len();

        for candidate in candidates {
            if let Some(matched_id) = find_duplicate(&candidate.content, &corpus, self.config.dedup_ratio) {
                let matched_id = matched_id.to_string();
                self.reinforce_match(store, fsrs_conn, &matched_id, project_id, now)?;
                duplicates += 1;
                continue;
            }

            let memory = Memory::new(
                candidate.content.clone(),
                Scope::Project,
                project_id.to_string(),
                candidate.tags,
                candidate.base_importance,
                session_id.map(str::to_string),
                now,
            )?;
            store.create(&memory)?;
            memory_fsrs::ensure_cold_start(fsrs_conn, &memory.id, now)?;
            corpus.push((memory.id, candidate.content));
            created += 1;
        }

        Ok(ConsolidationReport { candidates_extracted: extracted_count, duplicates_skipped: duplicates, created, quality_score: score })
    }

    /// Reinforces the memory a duplicate candidate matched (spec §4.F
    /// steps 4 and 6): bumps importance and `reinforcement_count`, then
    /// records a FSRS review -- GOOD if the reconfirmation came from the
    /// same project, EASY if it crossed a project boundary.
    fn reinforce_match(
        &self,
        store: &dyn MemoryStore,
        fsrs_conn: &Connection,
        matched_id: &str,
        project_id: &str,
        now: DateTime<Utc>,
    ) -> MemoryResult<()> {
        let Some(mut matched) = store.get(matched_id)? else {
            return Ok(());
        };
        let grade = if matched.project_id == project_id { Grade::Good } else { Grade::Easy };

        matched.importance = memory_decay::reinforce(matched.importance, &self.decay_config);
        matched.reinforcement_count += 1;
        matched.last_reinforced = now;
        store.update(&matched)?;

        memory_fsrs::record_review(fsrs_conn, matched_id, project_id, grade, now)?;
        Ok(())
    }
}
