//! Core data model (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{MemoryError, MemoryResult};

/// Visibility of a memory. Transitions only project -> global, never back
/// except via explicit restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Project,
    Global,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Project => "project",
            Scope::Global => "global",
        }
    }
}

impl std::str::FromStr for Scope {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "project" => Ok(Scope::Project),
            "global" => Ok(Scope::Global),
            other => Err(MemoryError::InvalidInput(format!(
                "scope must be 'project' or 'global', got '{other}'"
            ))),
        }
    }
}

/// The unit of knowledge (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,
    pub content: String,
    pub scope: Scope,
    pub project_id: String,
    pub tags: Vec<String>,
    pub importance: f64,
    pub created: DateTime<Utc>,
    pub last_reinforced: DateTime<Utc>,
    pub reinforcement_count: u32,
    pub source_session: Option<String>,
    pub archived: bool,
    pub archive_reason: Option<String>,
    pub superseded_by: Option<String>,
    pub promoted_at: Option<DateTime<Utc>>,
}

impl Memory {
    /// `<epoch-ms>-<first 8 hex chars of blake3(content)>` per spec §4.A.
    pub fn make_id(content: &str, now: DateTime<Utc>) -> String {
        let hash = blake3::hash(content.as_bytes());
        let hex = &hash.to_hex()[..8];
        format!("{}-{hex}", now.timestamp_millis())
    }

    pub fn new(
        content: String,
        scope: Scope,
        project_id: String,
        tags: Vec<String>,
        importance: f64,
        source_session: Option<String>,
        now: DateTime<Utc>,
    ) -> MemoryResult<Self> {
        if !(0.0..=1.0).contains(&importance) {
            return Err(MemoryError::InvalidInput(format!(
                "importance must be within [0,1], got {importance}"
            )));
        }
        let id = Self::make_id(&content, now);
        Ok(Self {
            id,
            content,
            scope,
            project_id,
            tags,
            importance,
            created: now,
            last_reinforced: now,
            reinforcement_count: 0,
            source_session,
            archived: false,
            archive_reason: None,
            superseded_by: None,
            promoted_at: None,
        })
    }

    pub fn days_since_last_reinforced(&self, now: DateTime<Utc>) -> f64 {
        (now - self.last_reinforced).num_seconds() as f64 / 86_400.0
    }
}

/// 384-dimensional unit-norm embedding keyed by memory id (spec §3, §4.D).
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub memory_id: String,
    pub vector: Vec<f32>,
    pub content_hash: String,
}

pub const EMBEDDING_DIMENSIONS: usize = 384;

/// Grade assigned at a review event (spec §4.G).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Grade {
    Fail,
    Hard,
    Good,
    Easy,
}

impl Grade {
    pub fn stability_multiplier(&self) -> f64 {
        match self {
            Grade::Fail => 0.5,
            Grade::Hard => 0.8,
            Grade::Good => 1.5,
            Grade::Easy => 2.2,
        }
    }

    pub fn difficulty_drift(&self) -> f64 {
        match self {
            Grade::Fail => 1.0,
            Grade::Hard => 0.5,
            Grade::Good => -0.25,
            Grade::Easy => -0.5,
        }
    }
}

impl std::str::FromStr for Grade {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FAIL" => Ok(Grade::Fail),
            "HARD" => Ok(Grade::Hard),
            "GOOD" => Ok(Grade::Good),
            "EASY" => Ok(Grade::Easy),
            other => Err(MemoryError::InvalidInput(format!(
                "grade must be one of FAIL/HARD/GOOD/EASY, got '{other}'"
            ))),
        }
    }
}

/// One row per memory (spec §3, §4.G).
#[derive(Debug, Clone, PartialEq)]
pub struct FsrsState {
    pub memory_id: String,
    pub difficulty: f64,
    pub stability: f64,
    pub last_review: DateTime<Utc>,
    pub next_due: DateTime<Utc>,
    pub review_count: u32,
    pub validated_projects: BTreeSet<String>,
}

impl FsrsState {
    pub fn cold_start(memory_id: String, now: DateTime<Utc>) -> Self {
        Self {
            memory_id,
            difficulty: 5.0,
            stability: 1.0,
            last_review: now,
            next_due: now + chrono::Duration::days(1),
            review_count: 0,
            validated_projects: BTreeSet::new(),
        }
    }
}

/// Typed edge in the relationship/contradiction graph (spec §3, §4.I).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipType {
    Causal,
    Contradicts,
    Supports,
    Requires,
    Related,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Causal => "causal",
            RelationshipType::Contradicts => "contradicts",
            RelationshipType::Supports => "supports",
            RelationshipType::Requires => "requires",
            RelationshipType::Related => "related",
        }
    }
}

impl std::str::FromStr for RelationshipType {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "causal" => Ok(RelationshipType::Causal),
            "contradicts" => Ok(RelationshipType::Contradicts),
            "supports" => Ok(RelationshipType::Supports),
            "requires" => Ok(RelationshipType::Requires),
            "related" => Ok(RelationshipType::Related),
            other => Err(MemoryError::InvalidInput(format!(
                "unknown relationship type '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipEdge {
    pub from_id: String,
    pub to_id: String,
    pub edge_type: RelationshipType,
    pub strength: f64,
    pub evidence: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

/// Review history row, append-only and monotonic in time (spec §3, §5).
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewHistoryRow {
    pub memory_id: String,
    pub time: DateTime<Utc>,
    pub grade: Grade,
    pub stability_before: f64,
    pub stability_after: f64,
    pub difficulty_before: f64,
    pub difficulty_after: f64,
    pub interval_before_days: f64,
    pub interval_after_days: f64,
}

/// Cached query result set (spec §3, §4.E).
#[derive(Debug, Clone, PartialEq)]
pub struct SearchCacheEntry {
    pub fingerprint: String,
    pub memory_ids: Vec<String>,
    pub hit_count: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// One (query, position, selected) observation (spec §3, §4.E).
#[derive(Debug, Clone, PartialEq)]
pub struct SearchAnalyticsRow {
    pub query: String,
    pub result_count: usize,
    pub selected_memory_id: Option<String>,
    pub position: Option<u32>,
    pub time: DateTime<Utc>,
}

/// Per-named-call-site breaker state (spec §3, §4.C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerRecord {
    pub name: String,
    pub state: BreakerState,
    pub failure_count: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
}

/// A candidate extracted by the consolidator, pre-dedup (spec §4.F).
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryCandidate {
    pub content: String,
    pub base_importance: f64,
    pub tags: Vec<String>,
}

/// Result of a search query, annotated for explainability (spec §4.E).
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub memory: Memory,
    pub score: f64,
    pub snippet: String,
    pub match_reasons: Vec<String>,
}
