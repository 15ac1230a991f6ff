//! Daily and weekly maintenance jobs (spec §4.J), each returning a
//! summary struct suitable for logging or CLI rendering, in the style of
//! the teacher's per-operation `DecayResult`/`CleanupResult` pattern.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use memory_core::config::{DecayConfig, FsrsConfig};
use memory_core::error::MemoryResult;
use memory_core::traits::MemoryStore;
use memory_core::types::{BreakerState, Scope};

use memory_breaker::BreakerRegistry;
use memory_fsrs::{due_states, priority, rank_due, try_promote, DueCandidate, PromotionNotifier};

#[derive(Debug, Clone, PartialEq)]
pub struct DecayResult {
    pub scanned: usize,
    pub decayed: usize,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArchivalResult {
    pub scanned: usize,
    pub archived: usize,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub total_memories: usize,
    pub archived_memories: usize,
    /// Files moved to `.quarantine` for unparsable frontmatter (spec §7
    /// Corruption: "counted in health, never silently dropped").
    pub quarantined_memories: usize,
    /// Whether the memory directory could be listed at all.
    pub store_accessible: bool,
    pub breaker_states: HashMap<String, BreakerState>,
}

/// Daily corpus-wide statistics snapshot (spec §4.J).
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsSnapshot {
    pub total_memories: usize,
    pub project_scoped: usize,
    pub global_scoped: usize,
    pub archived_memories: usize,
    pub average_importance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DueReviewReport {
    pub due_candidates: Vec<DueCandidate>,
}

/// A memory whose reinforcement has gone stale long enough to surface in
/// the weekly freshness review (spec §4.J).
#[derive(Debug, Clone, PartialEq)]
pub struct FreshnessCandidate {
    pub memory_id: String,
    pub project_id: String,
    pub importance: f64,
    pub days_since_last_reinforced: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FreshnessReport {
    /// Stale but still important enough to keep -- surfaced for review.
    pub refresh_candidates: Vec<FreshnessCandidate>,
    /// Stale and already below the archival importance floor.
    pub archive_candidates: Vec<FreshnessCandidate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromotionSweepResult {
    pub evaluated: usize,
    pub promoted: usize,
    pub dry_run: bool,
}

/// Applies daily exponential decay to every non-archived memory's
/// importance (spec §4.B). `dry_run` gates only the final `store.update`
/// call -- the scan and count are always computed.
pub fn run_decay(store: &dyn MemoryStore, config: &DecayConfig, now: DateTime<Utc>, dry_run: bool) -> MemoryResult<DecayResult> {
    let memories = store.list(false)?;
    let mut decayed = 0usize;
    for mut memory in memories.iter().cloned() {
        let days = memory.days_since_last_reinforced(now);
        let new_importance = memory_decay::decay(memory.importance, days, config);
        if (new_importance - memory.importance).abs() < f64::EPSILON {
            continue;
        }
        decayed += 1;
        if dry_run {
            continue;
        }
        memory.importance = new_importance;
        store.update(&memory)?;
    }
    Ok(DecayResult { scanned: memories.len(), decayed, dry_run })
}

/// Archives memories that have fallen below the importance floor and
/// gone stale (spec §4.B). Must run after `run_decay` in the same pass so
/// archival sees the day's updated importance.
pub fn run_archival(store: &dyn MemoryStore, config: &DecayConfig, now: DateTime<Utc>, dry_run: bool) -> MemoryResult<ArchivalResult> {
    let memories = store.list(false)?;
    let mut archived = 0usize;
    for mut memory in memories.iter().cloned() {
        let days = memory.days_since_last_reinforced(now);
        if !memory_decay::should_archive(memory.importance, days, config) {
            continue;
        }
        archived += 1;
        if dry_run {
            continue;
        }
        memory.archived = true;
        memory.archive_reason = Some("importance below floor and stale".to_string());
        store.update(&memory)?;
    }
    Ok(ArchivalResult { scanned: memories.len(), archived, dry_run })
}

/// Snapshots system health: file accessibility, frontmatter integrity
/// (via `quarantine_count`), and every named breaker's current state
/// (spec §4.C, §4.J, §7). Never propagates a store error as a hard
/// failure -- an inaccessible store is itself a health finding, not a
/// crash.
pub fn run_health_check(
    store: &dyn MemoryStore,
    quarantine_count: usize,
    breaker_names: &[&str],
    registry: &BreakerRegistry,
) -> MemoryResult<HealthReport> {
    let (store_accessible, total_memories, archived_memories) = match store.list(true) {
        Ok(all) => (true, all.len(), all.iter().filter(|m| m.archived).count()),
        Err(_) => (false, 0, 0),
    };
    let breaker_states = breaker_names.iter().map(|name| (name.to_string(), registry.get_or_create(name).state())).collect();
    Ok(HealthReport {
        total_memories,
        archived_memories,
        quarantined_memories: quarantine_count,
        store_accessible,
        breaker_states,
    })
}

/// Corpus-wide statistics snapshot (spec §4.J daily job list).
pub fn run_statistics_snapshot(store: &dyn MemoryStore) -> MemoryResult<StatisticsSnapshot> {
    let all = store.list(true)?;
    let total_memories = all.len();
    let project_scoped = all.iter().filter(|m| m.scope == Scope::Project).count();
    let global_scoped = all.iter().filter(|m| m.scope == Scope::Global).count();
    let archived_memories = all.iter().filter(|m| m.archived).count();
    let average_importance =
        if total_memories > 0 { all.iter().map(|m| m.importance).sum::<f64>() / total_memories as f64 } else { 0.0 };
    Ok(StatisticsSnapshot { total_memories, project_scoped, global_scoped, archived_memories, average_importance })
}

/// Surfaces the highest-priority due reviews (spec §4.G), joining FSRS
/// due-states against each memory's importance from the storage layer.
/// `project` restricts the candidate pool to a single project; `limit`
/// defaults to `config.due_queue_default_limit` (spec default 10) when
/// `None`.
pub fn run_due_reviews(
    store: &dyn MemoryStore,
    fsrs_conn: &Connection,
    config: &FsrsConfig,
    project: Option<&str>,
    limit: Option<usize>,
    now: DateTime<Utc>,
) -> MemoryResult<DueReviewReport> {
    let due = due_states(fsrs_conn, now)?;
    let mut candidates = Vec::with_capacity(due.len());
    for state in due {
        let Some(memory) = store.get(&state.memory_id)? else { continue };
        if memory.archived {
            continue;
        }
        if let Some(project) = project {
            if memory.project_id != project {
                continue;
            }
        }
        let days_overdue = (now - state.next_due).num_seconds() as f64 / 86_400.0;
        candidates.push(DueCandidate {
            memory_id: state.memory_id,
            project_id: memory.project_id,
            importance: memory.importance,
            priority: priority(days_overdue, memory.importance),
        });
    }
    let ranked = rank_due(candidates, limit.unwrap_or(config.due_queue_default_limit));
    Ok(DueReviewReport { due_candidates: ranked })
}

/// Weekly freshness review (spec §4.J): scans every non-archived memory
/// whose days-since-last-reinforcement exceeds `config.stale_threshold_days`
/// and splits it into a refresh-candidate (still above the archival
/// importance floor) or archive-candidate bucket. Read-only -- the actual
/// archival write happens in `run_archival`; this job only reports.
pub fn run_freshness_review(store: &dyn MemoryStore, config: &DecayConfig, now: DateTime<Utc>) -> MemoryResult<FreshnessReport> {
    let mut report = FreshnessReport::default();
    for memory in store.list(false)? {
        let days = memory.days_since_last_reinforced(now);
        if days <= config.stale_threshold_days as f64 {
            continue;
        }
        let candidate = FreshnessCandidate {
            memory_id: memory.id,
            project_id: memory.project_id,
            importance: memory.importance,
            days_since_last_reinforced: days,
        };
        if candidate.importance < config.archive_importance_floor {
            report.archive_candidates.push(candidate);
        } else {
            report.refresh_candidates.push(candidate);
        }
    }
    Ok(report)
}

/// Runs the cross-project promotion engine over every memory with FSRS
/// history (spec §4.H). `dry_run` gates only the write inside
/// `try_promote`.
pub fn run_promotion_sweep(
    store: &dyn MemoryStore,
    fsrs_conn: &Connection,
    config: &FsrsConfig,
    notifier: Option<&PromotionNotifier>,
    now: DateTime<Utc>,
    dry_run: bool,
) -> MemoryResult<PromotionSweepResult> {
    let memories = store.list(false)?;
    let mut evaluated = 0usize;
    let mut promoted = 0usize;
    for memory in &memories {
        let Some(state) = memory_fsrs::get_state(fsrs_conn, &memory.id)? else { continue };
        evaluated += 1;
        if dry_run {
            if memory_fsrs::is_eligible(&state, config) && memory.scope == memory_core::types::Scope::Project {
                promoted += 1;
            }
            continue;
        }
        if try_promote(store, notifier, &memory.id, &state, config, now)?.is_some() {
            promoted += 1;
        }
    }
    Ok(PromotionSweepResult { evaluated, promoted, dry_run })
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_core::types::{Memory, Scope};
    use std::sync::Mutex;

    struct InMemoryStore {
        memories: Mutex<std::collections::HashMap<String, Memory>>,
    }

    impl InMemoryStore {
        fn new() -> Self {
            Self { memories: Mutex::new(std::collections::HashMap::new()) }
        }
    }

    impl MemoryStore for InMemoryStore {
        fn create(&self, memory: &Memory) -> MemoryResult<()> {
            self.memories.lock().unwrap().insert(memory.id.clone(), memory.clone());
            Ok(())
        }
        fn get(&self, id: &str) -> MemoryResult<Option<Memory>> {
            Ok(self.memories.lock().unwrap().get(id).cloned())
        }
        fn update(&self, memory: &Memory) -> MemoryResult<()> {
            self.memories.lock().unwrap().insert(memory.id.clone(), memory.clone());
            Ok(())
        }
        fn list(&self, include_archived: bool) -> MemoryResult<Vec<Memory>> {
            Ok(self.memories.lock().unwrap().values().filter(|m| include_archived || !m.archived).cloned().collect())
        }
    }

    fn mk(importance: f64, last_reinforced_days_ago: i64) -> Memory {
        let now = Utc::now();
        let mut m = Memory::new("x".repeat(20), Scope::Project, "proj-a".to_string(), vec![], importance, None, now).unwrap();
        m.last_reinforced = now - chrono::Duration::days(last_reinforced_days_ago);
        m
    }

    #[test]
    fn decay_lowers_importance_of_stale_memory() {
        let store = InMemoryStore::new();
        let memory = mk(0.8, 10);
        let id = memory.id.clone();
        store.create(&memory).unwrap();

        let result = run_decay(&store, &DecayConfig::default(), Utc::now(), false).unwrap();
        assert_eq!(result.decayed, 1);
        assert!(store.get(&id).unwrap().unwrap().importance < 0.8);
    }

    #[test]
    fn dry_run_decay_does_not_mutate_store() {
        let store = InMemoryStore::new();
        let memory = mk(0.8, 10);
        let id = memory.id.clone();
        store.create(&memory).unwrap();

        run_decay(&store, &DecayConfig::default(), Utc::now(), true).unwrap();
        assert_eq!(store.get(&id).unwrap().unwrap().importance, 0.8);
    }

    #[test]
    fn archival_moves_low_importance_stale_memory() {
        let store = InMemoryStore::new();
        let memory = mk(0.05, 200);
        let id = memory.id.clone();
        store.create(&memory).unwrap();

        let result = run_archival(&store, &DecayConfig::default(), Utc::now(), false).unwrap();
        assert_eq!(result.archived, 1);
        assert!(store.get(&id).unwrap().unwrap().archived);
    }

    #[test]
    fn due_reviews_surfaces_due_memories_ranked_by_priority() {
        let store = InMemoryStore::new();
        let conn = Connection::open_in_memory().unwrap();
        memory_fsrs::migrations::run_migrations(&conn).unwrap();

        let memory = mk(0.9, 1);
        store.create(&memory).unwrap();
        memory_fsrs::record_review(&conn, &memory.id, "proj-a", memory_core::types::Grade::Fail, Utc::now() - chrono::Duration::days(5))
            .unwrap();

        let report = run_due_reviews(&store, &conn, &FsrsConfig::default(), None, None, Utc::now()).unwrap();
        assert_eq!(report.due_candidates.len(), 1);
        assert_eq!(report.due_candidates[0].memory_id, memory.id);
    }

    #[test]
    fn freshness_review_categorizes_stale_memories_by_importance() {
        let store = InMemoryStore::new();
        let refresh = mk(0.6, 200);
        let archive = mk(0.1, 200);
        let fresh = mk(0.6, 5);
        store.create(&refresh).unwrap();
        store.create(&archive).unwrap();
        store.create(&fresh).unwrap();

        let report = run_freshness_review(&store, &DecayConfig::default(), Utc::now()).unwrap();
        assert_eq!(report.refresh_candidates.len(), 1);
        assert_eq!(report.refresh_candidates[0].memory_id, refresh.id);
        assert_eq!(report.archive_candidates.len(), 1);
        assert_eq!(report.archive_candidates[0].memory_id, archive.id);
    }

    #[test]
    fn promotion_sweep_promotes_eligible_memories() {
        let store = InMemoryStore::new();
        let conn = Connection::open_in_memory().unwrap();
        memory_fsrs::migrations::run_migrations(&conn).unwrap();

        let memory = mk(0.6, 1);
        store.create(&memory).unwrap();
        let now = Utc::now();
        memory_fsrs::record_review(&conn, &memory.id, "proj-a", memory_core::types::Grade::Easy, now - chrono::Duration::days(10))
            .unwrap();
        memory_fsrs::record_review(&conn, &memory.id, "proj-b", memory_core::types::Grade::Easy, now - chrono::Duration::days(5))
            .unwrap();
        memory_fsrs::record_review(&conn, &memory.id, "proj-c", memory_core::types::Grade::Easy, now).unwrap();

        let result = run_promotion_sweep(&store, &conn, &FsrsConfig::default(), None, now, false).unwrap();
        assert_eq!(result.promoted, 1);
        assert_eq!(store.get(&memory.id).unwrap().unwrap().scope, Scope::Global);
    }

    #[test]
    fn health_check_reports_counts_and_breaker_states() {
        let store = InMemoryStore::new();
        store.create(&mk(0.8, 1)).unwrap();
        let mut archived = mk(0.1, 1);
        archived.archived = true;
        store.create(&archived).unwrap();

        let registry = BreakerRegistry::new(3, std::time::Duration::from_secs(60));
        let report = run_health_check(&store, 2, &["llm-extraction"], &registry).unwrap();
        assert!(report.store_accessible);
        assert_eq!(report.total_memories, 2);
        assert_eq!(report.archived_memories, 1);
        assert_eq!(report.quarantined_memories, 2);
        assert_eq!(report.breaker_states.get("llm-extraction"), Some(&BreakerState::Closed));
    }

    #[test]
    fn statistics_snapshot_summarizes_scope_and_importance() {
        let store = InMemoryStore::new();
        store.create(&mk(0.8, 1)).unwrap();
        let mut global = mk(0.4, 1);
        global.scope = Scope::Global;
        store.create(&global).unwrap();

        let snapshot = run_statistics_snapshot(&store).unwrap();
        assert_eq!(snapshot.total_memories, 2);
        assert_eq!(snapshot.project_scoped, 1);
        assert_eq!(snapshot.global_scoped, 1);
        assert!((snapshot.average_importance - 0.6).abs() < 1e-9);
    }
}
