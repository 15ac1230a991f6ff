//! FSRS-style spaced repetition scheduler (spec §4.G).
//!
//! `fsrs_state` and `review_history` live in the FSRS sidecar database.
//! The due-queue priority formula needs each candidate's `importance` and
//! `project_id`, which live in the intelligence/storage sidecar, so this
//! module only produces `due_states()` — pure FSRS rows — and leaves the
//! cross-database join to the caller via `rank_due`.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use memory_core::error::{MemoryError, MemoryResult};
use memory_core::types::{FsrsState, Grade, ReviewHistoryRow};

fn encode_projects(projects: &BTreeSet<String>) -> String {
    projects.iter().cloned().collect::<Vec<_>>().join(",")
}

fn decode_projects(raw: &str) -> BTreeSet<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
}

fn load_state(conn: &Connection, memory_id: &str) -> MemoryResult<Option<FsrsState>> {
    conn.query_row(
        "SELECT difficulty, stability, last_review, next_due, review_count, validated_projects
         FROM fsrs_state WHERE memory_id = ?1",
        params![memory_id],
        |row| {
            let last_review: String = row.get(2)?;
            let next_due: String = row.get(3)?;
            let validated: String = row.get(5)?;
            Ok(FsrsState {
                memory_id: memory_id.to_string(),
                difficulty: row.get(0)?,
                stability: row.get(1)?,
                last_review: last_review.parse::<DateTime<Utc>>().unwrap_or_else(|_| Utc::now()),
                next_due: next_due.parse::<DateTime<Utc>>().unwrap_or_else(|_| Utc::now()),
                review_count: row.get(4)?,
                validated_projects: decode_projects(&validated),
            })
        },
    )
    .optional()
    .map_err(MemoryError::dependency_failed)
}

fn save_state(conn: &Connection, state: &FsrsState) -> MemoryResult<()> {
    conn.execute(
        "INSERT INTO fsrs_state (memory_id, difficulty, stability, last_review, next_due, review_count, validated_projects)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(memory_id) DO UPDATE SET
             difficulty = excluded.difficulty,
             stability = excluded.stability,
             last_review = excluded.last_review,
             next_due = excluded.next_due,
             review_count = excluded.review_count,
             validated_projects = excluded.validated_projects",
        params![
            state.memory_id,
            state.difficulty,
            state.stability,
            state.last_review.to_rfc3339(),
            state.next_due.to_rfc3339(),
            state.review_count,
            encode_projects(&state.validated_projects),
        ],
    )
    .map_err(MemoryError::dependency_failed)?;
    Ok(())
}

/// Records a single review event, updating `fsrs_state` and appending to
/// `review_history` within one transaction (spec §4.G).
///
/// The interval after review is `round(stability_new).max(1)` days, except
/// for the very first review away from a cold start, where the prior
/// 1-day cold-start interval is doubled instead (spec §4.G: "min 1 day for
/// non-FSRS cold-starts, which double the prior interval").
pub fn record_review(
    conn: &Connection,
    memory_id: &str,
    project_id: &str,
    grade: Grade,
    now: DateTime<Utc>,
) -> MemoryResult<ReviewHistoryRow> {
    let prior = load_state(conn, memory_id)?.unwrap_or_else(|| FsrsState::cold_start(memory_id.to_string(), now));
    let is_cold_start_transition = prior.review_count == 0;

    let interval_before_days = (prior.next_due - prior.last_review).num_seconds() as f64 / 86_400.0;

    let stability_after = (prior.stability * grade.stability_multiplier()).max(0.1);
    let difficulty_after = (prior.difficulty + grade.difficulty_drift()).clamp(1.0, 10.0);

    let interval_after_days = if is_cold_start_transition {
        (interval_before_days * 2.0).max(1.0)
    } else {
        stability_after.round().max(1.0)
    };

    let mut validated_projects = prior.validated_projects.clone();
    validated_projects.insert(project_id.to_string());

    let next_state = FsrsState {
        memory_id: memory_id.to_string(),
        difficulty: difficulty_after,
        stability: stability_after,
        last_review: now,
        next_due: now + chrono::Duration::days(interval_after_days as i64),
        review_count: prior.review_count + 1,
        validated_projects,
    };

    let row = ReviewHistoryRow {
        memory_id: memory_id.to_string(),
        time: now,
        grade,
        stability_before: prior.stability,
        stability_after,
        difficulty_before: prior.difficulty,
        difficulty_after,
        interval_before_days,
        interval_after_days,
    };

    conn.execute_batch("BEGIN IMMEDIATE").map_err(MemoryError::dependency_failed)?;
    let result = (|| -> MemoryResult<()> {
        save_state(conn, &next_state)?;
        conn.execute(
            "INSERT INTO review_history
             (memory_id, time, grade, stability_before, stability_after, difficulty_before, difficulty_after, interval_before_days, interval_after_days)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                row.memory_id,
                row.time.to_rfc3339(),
                format!("{:?}", row.grade).to_uppercase(),
                row.stability_before,
                row.stability_after,
                row.difficulty_before,
                row.difficulty_after,
                row.interval_before_days,
                row.interval_after_days,
            ],
        )
        .map_err(MemoryError::dependency_failed)?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            conn.execute_batch("COMMIT").map_err(MemoryError::dependency_failed)?;
            Ok(row)
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

pub fn get_state(conn: &Connection, memory_id: &str) -> MemoryResult<Option<FsrsState>> {
    load_state(conn, memory_id)
}

/// Inserts a cold-start `fsrs_state` row for a freshly created memory if
/// one doesn't already exist. Idempotent -- re-running consolidation over
/// an already-seen memory id never resets its review history.
pub fn ensure_cold_start(conn: &Connection, memory_id: &str, now: DateTime<Utc>) -> MemoryResult<FsrsState> {
    if let Some(existing) = load_state(conn, memory_id)? {
        return Ok(existing);
    }
    let state = FsrsState::cold_start(memory_id.to_string(), now);
    save_state(conn, &state)?;
    Ok(state)
}

/// FSRS rows whose `next_due` has passed, in no particular order — the
/// caller joins against memory metadata and calls `rank_due` (spec §4.G).
pub fn due_states(conn: &Connection, now: DateTime<Utc>) -> MemoryResult<Vec<FsrsState>> {
    let mut stmt = conn
        .prepare(
            "SELECT memory_id, difficulty, stability, last_review, next_due, review_count, validated_projects
             FROM fsrs_state WHERE next_due <= ?1",
        )
        .map_err(MemoryError::dependency_failed)?;
    let rows = stmt
        .query_map(params![now.to_rfc3339()], |row| {
            let memory_id: String = row.get(0)?;
            let last_review: String = row.get(3)?;
            let next_due: String = row.get(4)?;
            let validated: String = row.get(6)?;
            Ok(FsrsState {
                memory_id,
                difficulty: row.get(1)?,
                stability: row.get(2)?,
                last_review: last_review.parse::<DateTime<Utc>>().unwrap_or_else(|_| now),
                next_due: next_due.parse::<DateTime<Utc>>().unwrap_or_else(|_| now),
                review_count: row.get(5)?,
                validated_projects: decode_projects(&validated),
            })
        })
        .map_err(MemoryError::dependency_failed)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r.map_err(MemoryError::dependency_failed)?);
    }
    Ok(out)
}

/// `priority = max(0, days_overdue) * 2 + importance * 100` (spec §4.G).
pub fn priority(days_overdue: f64, importance: f64) -> f64 {
    days_overdue.max(0.0) * 2.0 + importance * 100.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct DueCandidate {
    pub memory_id: String,
    pub project_id: String,
    pub importance: f64,
    pub priority: f64,
}

/// Sorts candidates by descending priority and truncates to `limit`
/// (spec §4.G default limit 10).
pub fn rank_due(mut candidates: Vec<DueCandidate>, limit: usize) -> Vec<DueCandidate> {
    candidates.sort_by(|a, b| {
        b.priority.partial_cmp(&a.priority).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.memory_id.cmp(&b.memory_id))
    });
    candidates.truncate(limit);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cold_start_first_review_doubles_prior_interval() {
        let conn = Connection::open_in_memory().unwrap();
        crate::migrations::run_migrations(&conn).unwrap();
        let now = Utc::now();
        let row = record_review(&conn, "mem-1", "proj-a", Grade::Good, now).unwrap();
        assert_eq!(row.interval_before_days.round(), 1.0);
        assert_eq!(row.interval_after_days, 2.0);
    }

    #[test]
    fn subsequent_review_uses_rounded_stability() {
        let conn = Connection::open_in_memory().unwrap();
        crate::migrations::run_migrations(&conn).unwrap();
        let now = Utc::now();
        record_review(&conn, "mem-1", "proj-a", Grade::Good, now).unwrap();
        let second = record_review(&conn, "mem-1", "proj-a", Grade::Good, now + chrono::Duration::days(2)).unwrap();
        assert_eq!(second.interval_after_days, second.stability_after.round().max(1.0));
    }

    #[test]
    fn fail_grade_drops_stability_and_raises_difficulty() {
        let conn = Connection::open_in_memory().unwrap();
        crate::migrations::run_migrations(&conn).unwrap();
        let now = Utc::now();
        let row = record_review(&conn, "mem-1", "proj-a", Grade::Fail, now).unwrap();
        assert!(row.stability_after < row.stability_before * 1.0 + 0.001);
        assert!(row.difficulty_after > row.difficulty_before);
    }

    #[test]
    fn review_accumulates_validated_projects() {
        let conn = Connection::open_in_memory().unwrap();
        crate::migrations::run_migrations(&conn).unwrap();
        let now = Utc::now();
        record_review(&conn, "mem-1", "proj-a", Grade::Good, now).unwrap();
        record_review(&conn, "mem-1", "proj-b", Grade::Good, now + chrono::Duration::days(2)).unwrap();
        let state = get_state(&conn, "mem-1").unwrap().unwrap();
        assert_eq!(state.validated_projects.len(), 2);
    }

    #[test]
    fn due_states_only_returns_overdue_rows() {
        let conn = Connection::open_in_memory().unwrap();
        crate::migrations::run_migrations(&conn).unwrap();
        let now = Utc::now();
        record_review(&conn, "mem-1", "proj-a", Grade::Fail, now - chrono::Duration::days(5)).unwrap();
        record_review(&conn, "mem-2", "proj-a", Grade::Easy, now).unwrap();

        let due = due_states(&conn, now).unwrap();
        let ids: Vec<&str> = due.iter().map(|s| s.memory_id.as_str()).collect();
        assert!(ids.contains(&"mem-1"));
        assert!(!ids.contains(&"mem-2"));
    }

    #[test]
    fn rank_due_orders_by_priority_and_truncates() {
        let candidates = vec![
            DueCandidate { memory_id: "a".into(), project_id: "p".into(), importance: 0.1, priority: priority(1.0, 0.1) },
            DueCandidate { memory_id: "b".into(), project_id: "p".into(), importance: 0.9, priority: priority(0.0, 0.9) },
        ];
        let ranked = rank_due(candidates, 1);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].memory_id, "b");
    }

    #[test]
    fn ensure_cold_start_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        crate::migrations::run_migrations(&conn).unwrap();
        let now = Utc::now();
        ensure_cold_start(&conn, "mem-1", now).unwrap();
        record_review(&conn, "mem-1", "proj-a", Grade::Good, now + chrono::Duration::hours(1)).unwrap();
        let after_review = get_state(&conn, "mem-1").unwrap().unwrap();

        let fetched_again = ensure_cold_start(&conn, "mem-1", now + chrono::Duration::days(10)).unwrap();
        assert_eq!(fetched_again, after_review);
    }
}
