//! Circuit breaker for outbound LLM calls (spec §4.C).
//!
//! CLOSED -> OPEN after `failure_threshold` consecutive failures. OPEN
//! rejects immediately until `recovery_timeout` elapses, then allows
//! exactly one HALF_OPEN probe: success closes, failure reopens.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use memory_core::{BreakerState, CircuitBreakerRecord, MemoryError, MemoryResult};
use rusqlite::{params, Connection};
use std::sync::Arc;

struct BreakerInner {
    state: BreakerState,
    failure_count: u32,
    last_failure_at: Option<DateTime<Utc>>,
    opened_at: Option<DateTime<Utc>>,
    /// Set while a HALF_OPEN probe is in flight so concurrent callers are
    /// rejected rather than each attempting their own probe.
    probing: bool,
}

/// A single named breaker. Cheaply clonable via `Arc`; the registry hands
/// out the *same* `Arc` for repeat lookups of the same name.
pub struct Breaker {
    name: String,
    failure_threshold: u32,
    recovery_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

enum Decision {
    Proceed,
    ProceedAsProbe,
    Reject,
}

impl Breaker {
    fn new(name: String, failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            name,
            failure_threshold,
            recovery_timeout,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failure_count: 0,
                last_failure_at: None,
                opened_at: None,
                probing: false,
            }),
        }
    }

    fn restore(name: String, failure_threshold: u32, recovery_timeout: Duration, record: CircuitBreakerRecord) -> Self {
        Self {
            name,
            failure_threshold,
            recovery_timeout,
            inner: Mutex::new(BreakerInner {
                state: record.state,
                failure_count: record.failure_count,
                last_failure_at: record.last_failure_at,
                opened_at: record.opened_at,
                probing: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().unwrap().state
    }

    pub fn record(&self) -> CircuitBreakerRecord {
        let g = self.inner.lock().unwrap();
        CircuitBreakerRecord {
            name: self.name.clone(),
            state: g.state,
            failure_count: g.failure_count,
            last_failure_at: g.last_failure_at,
            opened_at: g.opened_at,
        }
    }

    fn decide(&self, now: DateTime<Utc>) -> Decision {
        let mut g = self.inner.lock().unwrap();
        match g.state {
            BreakerState::Closed => Decision::Proceed,
            BreakerState::Open => {
                let elapsed = g
                    .opened_at
                    .map(|t| (now - t).num_seconds() >= self.recovery_timeout.as_secs() as i64)
                    .unwrap_or(false);
                if elapsed && !g.probing {
                    g.state = BreakerState::HalfOpen;
                    g.probing = true;
                    Decision::ProceedAsProbe
                } else {
                    Decision::Reject
                }
            }
            BreakerState::HalfOpen => {
                if g.probing {
                    Decision::Reject
                } else {
                    g.probing = true;
                    Decision::ProceedAsProbe
                }
            }
        }
    }

    fn on_success(&self, now: DateTime<Utc>) {
        let mut g = self.inner.lock().unwrap();
        g.state = BreakerState::Closed;
        g.failure_count = 0;
        g.opened_at = None;
        g.probing = false;
        let _ = now;
    }

    fn on_failure(&self, now: DateTime<Utc>) {
        let mut g = self.inner.lock().unwrap();
        g.last_failure_at = Some(now);
        g.probing = false;
        match g.state {
            BreakerState::HalfOpen => {
                g.state = BreakerState::Open;
                g.opened_at = Some(now);
            }
            BreakerState::Closed => {
                g.failure_count += 1;
                if g.failure_count >= self.failure_threshold {
                    g.state = BreakerState::Open;
                    g.opened_at = Some(now);
                }
            }
            BreakerState::Open => {}
        }
    }

    /// Run `f` through the breaker. Never invokes `f` while OPEN.
    pub fn call<T>(&self, now: DateTime<Utc>, f: impl FnOnce() -> MemoryResult<T>) -> MemoryResult<T> {
        match self.decide(now) {
            Decision::Reject => Err(MemoryError::CircuitOpen {
                name: self.name.clone(),
            }),
            Decision::Proceed | Decision::ProceedAsProbe => match f() {
                Ok(v) => {
                    self.on_success(now);
                    Ok(v)
                }
                Err(e) => {
                    self.on_failure(now);
                    Err(e)
                }
            },
        }
    }
}

/// Named registry returning the same breaker instance per call site.
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<Breaker>>,
    failure_threshold: u32,
    recovery_timeout: Duration,
    conn: Option<Mutex<Connection>>,
}

impl BreakerRegistry {
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            breakers: DashMap::new(),
            failure_threshold,
            recovery_timeout,
            conn: None,
        }
    }

    /// Open (creating if needed) a durable sidecar so breaker state
    /// survives process restart, per spec §4.C.
    pub fn with_durable_state(mut self, conn: Connection) -> MemoryResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS circuit_breakers (
                name TEXT PRIMARY KEY,
                state TEXT NOT NULL,
                failure_count INTEGER NOT NULL,
                last_failure_at TEXT,
                opened_at TEXT
            );",
        )
        .map_err(MemoryError::dependency_failed)?;
        self.conn = Some(Mutex::new(conn));
        Ok(self)
    }

    fn load(&self, name: &str) -> Option<CircuitBreakerRecord> {
        let conn = self.conn.as_ref()?.lock().unwrap();
        conn.query_row(
            "SELECT state, failure_count, last_failure_at, opened_at FROM circuit_breakers WHERE name = ?1",
            params![name],
            |row| {
                let state: String = row.get(0)?;
                let state = match state.as_str() {
                    "open" => BreakerState::Open,
                    "half_open" => BreakerState::HalfOpen,
                    _ => BreakerState::Closed,
                };
                let last_failure_at: Option<String> = row.get(2)?;
                let opened_at: Option<String> = row.get(3)?;
                Ok(CircuitBreakerRecord {
                    name: name.to_string(),
                    state,
                    failure_count: row.get::<_, i64>(1)? as u32,
                    last_failure_at: last_failure_at
                        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                        .map(|dt| dt.with_timezone(&Utc)),
                    opened_at: opened_at
                        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                        .map(|dt| dt.with_timezone(&Utc)),
                })
            },
        )
        .ok()
    }

    fn persist(&self, breaker: &Breaker) {
        let Some(conn) = &self.conn else { return };
        let record = breaker.record();
        let state = match record.state {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        };
        let conn = conn.lock().unwrap();
        let _ = conn.execute(
            "INSERT INTO circuit_breakers (name, state, failure_count, last_failure_at, opened_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(name) DO UPDATE SET
                state = excluded.state,
                failure_count = excluded.failure_count,
                last_failure_at = excluded.last_failure_at,
                opened_at = excluded.opened_at",
            params![
                record.name,
                state,
                record.failure_count,
                record.last_failure_at.map(|t| t.to_rfc3339()),
                record.opened_at.map(|t| t.to_rfc3339()),
            ],
        );
    }

    /// Returns the shared breaker for `name`, creating (or restoring from
    /// durable state) it on first use. Repeat calls return the *same*
    /// `Arc`, so state genuinely accumulates across call sites.
    pub fn get_or_create(&self, name: &str) -> Arc<Breaker> {
        if let Some(existing) = self.breakers.get(name) {
            return existing.clone();
        }
        let breaker = match self.load(name) {
            Some(record) => Breaker::restore(name.to_string(), self.failure_threshold, self.recovery_timeout, record),
            None => Breaker::new(name.to_string(), self.failure_threshold, self.recovery_timeout),
        };
        let arc = Arc::new(breaker);
        self.breakers.entry(name.to_string()).or_insert_with(|| arc.clone());
        self.breakers.get(name).unwrap().clone()
    }

    /// Run `f` through the named breaker, persisting its state afterward.
    pub fn call<T>(&self, name: &str, now: DateTime<Utc>, f: impl FnOnce() -> MemoryResult<T>) -> MemoryResult<T> {
        let breaker = self.get_or_create(name);
        let result = breaker.call(now, f);
        self.persist(&breaker);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn opens_after_threshold_failures() {
        let reg = BreakerRegistry::new(3, Duration::from_secs(60));
        for _ in 0..3 {
            let r: MemoryResult<()> = reg.call("llm", now(), || Err(MemoryError::DependencyFailed("boom".into())));
            assert!(r.is_err());
        }
        let r: MemoryResult<()> = reg.call("llm", now(), || Ok(()));
        assert!(matches!(r, Err(MemoryError::CircuitOpen { .. })));
    }

    #[test]
    fn half_open_probe_after_recovery_timeout() {
        let reg = BreakerRegistry::new(1, Duration::from_secs(60));
        let _ = reg.call::<()>("llm", now(), || Err(MemoryError::DependencyFailed("boom".into())));
        assert_eq!(reg.get_or_create("llm").state(), memory_core::BreakerState::Open);

        let later = now() + ChronoDuration::seconds(61);
        let r = reg.call("llm", later, || Ok::<_, MemoryError>(42));
        assert_eq!(r.unwrap(), 42);
        assert_eq!(reg.get_or_create("llm").state(), memory_core::BreakerState::Closed);
    }

    #[test]
    fn registry_shares_state_across_lookups() {
        let reg = BreakerRegistry::new(3, Duration::from_secs(60));
        let a = reg.get_or_create("llm");
        let _ = a.call::<()>(now(), || Err(MemoryError::DependencyFailed("boom".into())));
        let b = reg.get_or_create("llm");
        assert_eq!(b.record().failure_count, 1, "second lookup must see the same breaker state");
    }

    #[test]
    fn durable_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("breakers.sqlite3");

        {
            let conn = Connection::open(&path).unwrap();
            let reg = BreakerRegistry::new(1, Duration::from_secs(60)).with_durable_state(conn).unwrap();
            let _ = reg.call::<()>("llm", now(), || Err(MemoryError::DependencyFailed("boom".into())));
            assert_eq!(reg.get_or_create("llm").state(), memory_core::BreakerState::Open);
        }

        {
            let conn = Connection::open(&path).unwrap();
            let reg = BreakerRegistry::new(1, Duration::from_secs(60)).with_durable_state(conn).unwrap();
            assert_eq!(reg.get_or_create("llm").state(), memory_core::BreakerState::Open);
        }
    }
}
