//! Bounded connection pool over `rusqlite::Connection` (spec §5: "all I/O
//! on the sidecar SQL databases uses a bounded connection pool (default 5)
//! with exponential backoff on contention").
//!
//! The corpus doesn't pull in `r2d2` at this scale (`cortex-storage` rolls
//! its own pool too), so this is a small hand-rolled free-list behind a
//! `Mutex` + `Condvar`.

use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex};
use std::thread;
use std::time::Duration;

use rusqlite::Connection;

use memory_core::error::{MemoryError, MemoryResult};

struct PoolInner {
    free: Vec<Connection>,
    outstanding: usize,
}

/// A bounded pool of connections to a single SQLite database file.
pub struct SqlitePool {
    path: PathBuf,
    capacity: usize,
    inner: Mutex<PoolInner>,
    available: Condvar,
}

/// A connection checked out from the pool; returns it on drop.
pub struct PooledConnection<'a> {
    pool: &'a SqlitePool,
    conn: Option<Connection>,
}

impl std::ops::Deref for PooledConnection<'_> {
    type Target = Connection;
    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

impl SqlitePool {
    /// Opens (creating parent directories as needed) `capacity` lazily
    /// materialized connections to `path`.
    pub fn open(path: impl AsRef<Path>, capacity: usize) -> MemoryResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let capacity = capacity.max(1);
        Ok(Self {
            path,
            capacity,
            inner: Mutex::new(PoolInner { free: Vec::new(), outstanding: 0 }),
            available: Condvar::new(),
        })
    }

    fn open_connection(&self) -> MemoryResult<Connection> {
        let conn = Connection::open(&self.path).map_err(MemoryError::dependency_failed)?;
        conn.pragma_update(None, "journal_mode", "WAL").map_err(MemoryError::dependency_failed)?;
        conn.pragma_update(None, "synchronous", "NORMAL").map_err(MemoryError::dependency_failed)?;
        conn.pragma_update(None, "foreign_keys", "ON").map_err(MemoryError::dependency_failed)?;
        Ok(conn)
    }

    /// Checks out a connection, blocking (with exponential backoff) until
    /// one is free or `capacity` allows opening a new one.
    pub fn get(&self) -> MemoryResult<PooledConnection<'_>> {
        let mut backoff = Duration::from_millis(5);
        loop {
            {
                let mut guard = self.inner.lock().unwrap();
                if let Some(conn) = guard.free.pop() {
                    guard.outstanding += 1;
                    return Ok(PooledConnection { pool: self, conn: Some(conn) });
                }
                if guard.outstanding < self.capacity {
                    guard.outstanding += 1;
                } else {
                    // Wait to be woken by a release, with a bounded timeout
                    // so a poisoned/slow waiter still retries with backoff.
                    let (g, _timeout) =
                        self.available.wait_timeout(guard, Duration::from_millis(50)).unwrap();
                    drop(g);
                    continue;
                }
            }
            match self.open_connection() {
                Ok(conn) => return Ok(PooledConnection { pool: self, conn: Some(conn) }),
                Err(e) => {
                    let mut guard = self.inner.lock().unwrap();
                    guard.outstanding -= 1;
                    drop(guard);
                    thread::sleep(backoff);
                    backoff = (backoff * 2).min(Duration::from_millis(500));
                    if backoff >= Duration::from_millis(500) {
                        return Err(e);
                    }
                }
            }
        }
    }

    fn release(&self, conn: Connection) {
        let mut guard = self.inner.lock().unwrap();
        guard.outstanding -= 1;
        guard.free.push(conn);
        drop(guard);
        self.available.notify_one();
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_connections_up_to_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let pool = SqlitePool::open(dir.path().join("x.sqlite3"), 2).unwrap();
        let a = pool.get().unwrap();
        let b = pool.get().unwrap();
        a.execute_batch("CREATE TABLE t (id INTEGER)").unwrap();
        let _ = &b;
    }

    #[test]
    fn released_connections_are_reused() {
        let dir = tempfile::tempdir().unwrap();
        let pool = SqlitePool::open(dir.path().join("x.sqlite3"), 1).unwrap();
        {
            let conn = pool.get().unwrap();
            conn.execute_batch("CREATE TABLE t (id INTEGER)").unwrap();
        }
        // second checkout must not block forever now that the first was released.
        let conn = pool.get().unwrap();
        conn.execute("INSERT INTO t (id) VALUES (1)", []).unwrap();
    }
}
