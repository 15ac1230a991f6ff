//! Per-id striped locking (spec §5: "within a single memory id, operations
//! are serialized ... by a per-id lock").

use std::sync::{Arc, Mutex};

use dashmap::DashMap;

/// Hands out a shared `Mutex` per id. Holding the returned guard serializes
/// create/update/archive against every other caller using the same id.
#[derive(Default)]
pub struct LockTable {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self { locks: DashMap::new() }
    }

    pub fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        self.locks.entry(id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Run `f` while holding the per-id lock, releasing it before returning.
    pub fn with_lock<T>(&self, id: &str, f: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(id);
        let _guard = lock.lock().unwrap();
        f()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;

    #[test]
    fn serializes_concurrent_writers_to_the_same_id() {
        let table = Arc::new(LockTable::new());
        let counter = Arc::new(AtomicU32::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let table = table.clone();
            let counter = counter.clone();
            handles.push(thread::spawn(move || {
                table.with_lock("m-1", || {
                    let before = counter.load(Ordering::SeqCst);
                    thread::yield_now();
                    counter.store(before + 1, Ordering::SeqCst);
                });
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn distinct_ids_do_not_share_a_lock() {
        let table = LockTable::new();
        let a = table.lock_for("a");
        let b = table.lock_for("b");
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
