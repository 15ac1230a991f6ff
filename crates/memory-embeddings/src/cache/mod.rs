mod l1_moka;
pub mod l2_sqlite;

pub use l1_moka::L1MokaCache;
pub use l2_sqlite::L2SqliteCache;

use memory_core::error::MemoryResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheHitTier {
    L1,
    L2,
    Miss,
}

/// Checks L1 then L2, promoting L2 hits into L1 (spec §4.D two-tier cache).
pub struct CacheCoordinator {
    pub l1: L1MokaCache,
    pub l2: L2SqliteCache,
}

impl CacheCoordinator {
    pub fn new(l1_capacity: u64) -> MemoryResult<Self> {
        Ok(Self { l1: L1MokaCache::new(l1_capacity), l2: L2SqliteCache::in_memory()? })
    }

    pub fn with_l2(l1_capacity: u64, l2: L2SqliteCache) -> Self {
        Self { l1: L1MokaCache::new(l1_capacity), l2 }
    }

    pub fn get(&self, hash: &str) -> (Option<Vec<f32>>, CacheHitTier) {
        if let Some(v) = self.l1.get(hash) {
            return (Some(v), CacheHitTier::L1);
        }
        if let Some(v) = self.l2.get(hash) {
            self.l1.insert(hash.to_string(), v.clone());
            return (Some(v), CacheHitTier::L2);
        }
        (None, CacheHitTier::Miss)
    }

    pub fn insert(&self, hash: String, vector: Vec<f32>) {
        self.l2.insert(hash.clone(), &vector);
        self.l1.insert(hash, vector);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cold_start_is_a_miss() {
        let coord = CacheCoordinator::new(100).unwrap();
        let (result, tier) = coord.get("cold-hash");
        assert!(result.is_none());
        assert_eq!(tier, CacheHitTier::Miss);
    }

    #[test]
    fn l2_hit_promotes_to_l1() {
        let coord = CacheCoordinator::new(100).unwrap();
        coord.l2.insert("l2-only".to_string(), &[1.0, 2.0, 3.0]);

        let (result, tier) = coord.get("l2-only");
        assert_eq!(result, Some(vec![1.0, 2.0, 3.0]));
        assert_eq!(tier, CacheHitTier::L2);

        let (result, tier) = coord.get("l2-only");
        assert_eq!(result, Some(vec![1.0, 2.0, 3.0]));
        assert_eq!(tier, CacheHitTier::L1);
    }

    #[test]
    fn insert_populates_both_tiers() {
        let coord = CacheCoordinator::new(100).unwrap();
        coord.insert("both".to_string(), vec![4.0, 5.0]);
        assert!(!coord.l2.is_empty());
        let (_, tier) = coord.get("both");
        assert_eq!(tier, CacheHitTier::L1);
    }
}
