//! L1 cache: in-process `moka` (spec §4.D sidecar cache, hot tier).

use moka::sync::Cache;

pub struct L1MokaCache {
    cache: Cache<String, Vec<f32>>,
}

impl L1MokaCache {
    pub fn new(capacity: u64) -> Self {
        Self { cache: Cache::new(capacity) }
    }

    pub fn get(&self, hash: &str) -> Option<Vec<f32>> {
        self.cache.get(hash)
    }

    pub fn insert(&self, hash: String, vector: Vec<f32>) {
        self.cache.insert(hash, vector);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_get_round_trips() {
        let cache = L1MokaCache::new(100);
        cache.insert("h1".to_string(), vec![1.0, 2.0]);
        assert_eq!(cache.get("h1"), Some(vec![1.0, 2.0]));
    }

    #[test]
    fn miss_returns_none() {
        let cache = L1MokaCache::new(100);
        assert_eq!(cache.get("missing"), None);
    }
}
