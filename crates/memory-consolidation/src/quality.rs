//! Consolidation-pass quality score (spec §4.F step 5): a coarse signal
//! for whether a sweep produced a few strong candidates or a pile of
//! marginal ones.
//!
//! `0.5 * min(1, high_importance_count / 3) + 0.5 * mean(importances)`

use memory_core::types::MemoryCandidate;

const HIGH_IMPORTANCE_THRESHOLD: f64 = 0.7;

pub fn quality_score(candidates: &[MemoryCandidate]) -> f64 {
    if candidates.is_empty() {
        return 0.0;
    }
    let high_importance_count = candidates.iter().filter(|c| c.base_importance >= HIGH_IMPORTANCE_THRESHOLD).count() as f64;
    let mean_importance = candidates.iter().map(|c| c.base_importance).sum::<f64>() / candidates.len() as f64;
    0.5 * (high_importance_count / 3.0).min(1.0) + 0.5 * mean_importance
}
