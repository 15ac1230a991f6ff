//! Hybrid and final ranking scores (spec §4.E).

use chrono::{DateTime, Utc};

use memory_core::config::RetrievalConfig;

/// `hybrid = 0.7 × semantic + 0.3 × bm25_norm`, clipped to [0,1].
pub fn hybrid_score(semantic: f64, bm25_norm: f64, config: &RetrievalConfig) -> f64 {
    (config.hybrid_semantic_weight * semantic.clamp(0.0, 1.0)
        + config.hybrid_bm25_weight * bm25_norm.clamp(0.0, 1.0))
    .clamp(0.0, 1.0)
}

/// `recency = max(0, 1 − days_old/365)`.
pub fn recency(created: DateTime<Utc>, now: DateTime<Utc>, config: &RetrievalConfig) -> f64 {
    let days_old = (now - created).num_seconds() as f64 / 86_400.0;
    (1.0 - days_old / config.recency_half_life_days).max(0.0).clamp(0.0, 1.0)
}

/// `score = 0.5 × semantic + 0.2 × keyword_norm + 0.2 × recency + 0.1 × importance`.
pub fn final_score(
    semantic: f64,
    keyword_norm: f64,
    recency: f64,
    importance: f64,
    config: &RetrievalConfig,
) -> f64 {
    (config.rank_semantic_weight * semantic.clamp(0.0, 1.0)
        + config.rank_keyword_weight * keyword_norm.clamp(0.0, 1.0)
        + config.rank_recency_weight * recency.clamp(0.0, 1.0)
        + config.rank_importance_weight * importance.clamp(0.0, 1.0))
    .clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn hybrid_score_matches_spec_weights() {
        let config = RetrievalConfig::default();
        let score = hybrid_score(1.0, 1.0, &config);
        assert!((score - 1.0).abs() < 1e-9);
        let score = hybrid_score(0.5, 0.0, &config);
        assert!((score - 0.35).abs() < 1e-9);
    }

    #[test]
    fn recency_decays_linearly_over_a_year() {
        let config = RetrievalConfig::default();
        let now = Utc::now();
        assert!((recency(now, now, &config) - 1.0).abs() < 1e-9);
        let half_year_ago = now - Duration::days(182);
        assert!((recency(half_year_ago, now, &config) - 0.5).abs() < 0.01);
        let two_years_ago = now - Duration::days(730);
        assert_eq!(recency(two_years_ago, now, &config), 0.0);
    }

    #[test]
    fn final_score_all_components_max_is_one() {
        let config = RetrievalConfig::default();
        assert!((final_score(1.0, 1.0, 1.0, 1.0, &config) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn final_score_is_clipped() {
        let config = RetrievalConfig::default();
        let score = final_score(2.0, 2.0, 2.0, 2.0, &config);
        assert!(score <= 1.0);
    }
}
