//! Scheduled background jobs: decay, archival, health checks, freshness
//! review, and cross-project promotion sweeps (spec §3, §4.J).

pub mod jobs;
pub mod schedule;

pub use jobs::{
    run_archival, run_decay, run_due_reviews, run_freshness_review, run_health_check, run_promotion_sweep,
    run_statistics_snapshot, ArchivalResult, DecayResult, DueReviewReport, FreshnessCandidate, FreshnessReport, HealthReport,
    PromotionSweepResult, StatisticsSnapshot,
};
pub use schedule::{is_due, mark_ran, Window};
