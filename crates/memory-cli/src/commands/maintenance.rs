use std::time::Duration;

use chrono::Utc;

use memory_breaker::BreakerRegistry;
use memory_core::error::MemoryResult;
use memory_maintenance::{run_archival, run_decay, run_health_check, run_promotion_sweep, run_statistics_snapshot, Window};

use crate::context::AppContext;

/// Named breaker call sites checked by the daily health job (spec §4.C).
const BREAKER_NAMES: &[&str] = &["llm-extraction"];

pub fn daily(ctx: &AppContext, dry_run: bool) -> MemoryResult<()> {
    let session_conn = ctx.session_conn()?;
    let now = Utc::now();

    if !memory_maintenance::is_due(&session_conn, "daily", Window::Daily, now)? {
        println!("daily maintenance already ran for this window");
        return Ok(());
    }

    let decay = run_decay(ctx.store.as_ref(), &ctx.config.decay, now, dry_run)?;
    let archival = run_archival(ctx.store.as_ref(), &ctx.config.decay, now, dry_run)?;
    println!(
        "decay: scanned={} decayed={} dry_run={}",
        decay.scanned, decay.decayed, decay.dry_run
    );
    println!(
        "archival: scanned={} archived={} dry_run={}",
        archival.scanned, archival.archived, archival.dry_run
    );

    let breaker_conn = ctx.session_conn()?;
    let registry = BreakerRegistry::new(
        ctx.config.breaker.failure_threshold,
        Duration::from_secs(ctx.config.breaker.recovery_timeout_s),
    )
    .with_durable_state(breaker_conn)?;
    let health = run_health_check(ctx.store.as_ref(), ctx.store.quarantine_count()?, BREAKER_NAMES, &registry)?;
    println!(
        "health: accessible={} total={} archived={} quarantined={} breakers={:?}",
        health.store_accessible, health.total_memories, health.archived_memories, health.quarantined_memories, health.breaker_states
    );

    let stats = run_statistics_snapshot(ctx.store.as_ref())?;
    println!(
        "statistics: total={} project={} global={} archived={} avg_importance={:.3}",
        stats.total_memories, stats.project_scoped, stats.global_scoped, stats.archived_memories, stats.average_importance
    );

    if !dry_run {
        memory_maintenance::mark_ran(&session_conn, "daily", Window::Daily, now)?;
    }
    Ok(())
}

pub fn weekly(ctx: &AppContext, dry_run: bool) -> MemoryResult<()> {
    let session_conn = ctx.session_conn()?;
    let fsrs_conn = ctx.fsrs_conn()?;
    let now = Utc::now();

    if !memory_maintenance::is_due(&session_conn, "weekly", Window::Weekly, now)? {
        println!("weekly maintenance already ran for this window");
        return Ok(());
    }

    let freshness = memory_maintenance::run_freshness_review(ctx.store.as_ref(), &ctx.config.decay, now)?;
    println!(
        "freshness review: {} refresh-candidate(s), {} archive-candidate(s)",
        freshness.refresh_candidates.len(),
        freshness.archive_candidates.len()
    );

    let promotion = run_promotion_sweep(ctx.store.as_ref(), &fsrs_conn, &ctx.config.fsrs, None, now, dry_run)?;
    println!(
        "promotion sweep: evaluated={} promoted={} dry_run={}",
        promotion.evaluated, promotion.promoted, promotion.dry_run
    );

    if !dry_run {
        memory_maintenance::mark_ran(&session_conn, "weekly", Window::Weekly, now)?;
    }
    Ok(())
}
