use chrono::Utc;

use memory_core::error::MemoryResult;
use memory_maintenance::run_freshness_review;

use crate::context::AppContext;

/// Which action the `freshness` CLI subcommand performs over the week's
/// stale-memory scan (spec §6: `freshness [--scan|--refresh|--archive]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessMode {
    /// Read-only: print the categorized candidates, change nothing.
    Scan,
    /// Apply a manual reinforcement to every refresh-candidate.
    Refresh,
    /// Archive every archive-candidate immediately.
    Archive,
}

pub fn run(ctx: &AppContext, mode: FreshnessMode) -> MemoryResult<()> {
    let now = Utc::now();
    let report = run_freshness_review(ctx.store.as_ref(), &ctx.config.decay, now)?;

    println!("refresh-candidates ({}):", report.refresh_candidates.len());
    for c in &report.refresh_candidates {
        println!("  {}  project={}  importance={:.2}  stale_days={:.0}", c.memory_id, c.project_id, c.importance, c.days_since_last_reinforced);
    }
    println!("archive-candidates ({}):", report.archive_candidates.len());
    for c in &report.archive_candidates {
        println!("  {}  project={}  importance={:.2}  stale_days={:.0}", c.memory_id, c.project_id, c.importance, c.days_since_last_reinforced);
    }

    match mode {
        FreshnessMode::Scan => {}
        FreshnessMode::Refresh => {
            for c in &report.refresh_candidates {
                if let Some(mut memory) = ctx.store.as_ref().get(&c.memory_id)? {
                    memory.importance = memory_decay::reinforce(memory.importance, &ctx.config.decay);
                    memory.reinforcement_count += 1;
                    memory.last_reinforced = now;
                    ctx.store.as_ref().update(&memory)?;
                }
            }
            println!("refreshed {} memory(ies)", report.refresh_candidates.len());
        }
        FreshnessMode::Archive => {
            for c in &report.archive_candidates {
                if let Some(mut memory) = ctx.store.as_ref().get(&c.memory_id)? {
                    memory.archived = true;
                    memory.archive_reason = Some("decayed".to_string());
                    ctx.store.as_ref().update(&memory)?;
                }
            }
            println!("archived {} memory(ies)", report.archive_candidates.len());
        }
    }
    Ok(())
}
