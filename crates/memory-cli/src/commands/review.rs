use std::str::FromStr;

use chrono::Utc;

use memory_core::error::MemoryResult;
use memory_core::types::Grade;
use memory_maintenance::run_due_reviews;

use crate::context::AppContext;

pub fn due(ctx: &AppContext, project: Option<&str>, limit: Option<usize>) -> MemoryResult<()> {
    let fsrs_conn = ctx.fsrs_conn()?;
    let report = run_due_reviews(ctx.store.as_ref(), &fsrs_conn, &ctx.config.fsrs, project, limit, Utc::now())?;
    for candidate in report.due_candidates {
        println!("{}  project={}  priority={:.2}  importance={:.2}", candidate.memory_id, candidate.project_id, candidate.priority, candidate.importance);
    }
    Ok(())
}

pub fn grade(ctx: &AppContext, memory_id: &str, grade: &str) -> MemoryResult<()> {
    let grade = Grade::from_str(grade)?;
    let mut memory = ctx
        .store
        .as_ref()
        .get(memory_id)?
        .ok_or_else(|| memory_core::error::MemoryError::not_found("memory", memory_id))?;

    let now = Utc::now();
    let fsrs_conn = ctx.fsrs_conn()?;
    let row = memory_fsrs::record_review(&fsrs_conn, &memory.id, &memory.project_id, grade, now)?;

    // spec §4.B: importance reinforcement boosts apply on GOOD/EASY only.
    if matches!(grade, Grade::Good | Grade::Easy) {
        memory.importance = memory_decay::reinforce(memory.importance, &ctx.config.decay);
        memory.reinforcement_count += 1;
        memory.last_reinforced = now;
        ctx.store.as_ref().update(&memory)?;
    }

    println!(
        "stability {:.2} -> {:.2}  difficulty {:.2} -> {:.2}  next in {:.0} day(s)",
        row.stability_before, row.stability_after, row.difficulty_before, row.difficulty_after, row.interval_after_days
    );
    Ok(())
}
