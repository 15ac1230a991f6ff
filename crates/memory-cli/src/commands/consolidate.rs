use chrono::Utc;

use memory_consolidation::ConsolidationEngine;
use memory_core::error::MemoryResult;

use crate::context::AppContext;

pub fn run(ctx: &AppContext, project_id: &str, session_id: Option<&str>, transcript_path: &str) -> MemoryResult<()> {
    let transcript = std::fs::read_to_string(transcript_path)?;
    let fsrs_conn = ctx.fsrs_conn()?;
    let engine = ConsolidationEngine::with_decay_config(ctx.config.consolidation.clone(), ctx.config.decay.clone());

    let report = engine.consolidate(ctx.store.as_ref(), &fsrs_conn, project_id, session_id, &transcript, Utc::now())?;

    println!(
        "extracted={} duplicates_skipped={} created={} quality_score={:.3}",
        report.candidates_extracted, report.duplicates_skipped, report.created, report.quality_score
    );
    Ok(())
}
