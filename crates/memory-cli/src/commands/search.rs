use memory_core::error::MemoryResult;
use memory_core::traits::MemoryStore;
use memory_retrieval::cache::SearchFilters;
use memory_retrieval::search::SearchEngine;

use crate::context::AppContext;

pub fn run(
    ctx: &AppContext,
    query: &str,
    project_id: Option<&str>,
    tag: Option<&str>,
    min_importance: Option<f64>,
    limit: usize,
) -> MemoryResult<()> {
    let conn = ctx.intelligence_conn()?;
    let store: std::sync::Arc<dyn MemoryStore> = ctx.store.clone();
    let engine = SearchEngine::new(store, ctx.embeddings.clone(), ctx.config.retrieval.clone(), ctx.config.embedding.clone());

    let filters = SearchFilters {
        project_id: project_id.map(str::to_string),
        tags: tag.map(|t| vec![t.to_string()]).unwrap_or_default(),
        min_importance,
        ..Default::default()
    };
    let results = engine.search(&conn, query, filters)?;

    for result in results.into_iter().take(limit) {
        println!(
            "{:.3}  {}  [{}]  {}",
            result.score,
            result.memory.id,
            result.match_reasons.join(","),
            result.snippet
        );
    }
    Ok(())
}
