use std::str::FromStr;

use chrono::Utc;

use memory_core::error::{MemoryError, MemoryResult};
use memory_core::types::{RelationshipEdge, RelationshipType};
use memory_graph::{EdgeDirection, GraphManager};

use crate::context::AppContext;

pub fn add(ctx: &AppContext, from_id: &str, to_id: &str, edge_type: &str, strength: f64, evidence: &str) -> MemoryResult<()> {
    let edge_type = RelationshipType::from_str(edge_type)?;
    let edge = RelationshipEdge {
        from_id: from_id.to_string(),
        to_id: to_id.to_string(),
        edge_type,
        strength,
        evidence: evidence.to_string(),
        created_at: Utc::now(),
        created_by: "cli".to_string(),
    };

    let conn = ctx.intelligence_conn()?;
    memory_graph::persist_edge(&conn, &edge)?;
    println!("added {} -[{}]-> {}", from_id, edge_type.as_str(), to_id);
    Ok(())
}

pub fn chain(ctx: &AppContext, from_id: &str, to_id: &str) -> MemoryResult<()> {
    let conn = ctx.intelligence_conn()?;
    let graph = GraphManager::load_from(&conn)?;
    match graph.find_causal_chain(from_id, to_id, ctx.config.graph.max_causal_chain_depth) {
        Some(path) => println!("{}", path.join(" -> ")),
        None => println!("no causal chain found"),
    }
    Ok(())
}

pub fn contradictions(ctx: &AppContext, memory_id: &str) -> MemoryResult<()> {
    let conn = ctx.intelligence_conn()?;
    let graph = GraphManager::load_from(&conn)?;
    for edge in graph.detect_contradictions(memory_id) {
        println!("{} contradicts {} ({})", edge.from_id, edge.to_id, edge.evidence);
    }
    Ok(())
}

pub fn edges(
    ctx: &AppContext,
    memory_id: &str,
    direction: &str,
    edge_type: Option<&str>,
    min_strength: f64,
) -> MemoryResult<()> {
    let direction = match direction {
        "outgoing" => EdgeDirection::Outgoing,
        "incoming" => EdgeDirection::Incoming,
        "both" => EdgeDirection::Both,
        other => return Err(MemoryError::InvalidInput(format!("unknown direction '{other}'"))),
    };
    let edge_type = edge_type.map(RelationshipType::from_str).transpose()?;

    let conn = ctx.intelligence_conn()?;
    let graph = GraphManager::load_from(&conn)?;
    for edge in graph.query_edges(memory_id, direction, edge_type, min_strength) {
        println!("{} -[{} {:.2}]-> {}", edge.from_id, edge.edge_type.as_str(), edge.strength, edge.to_id);
    }
    Ok(())
}

pub fn stats(ctx: &AppContext) -> MemoryResult<()> {
    let conn = ctx.intelligence_conn()?;
    let graph = GraphManager::load_from(&conn)?;
    let stats = graph.stats();
    println!("nodes: {}", stats.node_count);
    println!("edges: {}", stats.edge_count);
    println!("average strength: {:.3}", stats.average_strength);
    for edge_type in [
        RelationshipType::Causal,
        RelationshipType::Contradicts,
        RelationshipType::Supports,
        RelationshipType::Requires,
        RelationshipType::Related,
    ] {
        let count = stats.counts_by_type.get(&edge_type).copied().unwrap_or(0);
        println!("  {}: {}", edge_type.as_str(), count);
    }
    Ok(())
}
