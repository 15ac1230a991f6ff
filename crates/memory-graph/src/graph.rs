//! In-memory relationship/contradiction graph (spec §3, §4.I), backed by
//! a SQL sidecar for durability.
//!
//! Generalizes the DAG-enforcing `GraphManager` this crate is modeled on:
//! spec §4.I explicitly allows cycles (e.g. "a causes b" and "b causes a"
//! can coexist as distinct evidenced claims), so no cycle check gates
//! `add_edge`.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rusqlite::{params, Connection};

use memory_core::error::{MemoryError, MemoryResult};
use memory_core::types::{RelationshipEdge, RelationshipType};

struct Inner {
    graph: StableDiGraph<String, RelationshipEdge>,
    index: HashMap<String, NodeIndex>,
}

/// Which side(s) of a node's edges a query should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDirection {
    Outgoing,
    Incoming,
    Both,
}

/// Global graph stats (spec §4.I). Per-memory in/out counts are returned
/// separately by `GraphManager::degree`.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub counts_by_type: HashMap<RelationshipType, usize>,
    pub average_strength: f64,
}

impl Inner {
    fn node_for(&mut self, id: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(id.to_string());
        self.index.insert(id.to_string(), idx);
        idx
    }
}

/// Thread-safe handle to the relationship graph. Cloning shares the
/// underlying graph via `Arc`.
#[derive(Clone)]
pub struct GraphManager {
    inner: Arc<RwLock<Inner>>,
}

impl GraphManager {
    pub fn new() -> Self {
        Self { inner: Arc::new(RwLock::new(Inner { graph: StableDiGraph::new(), index: HashMap::new() })) }
    }

    /// Rebuilds an in-memory graph from the SQL sidecar, e.g. on process
    /// start, mirroring `memory-storage::reindex::rebuild`.
    pub fn load_from(conn: &Connection) -> MemoryResult<Self> {
        let manager = Self::new();
        for edge in load_all(conn)? {
            manager.add_edge(edge);
        }
        Ok(manager)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Inserts or replaces an edge in memory, keyed on the full
    /// `(from_id, to_id, edge_type)` triple (spec §3: the triple, not just
    /// the node pair, is unique) so that e.g. a `causal` and a `supports`
    /// edge between the same two memories coexist instead of clobbering
    /// each other. Call `persist_edge` separately to durably write it to
    /// the sidecar within the same transaction as any caller-side
    /// bookkeeping.
    pub fn add_edge(&self, edge: RelationshipEdge) {
        let mut inner = self.write();
        let from = inner.node_for(&edge.from_id);
        let to = inner.node_for(&edge.to_id);
        let existing = inner
            .graph
            .edges_directed(from, Direction::Outgoing)
            .find(|e| e.target() == to && e.weight().edge_type == edge.edge_type)
            .map(|e| e.id());
        if let Some(existing) = existing {
            inner.graph.remove_edge(existing);
        }
        inner.graph.add_edge(from, to, edge);
    }

    pub fn remove_edge(&self, from_id: &str, to_id: &str, edge_type: RelationshipType) -> bool {
        let mut inner = self.write();
        let (Some(&from), Some(&to)) = (inner.index.get(from_id), inner.index.get(to_id)) else { return false };
        let existing = inner
            .graph
            .edges_directed(from, Direction::Outgoing)
            .find(|e| e.target() == to && e.weight().edge_type == edge_type)
            .map(|e| e.id());
        match existing {
            Some(e) => {
                inner.graph.remove_edge(e);
                true
            }
            None => false,
        }
    }

    pub fn node_count(&self) -> usize {
        self.read().graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.read().graph.edge_count()
    }

    /// Outgoing then incoming edges touching `id`, unfiltered.
    pub fn edges_for(&self, id: &str) -> Vec<RelationshipEdge> {
        self.query_edges(id, EdgeDirection::Both, None, 0.0)
    }

    /// Outgoing/incoming/both edges touching `id`, optionally restricted to
    /// a single `edge_type` and a minimum `strength` (spec §4.I: "Queries:
    /// outgoing/incoming/both by type with min-strength filter").
    pub fn query_edges(
        &self,
        id: &str,
        direction: EdgeDirection,
        edge_type: Option<RelationshipType>,
        min_strength: f64,
    ) -> Vec<RelationshipEdge> {
        let inner = self.read();
        let Some(&idx) = inner.index.get(id) else { return Vec::new() };
        let mut out = Vec::new();
        if matches!(direction, EdgeDirection::Outgoing | EdgeDirection::Both) {
            out.extend(inner.graph.edges_directed(idx, Direction::Outgoing).map(|e| e.weight().clone()));
        }
        if matches!(direction, EdgeDirection::Incoming | EdgeDirection::Both) {
            out.extend(inner.graph.edges_directed(idx, Direction::Incoming).map(|e| e.weight().clone()));
        }
        out.retain(|e| edge_type.map(|t| e.edge_type == t).unwrap_or(true) && e.strength >= min_strength);
        out
    }

    /// `(incoming, outgoing)` edge counts for `id`.
    pub fn degree(&self, id: &str) -> (usize, usize) {
        let inner = self.read();
        let Some(&idx) = inner.index.get(id) else { return (0, 0) };
        let incoming = inner.graph.edges_directed(idx, Direction::Incoming).count();
        let outgoing = inner.graph.edges_directed(idx, Direction::Outgoing).count();
        (incoming, outgoing)
    }

    /// Global counts by edge type and the corpus-wide average strength
    /// (spec §4.I: "Stats: per-memory in/out counts; global counts by
    /// type; average strength"). Per-memory in/out counts are `degree`.
    pub fn stats(&self) -> GraphStats {
        let inner = self.read();
        let mut counts_by_type: HashMap<RelationshipType, usize> = HashMap::new();
        let mut total_strength = 0.0;
        let mut edge_count = 0usize;
        for edge in inner.graph.edge_weights() {
            *counts_by_type.entry(edge.edge_type).or_insert(0) += 1;
            total_strength += edge.strength;
            edge_count += 1;
        }
        let average_strength = if edge_count > 0 { total_strength / edge_count as f64 } else { 0.0 };
        GraphStats {
            node_count: inner.graph.node_count(),
            edge_count,
            counts_by_type,
            average_strength,
        }
    }

    /// All `contradicts` edges touching `id` (spec §4.I contradiction
    /// surfacing at review time).
    pub fn detect_contradictions(&self, id: &str) -> Vec<RelationshipEdge> {
        self.edges_for(id).into_iter().filter(|e| e.edge_type == RelationshipType::Contradicts).collect()
    }

    /// BFS over `causal` edges only, from `from_id` to `to_id`, bounded by
    /// `max_depth` hops. Returns the path of memory ids if found.
    pub fn find_causal_chain(&self, from_id: &str, to_id: &str, max_depth: usize) -> Option<Vec<String>> {
        let inner = self.read();
        let &start = inner.index.get(from_id)?;
        let target = *inner.index.get(to_id)?;

        let mut visited = std::collections::HashSet::new();
        let mut queue: VecDeque<(NodeIndex, Vec<NodeIndex>)> = VecDeque::new();
        queue.push_back((start, vec![start]));
        visited.insert(start);

        while let Some((node, path)) = queue.pop_front() {
            if node == target {
                return Some(path.into_iter().map(|idx| inner.graph[idx].clone()).collect());
            }
            if path.len() > max_depth {
                continue;
            }
            for edge in inner.graph.edges_directed(node, Direction::Outgoing) {
                if edge.weight().edge_type != RelationshipType::Causal {
                    continue;
                }
                let next = edge.target();
                if visited.insert(next) {
                    let mut next_path = path.clone();
                    next_path.push(next);
                    queue.push_back((next, next_path));
                }
            }
        }
        None
    }
}

impl Default for GraphManager {
    fn default() -> Self {
        Self::new()
    }
}

pub fn persist_edge(conn: &Connection, edge: &RelationshipEdge) -> MemoryResult<()> {
    conn.execute(
        "INSERT INTO relationship_edges (from_id, to_id, edge_type, strength, evidence, created_at, created_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(from_id, to_id, edge_type) DO UPDATE SET
             strength = excluded.strength,
             evidence = excluded.evidence,
             created_at = excluded.created_at,
             created_by = excluded.created_by",
        params![
            edge.from_id,
            edge.to_id,
            edge.edge_type.as_str(),
            edge.strength,
            edge.evidence,
            edge.created_at.to_rfc3339(),
            edge.created_by,
        ],
    )
    .map_err(MemoryError::dependency_failed)?;
    Ok(())
}

pub fn remove_persisted_edge(conn: &Connection, from_id: &str, to_id: &str, edge_type: RelationshipType) -> MemoryResult<()> {
    conn.execute(
        "DELETE FROM relationship_edges WHERE from_id = ?1 AND to_id = ?2 AND edge_type = ?3",
        params![from_id, to_id, edge_type.as_str()],
    )
    .map_err(MemoryError::dependency_failed)?;
    Ok(())
}

pub fn load_all(conn: &Connection) -> MemoryResult<Vec<RelationshipEdge>> {
    let mut stmt = conn
        .prepare("SELECT from_id, to_id, edge_type, strength, evidence, created_at, created_by FROM relationship_edges")
        .map_err(MemoryError::dependency_failed)?;
    let rows = stmt
        .query_map([], |row| {
            let from_id: String = row.get(0)?;
            let to_id: String = row.get(1)?;
            let edge_type: String = row.get(2)?;
            let strength: f64 = row.get(3)?;
            let evidence: String = row.get(4)?;
            let created_at: String = row.get(5)?;
            let created_by: String = row.get(6)?;
            Ok((from_id, to_id, edge_type, strength, evidence, created_at, created_by))
        })
        .map_err(MemoryError::dependency_failed)?;

    let mut out = Vec::new();
    for row in rows {
        let (from_id, to_id, edge_type, strength, evidence, created_at, created_by) =
            row.map_err(MemoryError::dependency_failed)?;
        let edge_type: RelationshipType = edge_type.parse().map_err(|_| {
            MemoryError::corruption("relationship_edges", format!("unknown edge_type '{edge_type}'"))
        })?;
        out.push(RelationshipEdge {
            from_id,
            to_id,
            edge_type,
            strength,
            evidence,
            created_at: created_at.parse().map_err(|_| {
                MemoryError::corruption("relationship_edges", "invalid created_at timestamp")
            })?,
            created_by,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn edge(from: &str, to: &str, ty: RelationshipType) -> RelationshipEdge {
        RelationshipEdge {
            from_id: from.to_string(),
            to_id: to.to_string(),
            edge_type: ty,
            strength: 0.8,
            evidence: "test".to_string(),
            created_at: Utc::now(),
            created_by: "tester".to_string(),
        }
    }

    #[test]
    fn allows_cycles_unlike_dag_enforcement() {
        let graph = GraphManager::new();
        graph.add_edge(edge("a", "b", RelationshipType::Causal));
        graph.add_edge(edge("b", "a", RelationshipType::Causal));
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn finds_causal_chain_across_hops() {
        let graph = GraphManager::new();
        graph.add_edge(edge("a", "b", RelationshipType::Causal));
        graph.add_edge(edge("b", "c", RelationshipType::Causal));
        let chain = graph.find_causal_chain("a", "c", 5).unwrap();
        assert_eq!(chain, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    }

    #[test]
    fn causal_chain_respects_depth_bound() {
        let graph = GraphManager::new();
        graph.add_edge(edge("a", "b", RelationshipType::Causal));
        graph.add_edge(edge("b", "c", RelationshipType::Causal));
        assert!(graph.find_causal_chain("a", "c", 1).is_none());
    }

    #[test]
    fn detects_contradictions_touching_a_node() {
        let graph = GraphManager::new();
        graph.add_edge(edge("a", "b", RelationshipType::Contradicts));
        graph.add_edge(edge("a", "c", RelationshipType::Related));
        let contradictions = graph.detect_contradictions("a");
        assert_eq!(contradictions.len(), 1);
        assert_eq!(contradictions[0].to_id, "b");
    }

    #[test]
    fn persists_and_reloads_edges() {
        let conn = Connection::open_in_memory().unwrap();
        crate::migrations::run_migrations(&conn).unwrap();
        persist_edge(&conn, &edge("a", "b", RelationshipType::Supports)).unwrap();

        let manager = GraphManager::load_from(&conn).unwrap();
        assert_eq!(manager.edge_count(), 1);
    }

    #[test]
    fn remove_edge_drops_from_graph_and_sidecar() {
        let conn = Connection::open_in_memory().unwrap();
        crate::migrations::run_migrations(&conn).unwrap();
        let e = edge("a", "b", RelationshipType::Requires);
        persist_edge(&conn, &e).unwrap();

        let manager = GraphManager::load_from(&conn).unwrap();
        assert!(manager.remove_edge("a", "b", RelationshipType::Requires));
        remove_persisted_edge(&conn, "a", "b", RelationshipType::Requires).unwrap();
        assert_eq!(load_all(&conn).unwrap().len(), 0);
    }

    #[test]
    fn distinct_edge_types_between_same_pair_coexist() {
        let graph = GraphManager::new();
        graph.add_edge(edge("a", "b", RelationshipType::Causal));
        graph.add_edge(edge("a", "b", RelationshipType::Supports));
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.edges_for("a").len(), 2);

        assert!(graph.remove_edge("a", "b", RelationshipType::Causal));
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.edges_for("a")[0].edge_type, RelationshipType::Supports);
    }

    #[test]
    fn query_edges_filters_by_type_and_min_strength() {
        let graph = GraphManager::new();
        let mut weak = edge("a", "b", RelationshipType::Related);
        weak.strength = 0.2;
        graph.add_edge(weak);
        graph.add_edge(edge("a", "c", RelationshipType::Causal));

        let causal_only = graph.query_edges("a", EdgeDirection::Outgoing, Some(RelationshipType::Causal), 0.0);
        assert_eq!(causal_only.len(), 1);
        assert_eq!(causal_only[0].to_id, "c");

        let strong_only = graph.query_edges("a", EdgeDirection::Outgoing, None, 0.5);
        assert_eq!(strong_only.len(), 1);
        assert_eq!(strong_only[0].to_id, "c");
    }

    #[test]
    fn stats_reports_counts_by_type_and_average_strength() {
        let graph = GraphManager::new();
        let mut e1 = edge("a", "b", RelationshipType::Causal);
        e1.strength = 0.4;
        let mut e2 = edge("b", "c", RelationshipType::Causal);
        e2.strength = 0.6;
        graph.add_edge(e1);
        graph.add_edge(e2);

        let stats = graph.stats();
        assert_eq!(stats.edge_count, 2);
        assert_eq!(stats.counts_by_type.get(&RelationshipType::Causal), Some(&2));
        assert!((stats.average_strength - 0.5).abs() < 1e-9);
    }

    #[test]
    fn degree_counts_incoming_and_outgoing() {
        let graph = GraphManager::new();
        graph.add_edge(edge("a", "b", RelationshipType::Causal));
        graph.add_edge(edge("c", "b", RelationshipType::Supports));
        let (incoming, outgoing) = graph.degree("b");
        assert_eq!(incoming, 2);
        assert_eq!(outgoing, 0);
    }
}
