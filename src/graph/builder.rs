//! Relationship graph builder
//!
//! Converts an investigation snapshot into a typed directed multigraph:
//! every entity becomes a node tagged by kind (isolated entities
//! included, they affect density and component counts), and every
//! relationship becomes a directed edge tagged by kind with an optional
//! declared weight. Built fresh per analysis; no cross-call caching.

use crate::models::{EntityKind, InvestigationSnapshot, RelationshipKind};
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use tracing::warn;

/// A node in the relationship graph
#[derive(Debug, Clone, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub kind: EntityKind,
}

/// An edge in the relationship graph
#[derive(Debug, Clone, Serialize)]
pub struct GraphEdge {
    pub kind: RelationshipKind,
    /// Declared edge weight (contract value), defaults to 1.0
    pub weight: f64,
}

/// Serializable graph payload for visualization
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphPayload {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<PayloadEdge>,
}

/// One edge in the visualization payload, by entity identifier
#[derive(Debug, Clone, Serialize)]
pub struct PayloadEdge {
    pub source: String,
    pub target: String,
    pub kind: RelationshipKind,
    pub weight: f64,
}

/// Typed directed multigraph over the entities of one investigation
pub struct NetworkGraph {
    graph: DiGraph<GraphNode, GraphEdge>,
    indices: FxHashMap<String, NodeIndex>,
}

impl NetworkGraph {
    /// Build the graph from a snapshot.
    ///
    /// Relationships naming an entity absent from the snapshot are skipped
    /// with a warning; they reference data outside the investigation and
    /// must not invent nodes.
    pub fn build(snapshot: &InvestigationSnapshot) -> Self {
        let mut graph = DiGraph::with_capacity(
            snapshot.entities.len(),
            snapshot.relationships.len(),
        );
        let mut indices = FxHashMap::default();

        for entity in &snapshot.entities {
            let idx = graph.add_node(GraphNode {
                id: entity.id.clone(),
                kind: entity.kind,
            });
            indices.insert(entity.id.clone(), idx);
        }

        for rel in &snapshot.relationships {
            let (Some(&src), Some(&dst)) = (indices.get(&rel.source), indices.get(&rel.target))
            else {
                warn!(
                    source = %rel.source,
                    target = %rel.target,
                    "relationship references an entity outside the snapshot, skipping"
                );
                continue;
            };
            graph.add_edge(
                src,
                dst,
                GraphEdge {
                    kind: rel.kind,
                    weight: rel.value.filter(|v| v.is_finite() && *v > 0.0).unwrap_or(1.0),
                },
            );
        }

        Self { graph, indices }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Node index for an entity identifier
    pub fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.indices.get(id).copied()
    }

    /// Entity identifier for a node index
    pub fn node_id(&self, idx: NodeIndex) -> &str {
        &self.graph[idx].id
    }

    /// The underlying petgraph graph
    pub fn inner(&self) -> &DiGraph<GraphNode, GraphEdge> {
        &self.graph
    }

    /// Count of distinct ordered (source, target) pairs with at least one
    /// edge, self-loops excluded. This is the edge count used for density
    /// so that parallel edges cannot push it past 1.
    pub fn distinct_pair_count(&self) -> usize {
        let mut pairs: FxHashSet<(NodeIndex, NodeIndex)> = FxHashSet::default();
        for edge in self.graph.edge_indices() {
            if let Some((a, b)) = self.graph.edge_endpoints(edge) {
                if a != b {
                    pairs.insert((a, b));
                }
            }
        }
        pairs.len()
    }

    /// Undirected projection as an adjacency list: parallel and
    /// anti-parallel edges collapse into one neighbor entry with the
    /// accumulated weight. Self-loops are dropped. Used by the analysis
    /// algorithms (betweenness, communities, path queries).
    pub(crate) fn undirected_adjacency(&self) -> Vec<Vec<(usize, f64)>> {
        let n = self.graph.node_count();
        let mut weights: Vec<FxHashMap<usize, f64>> = vec![FxHashMap::default(); n];

        for edge in self.graph.edge_indices() {
            let Some((a, b)) = self.graph.edge_endpoints(edge) else {
                continue;
            };
            if a == b {
                continue;
            }
            let w = self.graph[edge].weight;
            *weights[a.index()].entry(b.index()).or_insert(0.0) += w;
            *weights[b.index()].entry(a.index()).or_insert(0.0) += w;
        }

        weights
            .into_iter()
            .map(|m| {
                let mut neighbors: Vec<(usize, f64)> = m.into_iter().collect();
                neighbors.sort_unstable_by_key(|(i, _)| *i); // deterministic order
                neighbors
            })
            .collect()
    }

    /// Serializable payload for visualization
    pub fn to_payload(&self) -> GraphPayload {
        let nodes = self
            .graph
            .node_indices()
            .map(|i| self.graph[i].clone())
            .collect();
        let edges = self
            .graph
            .edge_indices()
            .filter_map(|e| {
                let (a, b) = self.graph.edge_endpoints(e)?;
                Some(PayloadEdge {
                    source: self.graph[a].id.clone(),
                    target: self.graph[b].id.clone(),
                    kind: self.graph[e].kind,
                    weight: self.graph[e].weight,
                })
            })
            .collect();
        GraphPayload { nodes, edges }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Entity, Relationship};

    fn snapshot() -> InvestigationSnapshot {
        InvestigationSnapshot {
            investigation_id: "inv".to_string(),
            entities: vec![
                Entity::new("a", EntityKind::Person),
                Entity::new("b", EntityKind::Company),
                Entity::new("c", EntityKind::Property),
                Entity::new("isolated", EntityKind::Person),
            ],
            relationships: vec![
                Relationship::new("a", "b", RelationshipKind::PartnerIn),
                Relationship::new("b", "c", RelationshipKind::Owns).with_value(50_000.0),
                // duplicate pair: multigraph
                Relationship::new("b", "c", RelationshipKind::Leases),
            ],
        }
    }

    #[test]
    fn test_build_includes_isolated_nodes() {
        let graph = NetworkGraph::build(&snapshot());
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 3);
        assert!(graph.node_index("isolated").is_some());
    }

    #[test]
    fn test_distinct_pairs_collapse_parallel_edges() {
        let graph = NetworkGraph::build(&snapshot());
        assert_eq!(graph.distinct_pair_count(), 2);
    }

    #[test]
    fn test_unknown_entity_edge_skipped() {
        let mut snap = snapshot();
        snap.relationships
            .push(Relationship::new("a", "ghost", RelationshipKind::Owns));
        let graph = NetworkGraph::build(&snap);
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn test_undirected_adjacency_accumulates_weights() {
        let graph = NetworkGraph::build(&snapshot());
        let adj = graph.undirected_adjacency();
        let b = graph.node_index("b").unwrap().index();
        let c = graph.node_index("c").unwrap().index();
        let w = adj[b].iter().find(|(i, _)| *i == c).map(|(_, w)| *w).unwrap();
        assert!((w - 50_001.0).abs() < 1e-9);
        // symmetric
        let w_back = adj[c].iter().find(|(i, _)| *i == b).map(|(_, w)| *w).unwrap();
        assert_eq!(w, w_back);
    }

    #[test]
    fn test_payload_roundtrip_shape() {
        let graph = NetworkGraph::build(&snapshot());
        let payload = graph.to_payload();
        assert_eq!(payload.nodes.len(), 4);
        assert_eq!(payload.edges.len(), 3);
    }
}
