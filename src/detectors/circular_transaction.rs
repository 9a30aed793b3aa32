//! Circular transaction detector using Tarjan's SCC algorithm
//!
//! Detects directed cycles A→B→…→A in the relationship graph restricted
//! to transactional edge kinds. Assets moving in a circle between the
//! same entities are a laundering and price-inflation footprint.
//!
//! # Algorithm
//!
//! Uses Tarjan's algorithm via petgraph, which runs in O(V+E) time:
//! 1. Collect entities touched by transactional relationships
//! 2. Build an edge list restricted to those relationship kinds
//! 3. Find all SCCs - each SCC with size > 1 is a transaction cycle
//!
//! This is much faster than pairwise path queries and reports each cycle
//! exactly once.

use crate::config::DetectorConfig;
use crate::detectors::base::Detector;
use crate::models::{InvestigationSnapshot, Pattern, RelationshipKind, Severity};
use anyhow::Result;
use petgraph::algo::tarjan_scc;
use petgraph::graph::DiGraph;
use rustc_hash::FxHashMap;
use serde_json::json;
use tracing::debug;

/// Detects directed transaction cycles between entities
pub struct CircularTransactionDetector {
    transactional_kinds: Vec<RelationshipKind>,
}

impl CircularTransactionDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            transactional_kinds: config.transactional_kinds.clone(),
        }
    }

    /// Severity bands by cycle length
    fn severity(cycle_length: usize) -> Severity {
        match cycle_length {
            n if n >= 10 => Severity::Critical,
            n if n >= 5 => Severity::High,
            n if n >= 3 => Severity::Medium,
            _ => Severity::Low,
        }
    }

    /// Longer cycles are harder to produce by accident; confidence grows
    /// with length and saturates at 1.0 for cycles of 6+.
    fn confidence(cycle_length: usize) -> f64 {
        (0.5 + 0.1 * (cycle_length as f64 - 2.0)).clamp(0.5, 1.0)
    }

    /// Find SCCs of size > 1 over the transactional subgraph.
    fn find_cycles(&self, snapshot: &InvestigationSnapshot) -> Vec<Vec<String>> {
        let mut graph: DiGraph<(), ()> = DiGraph::new();
        let mut indices: FxHashMap<&str, petgraph::graph::NodeIndex> = FxHashMap::default();
        let mut ids: Vec<&str> = Vec::new();

        for rel in &snapshot.relationships {
            if !self.transactional_kinds.contains(&rel.kind) {
                continue;
            }
            let src = *indices.entry(rel.source.as_str()).or_insert_with(|| {
                ids.push(rel.source.as_str());
                graph.add_node(())
            });
            let dst = *indices.entry(rel.target.as_str()).or_insert_with(|| {
                ids.push(rel.target.as_str());
                graph.add_node(())
            });
            graph.add_edge(src, dst, ());
        }

        let sccs = tarjan_scc(&graph);
        sccs.into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| {
                scc.into_iter()
                    .map(|idx| ids[idx.index()].to_string())
                    .collect()
            })
            .collect()
    }
}

impl Detector for CircularTransactionDetector {
    fn name(&self) -> &'static str {
        "CircularTransactionDetector"
    }

    fn description(&self) -> &'static str {
        "Detects directed transaction cycles between entities using SCC analysis"
    }

    fn category(&self) -> &'static str {
        "transaction"
    }

    fn scan(&self, snapshot: &InvestigationSnapshot) -> Result<Vec<Pattern>> {
        if snapshot.relationships.is_empty() {
            return Ok(vec![]);
        }

        let cycles = self.find_cycles(snapshot);
        debug!("found {} transaction cycles", cycles.len());

        let kinds: Vec<String> = self
            .transactional_kinds
            .iter()
            .map(|k| k.to_string())
            .collect();

        Ok(cycles
            .into_iter()
            .map(|cycle| {
                let len = cycle.len();
                let display: Vec<&str> = cycle.iter().take(5).map(String::as_str).collect();
                let mut chain = display.join(" -> ");
                if len > 5 {
                    chain.push_str(&format!(" ... ({len} entities total)"));
                }

                Pattern::new(
                    self.name(),
                    Self::severity(len),
                    Self::confidence(len),
                    format!("Transaction cycle involving {len} entities"),
                    format!("Assets move in a closed chain: {chain}"),
                    cycle,
                )
                .with_evidence("cycle_length", json!(len))
                .with_evidence("edge_kinds", json!(kinds))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Entity, EntityKind, Relationship};

    fn snapshot(relationships: Vec<Relationship>) -> InvestigationSnapshot {
        let mut ids: Vec<String> = relationships
            .iter()
            .flat_map(|r| [r.source.clone(), r.target.clone()])
            .collect();
        ids.sort_unstable();
        ids.dedup();
        InvestigationSnapshot {
            investigation_id: "inv".to_string(),
            entities: ids
                .into_iter()
                .map(|id| Entity::new(id, EntityKind::Company))
                .collect(),
            relationships,
        }
    }

    #[test]
    fn test_five_node_cycle_single_pattern() {
        let detector = CircularTransactionDetector::new(&DetectorConfig::default());
        let rels = vec![
            Relationship::new("A", "B", RelationshipKind::Owns),
            Relationship::new("B", "C", RelationshipKind::Owns),
            Relationship::new("C", "D", RelationshipKind::Owns),
            Relationship::new("D", "E", RelationshipKind::Owns),
            Relationship::new("E", "A", RelationshipKind::Owns),
        ];
        let patterns = detector.scan(&snapshot(rels)).unwrap();
        assert_eq!(patterns.len(), 1);
        let p = &patterns[0];
        assert_eq!(p.entities.len(), 5);
        for id in ["A", "B", "C", "D", "E"] {
            assert!(p.entities.contains(&id.to_string()));
        }
        assert_eq!(p.severity, Severity::High);
    }

    #[test]
    fn test_acyclic_chain_no_findings() {
        let detector = CircularTransactionDetector::new(&DetectorConfig::default());
        let rels = vec![
            Relationship::new("A", "B", RelationshipKind::Owns),
            Relationship::new("B", "C", RelationshipKind::Owns),
        ];
        assert!(detector.scan(&snapshot(rels)).unwrap().is_empty());
    }

    #[test]
    fn test_non_transactional_kinds_ignored() {
        let detector = CircularTransactionDetector::new(&DetectorConfig::default());
        // PartnerIn is mutual, not transactional: no cycle should be reported
        let rels = vec![
            Relationship::new("A", "B", RelationshipKind::PartnerIn),
            Relationship::new("B", "A", RelationshipKind::PartnerIn),
        ];
        assert!(detector.scan(&snapshot(rels)).unwrap().is_empty());
    }

    #[test]
    fn test_two_node_cycle_is_low_severity() {
        let detector = CircularTransactionDetector::new(&DetectorConfig::default());
        let rels = vec![
            Relationship::new("A", "B", RelationshipKind::Owns),
            Relationship::new("B", "A", RelationshipKind::Leases),
        ];
        let patterns = detector.scan(&snapshot(rels)).unwrap();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].severity, Severity::Low);
    }

    #[test]
    fn test_severity_bands() {
        assert_eq!(CircularTransactionDetector::severity(2), Severity::Low);
        assert_eq!(CircularTransactionDetector::severity(3), Severity::Medium);
        assert_eq!(CircularTransactionDetector::severity(5), Severity::High);
        assert_eq!(CircularTransactionDetector::severity(10), Severity::Critical);
    }
}
