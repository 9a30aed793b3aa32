//! End-to-end analysis tests
//!
//! Exercises the three engines together against synthetic investigations:
//! composite scoring, the detector catalogue, and network analysis, plus
//! the determinism and bounds guarantees of each.

use chrono::{TimeZone, Utc};
use fraudgraph::config::AnalysisConfig;
use fraudgraph::detectors::{default_detectors, DetectorEngineBuilder};
use fraudgraph::graph::{NetworkAnalyzer, NetworkGraph, PathMetric, PathOutcome};
use fraudgraph::scoring::RiskScoringEngine;
use fraudgraph::{
    Entity, EntityKind, EntityStatus, InvestigationSnapshot, Relationship, RelationshipKind,
    RiskLevel, Severity,
};

fn company(id: &str) -> Entity {
    Entity::new(id, EntityKind::Company)
}

fn snapshot(entities: Vec<Entity>, relationships: Vec<Relationship>) -> InvestigationSnapshot {
    InvestigationSnapshot {
        investigation_id: "test-investigation".to_string(),
        entities,
        relationships,
    }
}

/// Six low-capital companies registered at one address within days of
/// each other, plus a five-entity ownership cycle.
fn suspicious_snapshot() -> InvestigationSnapshot {
    let mut entities = Vec::new();
    for i in 1..=6 {
        let mut c = company(&format!("shell{i}"));
        c.address = Some("Rua Exemplo 100".to_string());
        c.size_metric = Some(1_000.0);
        c.created_at = Some(Utc.with_ymd_and_hms(2024, 3, 4 + i, 10, 0, 0).unwrap());
        c.status = EntityStatus::Active;
        entities.push(c);
    }
    for id in ["A", "B", "C", "D", "E"] {
        entities.push(company(id));
    }

    let cycle = vec![
        Relationship::new("A", "B", RelationshipKind::Owns),
        Relationship::new("B", "C", RelationshipKind::Owns),
        Relationship::new("C", "D", RelationshipKind::Owns),
        Relationship::new("D", "E", RelationshipKind::Owns),
        Relationship::new("E", "A", RelationshipKind::Owns),
    ];
    snapshot(entities, cycle)
}

#[test]
fn test_full_pipeline_on_suspicious_snapshot() {
    let config = AnalysisConfig::default();
    let snap = suspicious_snapshot();

    let engine = DetectorEngineBuilder::new()
        .detectors(default_detectors(&config).unwrap())
        .build();
    let patterns = engine.run(&snap).expect("detection should succeed");
    assert!(!patterns.is_empty());

    // Shell companies: one pattern covering all six
    let shell = patterns
        .iter()
        .find(|p| p.detector == "ShellCompanyDetector")
        .expect("shell pattern expected");
    assert_eq!(shell.entities.len(), 6);
    assert!(shell.severity >= Severity::High);
    for i in 1..=6 {
        assert!(shell.entities.contains(&format!("shell{i}")));
    }

    // Cycle: exactly one pattern naming all five entities
    let cycles: Vec<_> = patterns
        .iter()
        .filter(|p| p.detector == "CircularTransactionDetector")
        .collect();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].entities.len(), 5);
    for id in ["A", "B", "C", "D", "E"] {
        assert!(cycles[0].entities.contains(&id.to_string()));
    }

    // Scoring on top of the detected patterns
    let scorer = RiskScoringEngine::new(&config).expect("default config is valid");
    let score = scorer.score_with_patterns(&snap, &patterns);
    assert!(score.total_score >= 0.0 && score.total_score <= 100.0);
    assert!(score.confidence >= 0.0 && score.confidence <= 1.0);
    assert_eq!(score.risk_level, RiskLevel::from_score(score.total_score));
    assert!(!score.recommendations.is_empty());
    assert!(!score.detected_patterns.is_empty());
}

#[test]
fn test_indicator_contributions_are_consistent() {
    let config = AnalysisConfig::default();
    let scorer = RiskScoringEngine::new(&config).unwrap();
    let score = scorer.score(&suspicious_snapshot());

    for ind in &score.indicators {
        assert!(ind.normalized_value >= 0.0 && ind.normalized_value <= 100.0);
        assert!((ind.contribution - ind.normalized_value * ind.weight).abs() < 1e-9);
    }
    let total: f64 = score.indicators.iter().map(|i| i.contribution).sum();
    assert!((score.total_score - total.clamp(0.0, 100.0)).abs() < 1e-6);
}

#[test]
fn test_empty_snapshot_scores_zero() {
    let config = AnalysisConfig::default();
    let scorer = RiskScoringEngine::new(&config).unwrap();
    let score = scorer.score(&snapshot(vec![], vec![]));
    assert_eq!(score.total_score, 0.0);
    assert_eq!(score.risk_level, RiskLevel::VeryLow);
    assert_eq!(score.confidence, 0.0);
    assert!(!score.recommendations.is_empty());
}

#[test]
fn test_invalid_weights_rejected() {
    let mut config = AnalysisConfig::default();
    config.scoring.weights.judicial_issues = 0.9;
    assert!(RiskScoringEngine::new(&config).is_err());
}

#[test]
fn test_invalid_blend_rejected_before_analysis() {
    let mut config = AnalysisConfig::default();
    config.graph.betweenness_weight = 0.9;
    assert!(config.validate().is_err());
    assert!(NetworkAnalyzer::new(&config.graph).is_err());
}

#[test]
fn test_invalid_detector_threshold_rejected_before_detection() {
    let mut config = AnalysisConfig::default();
    config.detectors.inactive_ratio_threshold = 1.5;
    assert!(config.validate().is_err());
    assert!(default_detectors(&config).is_err());
}

#[test]
fn test_small_sample_caps_confidence() {
    let config = AnalysisConfig::default();
    let scorer = RiskScoringEngine::new(&config).unwrap();
    let score = scorer.score(&snapshot(vec![company("only"), company("two")], vec![]));
    assert!(score.confidence <= config.scoring.small_sample_confidence_cap);
}

#[test]
fn test_pattern_invariants_hold_across_catalogue() {
    let config = AnalysisConfig::default();
    let engine = DetectorEngineBuilder::new()
        .detectors(default_detectors(&config).unwrap())
        .build();
    let patterns = engine.run(&suspicious_snapshot()).unwrap();

    for p in &patterns {
        assert!(p.confidence >= 0.0 && p.confidence <= 1.0, "{}", p.detector);
        assert!(!p.entities.is_empty(), "{}", p.detector);
        assert!(!p.id.is_empty());
        let mut sorted = p.entities.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted, p.entities, "entities must be sorted and unique");
    }

    // Sorted by severity descending
    for pair in patterns.windows(2) {
        assert!(pair[0].severity >= pair[1].severity);
    }
}

#[test]
fn test_detection_is_deterministic() {
    let config = AnalysisConfig::default();
    let snap = suspicious_snapshot();
    let engine = DetectorEngineBuilder::new()
        .detectors(default_detectors(&config).unwrap())
        .build();

    let first = engine.run(&snap).unwrap();
    let second = engine.run(&snap).unwrap();
    let ids_a: Vec<&str> = first.iter().map(|p| p.id.as_str()).collect();
    let ids_b: Vec<&str> = second.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids_a, ids_b);
}

#[test]
fn test_network_analysis_bounds() {
    let config = AnalysisConfig::default();
    let analyzer = NetworkAnalyzer::new(&config.graph).unwrap();
    let result = analyzer.analyze(&suspicious_snapshot());

    assert!(result.density >= 0.0 && result.density <= 1.0);
    assert_eq!(result.node_count, 11);
    assert!(result.cluster_count >= 2); // the cycle plus isolated shells
    for c in &result.centrality {
        assert!(c.degree >= 0.0 && c.degree <= 1.0);
        assert!(c.betweenness >= 0.0 && c.betweenness <= 1.0);
    }
    let covered: usize = result.communities.iter().map(|c| c.entity_ids.len()).sum();
    assert_eq!(covered, result.node_count);
}

#[test]
fn test_tiny_graph_density_is_zero() {
    let config = AnalysisConfig::default();
    let analyzer = NetworkAnalyzer::new(&config.graph).unwrap();
    assert_eq!(analyzer.analyze(&snapshot(vec![], vec![])).density, 0.0);
    assert_eq!(
        analyzer.analyze(&snapshot(vec![company("a")], vec![])).density,
        0.0
    );
}

#[test]
fn test_path_queries() {
    let config = AnalysisConfig::default();
    let analyzer = NetworkAnalyzer::new(&config.graph).unwrap();
    let snap = snapshot(
        vec![company("a"), company("b"), company("c"), company("island")],
        vec![
            Relationship::new("a", "b", RelationshipKind::Owns),
            Relationship::new("b", "c", RelationshipKind::Leases),
        ],
    );
    let graph = NetworkGraph::build(&snap);

    // Symmetric regardless of edge direction
    let fwd = analyzer.shortest_path(&graph, "a", "c", PathMetric::Hops);
    let bwd = analyzer.shortest_path(&graph, "c", "a", PathMetric::Hops);
    match (&fwd, &bwd) {
        (
            PathOutcome::Found { cost: f, .. },
            PathOutcome::Found { cost: b, .. },
        ) => assert_eq!(f, b),
        other => panic!("expected paths both ways, got {other:?}"),
    }

    assert_eq!(
        analyzer.shortest_path(&graph, "a", "island", PathMetric::Hops),
        PathOutcome::NoPath
    );
    assert_eq!(
        analyzer.shortest_path(&graph, "nobody", "a", PathMetric::Hops),
        PathOutcome::NodeNotFound("nobody".to_string())
    );
}

#[test]
fn test_scoring_is_idempotent() {
    let config = AnalysisConfig::default();
    let scorer = RiskScoringEngine::new(&config).unwrap();
    let snap = suspicious_snapshot();
    let a = scorer.score(&snap);
    let b = scorer.score(&snap);
    assert_eq!(a.total_score, b.total_score);
    assert_eq!(a.confidence, b.confidence);
    assert_eq!(a.risk_level, b.risk_level);
}
