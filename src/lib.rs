//! Fraudgraph - Graph-powered fraud investigation analysis
//!
//! A pure analysis library that turns an investigation snapshot (entities
//! and their relationships) into risk scores, detected behavioral
//! patterns, and network structure metrics.
//!
//! Three engines, composable or standalone:
//! - [`scoring::RiskScoringEngine`] computes a weighted 0-100 risk score
//!   from quantifiable indicators
//! - [`detectors::DetectorEngine`] runs a catalogue of pattern detectors
//!   in parallel and collects deduplicated, severity-sorted patterns
//! - [`graph::NetworkAnalyzer`] builds the relationship graph and computes
//!   centrality, communities, density, and path queries
//!
//! All engines are deterministic: the same snapshot and configuration
//! always produce the same output.
//!
//! # Example
//!
//! ```ignore
//! use fraudgraph::config::AnalysisConfig;
//! use fraudgraph::detectors::{default_detectors, DetectorEngineBuilder};
//! use fraudgraph::graph::NetworkAnalyzer;
//! use fraudgraph::scoring::RiskScoringEngine;
//!
//! let config = AnalysisConfig::default();
//!
//! let engine = DetectorEngineBuilder::new()
//!     .detectors(default_detectors(&config)?)
//!     .build();
//! let patterns = engine.run(&snapshot)?;
//!
//! let scorer = RiskScoringEngine::new(&config)?;
//! let score = scorer.score_with_patterns(&snapshot, &patterns);
//!
//! let network = NetworkAnalyzer::new(&config.graph)?.analyze(&snapshot);
//! ```

pub mod config;
pub mod detectors;
pub mod graph;
pub mod models;
pub mod scoring;

pub use config::AnalysisConfig;
pub use models::{
    Entity, EntityKind, EntityStatus, InvestigationSnapshot, Pattern, PatternSummary,
    Relationship, RelationshipKind, RiskLevel, RiskScore, Severity,
};
