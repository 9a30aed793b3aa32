//! Core data models for fraudgraph
//!
//! These models are used throughout the crate for representing
//! investigation snapshots, detected patterns, and scoring results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Generate a deterministic pattern ID based on content hash.
///
/// This ensures patterns have stable IDs across runs, enabling:
/// - Tracking findings over time (resolved vs new vs recurring)
/// - Suppression by ID in caller-side config
/// - Reliable deduplication by (detector, entity set)
///
/// The ID is a 16-character hex string derived from hashing the detector
/// name and the sorted set of involved entity identifiers. MD5 is used for
/// stable cross-version hashing; `DefaultHasher` is intentionally not
/// stable across Rust releases.
pub fn deterministic_pattern_id(detector: &str, entities: &[String]) -> String {
    let mut sorted: Vec<&str> = entities.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let input = format!("{detector}\n{}", sorted.join("\n"));
    let digest = md5::compute(input.as_bytes());
    format!("{:x}", digest)[..16].to_string()
}

/// Kind tag for an entity under investigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Company,
    Property,
    Person,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Company => write!(f, "company"),
            EntityKind::Property => write!(f, "property"),
            EntityKind::Person => write!(f, "person"),
        }
    }
}

/// Registration status of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    Active,
    Inactive,
    #[default]
    Unknown,
}

/// An entity tied to an investigation.
///
/// Immutable snapshot record supplied by the caller; the engines only
/// read it. Optional fields are genuinely optional in source registries,
/// and indicators that need them degrade instead of failing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub kind: EntityKind,
    #[serde(default)]
    pub name: Option<String>,
    /// Creation / registration timestamp
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    /// Registered address, used for shared-address clustering
    #[serde(default)]
    pub address: Option<String>,
    /// Declared activity code (companies)
    #[serde(default)]
    pub activity_code: Option<String>,
    /// Size/value metric: registered capital for companies, area for
    /// properties, declared assets for persons
    #[serde(default)]
    pub size_metric: Option<f64>,
    /// Count of recorded judicial proceedings involving this entity
    #[serde(default)]
    pub judicial_issues: Option<u32>,
    #[serde(default)]
    pub status: EntityStatus,
}

impl Entity {
    /// Minimal entity with just an identifier and kind; everything else unset.
    pub fn new(id: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            id: id.into(),
            kind,
            name: None,
            created_at: None,
            state: None,
            city: None,
            address: None,
            activity_code: None,
            size_metric: None,
            judicial_issues: None,
            status: EntityStatus::Unknown,
        }
    }
}

/// Kind tag for a recorded relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    Owns,
    Leases,
    PartnerIn,
}

impl std::fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelationshipKind::Owns => write!(f, "owns"),
            RelationshipKind::Leases => write!(f, "leases"),
            RelationshipKind::PartnerIn => write!(f, "partner_in"),
        }
    }
}

/// A directed relationship between two entity identifiers.
///
/// Multiple relationships between the same pair are allowed (multigraph).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub source: String,
    pub target: String,
    pub kind: RelationshipKind,
    /// Contract or transaction value, when recorded
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
}

impl Relationship {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        kind: RelationshipKind,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
            value: None,
            started_at: None,
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }
}

/// Read-only snapshot of everything tied to one investigation.
///
/// Supplied by the external data-access collaborator; the engines never
/// query storage directly and never mutate the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestigationSnapshot {
    pub investigation_id: String,
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
}

impl InvestigationSnapshot {
    pub fn new(investigation_id: impl Into<String>) -> Self {
        Self {
            investigation_id: investigation_id.into(),
            entities: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities of one kind
    pub fn entities_of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(move |e| e.kind == kind)
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }
}

/// Severity levels for detected patterns
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// A suspicious behavioral pattern detected in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Pattern {
    /// Deterministic ID from (detector, sorted entity set)
    #[serde(default)]
    pub id: String,
    /// Name of the detector that produced this pattern
    #[serde(default)]
    pub detector: String,
    #[serde(default)]
    pub severity: Severity,
    /// Confidence in [0,1], scaled by how far the observed metric
    /// exceeded its threshold
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Involved entity identifiers, sorted for determinism
    #[serde(default)]
    pub entities: Vec<String>,
    /// Detector-specific key/value facts backing the finding
    #[serde(default)]
    pub evidence: BTreeMap<String, serde_json::Value>,
}

impl Pattern {
    /// Build a pattern with a deterministic ID, sorted entity set and
    /// clamped confidence.
    pub fn new(
        detector: &str,
        severity: Severity,
        confidence: f64,
        title: impl Into<String>,
        description: impl Into<String>,
        mut entities: Vec<String>,
    ) -> Self {
        entities.sort_unstable();
        entities.dedup();
        Self {
            id: deterministic_pattern_id(detector, &entities),
            detector: detector.to_string(),
            severity,
            confidence: confidence.clamp(0.0, 1.0),
            title: title.into(),
            description: description.into(),
            entities,
            evidence: BTreeMap::new(),
        }
    }

    pub fn with_evidence(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.evidence.insert(key.into(), value);
        self
    }
}

/// Summary of patterns by severity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternSummary {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub total: usize,
}

impl PatternSummary {
    pub fn from_patterns(patterns: &[Pattern]) -> Self {
        let mut summary = Self::default();
        for p in patterns {
            match p.severity {
                Severity::Critical => summary.critical += 1,
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low => summary.low += 1,
            }
            summary.total += 1;
        }
        summary
    }
}

/// Composite risk level derived from the total score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    VeryLow,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Map a 0-100 score to its level band (inclusive lower bound).
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 80.0 => RiskLevel::Critical,
            s if s >= 60.0 => RiskLevel::High,
            s if s >= 40.0 => RiskLevel::Medium,
            s if s >= 20.0 => RiskLevel::Low,
            _ => RiskLevel::VeryLow,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::VeryLow => write!(f, "very_low"),
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
            RiskLevel::Critical => write!(f, "critical"),
        }
    }
}

/// One weighted sub-score contributing to the composite risk score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskIndicator {
    pub name: String,
    /// Observed metric before normalization
    pub raw_value: f64,
    /// Normalized to [0,100]
    pub normalized_value: f64,
    /// Weight in [0,1]; all weights in one run sum to 1.0
    pub weight: f64,
    /// normalized_value * weight
    pub contribution: f64,
}

/// Composite risk score for one investigation.
///
/// Created fresh per invocation; never persisted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskScore {
    /// Weighted total in [0,100]
    pub total_score: f64,
    pub risk_level: RiskLevel,
    /// Fraction of indicators computable from non-missing inputs, in [0,1]
    pub confidence: f64,
    /// Indicators in fixed catalogue order
    pub indicators: Vec<RiskIndicator>,
    /// Names of patterns detected by the pattern engine, if supplied
    pub detected_patterns: Vec<String>,
    /// Deterministic narrative recommendations
    pub recommendations: Vec<String>,
    pub computed_at: DateTime<Utc>,
}
