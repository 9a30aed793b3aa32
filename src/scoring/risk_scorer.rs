//! Weighted risk scoring engine
//!
//! Computes a 0-100 composite score from seven weighted indicators over an
//! investigation snapshot. Each indicator reads a disjoint slice of the
//! snapshot, normalizes to [0,100] by its own documented rule, and the
//! total is the weight-sum, clamped. Indicators that cannot be computed
//! (missing inputs across the whole snapshot) are omitted and lower the
//! confidence instead of failing the run.

use crate::config::{AnalysisConfig, ConfigError, ScoringConfig};
use crate::models::{
    EntityKind, EntityStatus, InvestigationSnapshot, Pattern, RiskIndicator, RiskLevel, RiskScore,
};
use chrono::Utc;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info};

/// Names of the seven indicators, in fixed catalogue order
pub const INDICATOR_NAMES: [&str; 7] = [
    "property_concentration",
    "contract_value",
    "judicial_issues",
    "company_network",
    "temporal_pattern",
    "geographic_dispersion",
    "data_completeness",
];

/// Weighted risk scoring engine for one investigation snapshot
pub struct RiskScoringEngine {
    config: ScoringConfig,
}

impl RiskScoringEngine {
    /// Create an engine, failing fast on an invalid configuration.
    pub fn new(config: &AnalysisConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: config.scoring.clone(),
        })
    }

    /// Compute the composite risk score for a snapshot.
    pub fn score(&self, snapshot: &InvestigationSnapshot) -> RiskScore {
        self.score_with_patterns(snapshot, &[])
    }

    /// Compute the composite risk score, recording the names of patterns
    /// already detected by the pattern engine.
    pub fn score_with_patterns(
        &self,
        snapshot: &InvestigationSnapshot,
        patterns: &[Pattern],
    ) -> RiskScore {
        if snapshot.is_empty() {
            debug!(
                investigation = %snapshot.investigation_id,
                "empty snapshot, returning zero score"
            );
            return RiskScore {
                total_score: 0.0,
                risk_level: RiskLevel::VeryLow,
                confidence: 0.0,
                indicators: Vec::new(),
                detected_patterns: Vec::new(),
                recommendations: vec![
                    "Insufficient data: no entities tied to this investigation".to_string(),
                ],
                computed_at: Utc::now(),
            };
        }

        let weights = &self.config.weights;
        let raw: [Option<RiskIndicator>; 7] = [
            self.property_concentration(snapshot, weights.property_concentration),
            self.contract_value(snapshot, weights.contract_value),
            self.judicial_issues(snapshot, weights.judicial_issues),
            self.company_network(snapshot, weights.company_network),
            self.temporal_pattern(snapshot, weights.temporal_pattern),
            self.geographic_dispersion(snapshot, weights.geographic_dispersion),
            self.data_completeness(snapshot, weights.data_completeness),
        ];

        let computable = raw.iter().flatten().count();
        let indicators: Vec<RiskIndicator> = raw.into_iter().flatten().collect();

        let total_score: f64 = indicators
            .iter()
            .map(|i| i.contribution)
            .sum::<f64>()
            .clamp(0.0, 100.0);
        let risk_level = RiskLevel::from_score(total_score);

        let mut confidence = computable as f64 / INDICATOR_NAMES.len() as f64;
        if snapshot.entities.len() < self.config.min_sample_size {
            confidence = confidence.min(self.config.small_sample_confidence_cap);
        }

        let mut detected_patterns: Vec<String> =
            patterns.iter().map(|p| p.detector.clone()).collect();
        detected_patterns.sort_unstable();
        detected_patterns.dedup();

        let recommendations = self.recommendations(&indicators, risk_level);

        info!(
            investigation = %snapshot.investigation_id,
            score = total_score,
            level = %risk_level,
            confidence,
            "risk score computed"
        );

        RiskScore {
            total_score,
            risk_level,
            confidence,
            indicators,
            detected_patterns,
            recommendations,
            computed_at: Utc::now(),
        }
    }

    fn indicator(name: &str, raw_value: f64, normalized: f64, weight: f64) -> RiskIndicator {
        let normalized_value = normalized.clamp(0.0, 100.0);
        RiskIndicator {
            name: name.to_string(),
            raw_value,
            normalized_value,
            weight,
            contribution: normalized_value * weight,
        }
    }

    /// Maximum number of properties held by one owner, saturating at the
    /// configured ceiling.
    fn property_concentration(
        &self,
        snapshot: &InvestigationSnapshot,
        weight: f64,
    ) -> Option<RiskIndicator> {
        let property_ids: FxHashSet<&str> = snapshot
            .entities_of_kind(EntityKind::Property)
            .map(|e| e.id.as_str())
            .collect();
        if property_ids.is_empty() {
            return None;
        }

        // Distinct properties per owner: parallel edges to the same parcel
        // (multigraph) must not inflate the count
        let mut held: FxHashMap<&str, FxHashSet<&str>> = FxHashMap::default();
        for rel in &snapshot.relationships {
            if property_ids.contains(rel.target.as_str()) {
                held.entry(rel.source.as_str())
                    .or_default()
                    .insert(rel.target.as_str());
            }
        }
        let max_held = held.values().map(FxHashSet::len).max().unwrap_or(0);
        let normalized = saturate(max_held as f64, self.config.property_ceiling as f64);
        Some(Self::indicator(
            "property_concentration",
            max_held as f64,
            normalized,
            weight,
        ))
    }

    /// Outlier-aware contract value indicator: how far the largest recorded
    /// relationship value sits above the IQR upper fence of all values.
    fn contract_value(
        &self,
        snapshot: &InvestigationSnapshot,
        weight: f64,
    ) -> Option<RiskIndicator> {
        let mut values: Vec<f64> = snapshot
            .relationships
            .iter()
            .filter_map(|r| r.value)
            .filter(|v| v.is_finite() && *v >= 0.0)
            .collect();
        if values.is_empty() {
            return None;
        }
        values.sort_by(|a, b| a.total_cmp(b));

        let max = *values.last().unwrap_or(&0.0);
        if values.len() < 4 {
            // Too few values for a fence; mild signal proportional to count
            let normalized = 10.0 * values.len() as f64;
            return Some(Self::indicator("contract_value", max, normalized, weight));
        }

        let q1 = percentile(&values, 0.25);
        let q3 = percentile(&values, 0.75);
        let iqr = (q3 - q1).max(f64::EPSILON);
        let fence = q3 + self.config.outlier_iqr_k * iqr;

        // At the fence the indicator reads 50; each additional fence-width
        // above it adds 25, saturating at 100.
        let normalized = if max <= fence {
            50.0 * (max / fence.max(f64::EPSILON)).clamp(0.0, 1.0)
        } else {
            50.0 + 25.0 * ((max - fence) / iqr)
        };
        Some(Self::indicator("contract_value", max, normalized, weight))
    }

    /// Total recorded judicial proceedings, saturating ceiling.
    fn judicial_issues(
        &self,
        snapshot: &InvestigationSnapshot,
        weight: f64,
    ) -> Option<RiskIndicator> {
        let mut any = false;
        let mut total: u64 = 0;
        for e in &snapshot.entities {
            if let Some(n) = e.judicial_issues {
                any = true;
                total += u64::from(n);
            }
        }
        if !any {
            return None;
        }
        let normalized = saturate(total as f64, f64::from(self.config.judicial_ceiling));
        Some(Self::indicator(
            "judicial_issues",
            total as f64,
            normalized,
            weight,
        ))
    }

    /// Blend of company count saturation and the inactive-company ratio.
    fn company_network(
        &self,
        snapshot: &InvestigationSnapshot,
        weight: f64,
    ) -> Option<RiskIndicator> {
        let companies: Vec<_> = snapshot.entities_of_kind(EntityKind::Company).collect();
        if companies.is_empty() {
            return None;
        }
        let count = companies.len();
        let inactive = companies
            .iter()
            .filter(|c| c.status == EntityStatus::Inactive)
            .count();
        let size_part = saturate(count as f64, self.config.company_ceiling as f64);
        let inactive_ratio = inactive as f64 / count as f64;
        let normalized = 0.6 * size_part + 0.4 * (inactive_ratio * 100.0);
        Some(Self::indicator(
            "company_network",
            count as f64,
            normalized,
            weight,
        ))
    }

    /// Densest count of company creations inside one sliding window.
    fn temporal_pattern(
        &self,
        snapshot: &InvestigationSnapshot,
        weight: f64,
    ) -> Option<RiskIndicator> {
        let mut dates: Vec<_> = snapshot
            .entities_of_kind(EntityKind::Company)
            .filter_map(|e| e.created_at)
            .collect();
        if dates.is_empty() {
            return None;
        }
        dates.sort_unstable();

        let window = chrono::Duration::days(self.config.temporal_window_days);
        let mut densest = 1usize;
        let mut lo = 0usize;
        for hi in 0..dates.len() {
            while dates[hi] - dates[lo] > window {
                lo += 1;
            }
            densest = densest.max(hi - lo + 1);
        }

        let normalized = saturate(densest as f64, self.config.temporal_ceiling as f64);
        Some(Self::indicator(
            "temporal_pattern",
            densest as f64,
            normalized,
            weight,
        ))
    }

    /// Distinct states touched by the investigation, saturating ceiling.
    fn geographic_dispersion(
        &self,
        snapshot: &InvestigationSnapshot,
        weight: f64,
    ) -> Option<RiskIndicator> {
        let states: FxHashSet<&str> = snapshot
            .entities
            .iter()
            .filter_map(|e| e.state.as_deref())
            .collect();
        if states.is_empty() {
            return None;
        }
        let normalized = saturate(states.len() as f64, self.config.state_ceiling as f64);
        Some(Self::indicator(
            "geographic_dispersion",
            states.len() as f64,
            normalized,
            weight,
        ))
    }

    /// Share of missing key fields across all entities, mapped so that more
    /// missing data reads as higher risk. Always computable.
    fn data_completeness(
        &self,
        snapshot: &InvestigationSnapshot,
        weight: f64,
    ) -> Option<RiskIndicator> {
        let mut present = 0usize;
        let mut total = 0usize;
        for e in &snapshot.entities {
            let fields = [
                e.created_at.is_some(),
                e.state.is_some(),
                e.city.is_some(),
                e.size_metric.is_some(),
                e.status != EntityStatus::Unknown,
            ];
            total += fields.len();
            present += fields.iter().filter(|p| **p).count();
        }
        if total == 0 {
            return None;
        }
        let missing_ratio = 1.0 - present as f64 / total as f64;
        Some(Self::indicator(
            "data_completeness",
            missing_ratio,
            missing_ratio * 100.0,
            weight,
        ))
    }

    /// Deterministic recommendations from high-reading indicators plus one
    /// level-wide recommendation. No randomness, no external calls.
    fn recommendations(&self, indicators: &[RiskIndicator], level: RiskLevel) -> Vec<String> {
        let mut out = Vec::new();

        match level {
            RiskLevel::Critical => {
                out.push("Escalate to a senior investigator immediately".to_string());
                out.push("Request registry documents for every involved entity".to_string());
            }
            RiskLevel::High => {
                out.push("Prioritize this investigation for manual review".to_string());
            }
            RiskLevel::Medium => {
                out.push("Schedule a standard review of the flagged indicators".to_string());
            }
            RiskLevel::Low | RiskLevel::VeryLow => {
                out.push("No immediate action required; periodic review sufficient".to_string());
            }
        }

        for ind in indicators {
            if ind.normalized_value < self.config.high_risk_threshold {
                continue;
            }
            let text = match ind.name.as_str() {
                "property_concentration" => {
                    "Verify chain of title for properties concentrated under one owner"
                }
                "contract_value" => "Audit outlier contract values against market references",
                "judicial_issues" => "Cross-check judicial proceedings with court registries",
                "company_network" => "Map beneficial ownership across the company network",
                "temporal_pattern" => "Review companies created in rapid succession",
                "geographic_dispersion" => {
                    "Check for registration shopping across multiple states"
                }
                "data_completeness" => "Request missing registry data before concluding",
                _ => continue,
            };
            out.push(text.to_string());
        }

        out
    }
}

/// Count-based saturation: linear up to the ceiling, then pinned at 100.
fn saturate(value: f64, ceiling: f64) -> f64 {
    if ceiling <= 0.0 {
        return 0.0;
    }
    (value / ceiling * 100.0).clamp(0.0, 100.0)
}

/// Linear-interpolated percentile over a sorted slice.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Entity, Relationship, RelationshipKind};
    use chrono::TimeZone;

    fn company(id: &str) -> Entity {
        Entity::new(id, EntityKind::Company)
    }

    fn snapshot_with(entities: Vec<Entity>, relationships: Vec<Relationship>) -> InvestigationSnapshot {
        InvestigationSnapshot {
            investigation_id: "inv-1".to_string(),
            entities,
            relationships,
        }
    }

    #[test]
    fn test_empty_snapshot_scores_zero() {
        let engine = RiskScoringEngine::new(&AnalysisConfig::default()).unwrap();
        let score = engine.score(&snapshot_with(vec![], vec![]));
        assert_eq!(score.total_score, 0.0);
        assert_eq!(score.risk_level, RiskLevel::VeryLow);
        assert_eq!(score.confidence, 0.0);
        assert!(score.indicators.is_empty());
    }

    #[test]
    fn test_score_bounds_and_level_consistency() {
        let engine = RiskScoringEngine::new(&AnalysisConfig::default()).unwrap();
        let mut entities = Vec::new();
        for i in 0..30 {
            let mut c = company(&format!("c{i}"));
            c.judicial_issues = Some(5);
            c.status = EntityStatus::Inactive;
            c.created_at = Some(chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
            entities.push(c);
        }
        let score = engine.score(&snapshot_with(entities, vec![]));
        assert!((0.0..=100.0).contains(&score.total_score));
        assert!((0.0..=1.0).contains(&score.confidence));
        assert_eq!(score.risk_level, RiskLevel::from_score(score.total_score));
    }

    #[test]
    fn test_small_sample_caps_confidence() {
        let engine = RiskScoringEngine::new(&AnalysisConfig::default()).unwrap();
        let mut c = company("c1");
        c.judicial_issues = Some(1);
        let score = engine.score(&snapshot_with(vec![c], vec![]));
        assert!(score.confidence <= 0.3);
    }

    #[test]
    fn test_weight_sum_invariant_on_emitted_indicators() {
        let engine = RiskScoringEngine::new(&AnalysisConfig::default()).unwrap();
        let mut c = company("c1");
        c.judicial_issues = Some(3);
        c.state = Some("SP".to_string());
        c.created_at = Some(chrono::Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        let score = engine.score(&snapshot_with(
            vec![c, company("c2"), company("c3")],
            vec![Relationship::new("c1", "c2", RelationshipKind::Owns).with_value(100.0)],
        ));
        for ind in &score.indicators {
            assert!((0.0..=100.0).contains(&ind.normalized_value), "{ind:?}");
            assert!((0.0..=1.0).contains(&ind.weight));
            assert!((ind.contribution - ind.normalized_value * ind.weight).abs() < 1e-9);
        }
    }

    #[test]
    fn test_property_concentration_counts_distinct_parcels() {
        let engine = RiskScoringEngine::new(&AnalysisConfig::default()).unwrap();
        let entities = vec![
            Entity::new("owner", EntityKind::Person),
            Entity::new("p1", EntityKind::Property),
            Entity::new("p2", EntityKind::Property),
        ];
        // Two recorded relationships to the same parcel count once
        let relationships = vec![
            Relationship::new("owner", "p1", RelationshipKind::Owns),
            Relationship::new("owner", "p1", RelationshipKind::Leases),
            Relationship::new("owner", "p2", RelationshipKind::Owns),
        ];
        let score = engine.score(&snapshot_with(entities, relationships));
        let indicator = score
            .indicators
            .iter()
            .find(|i| i.name == "property_concentration")
            .unwrap();
        assert_eq!(indicator.raw_value, 2.0);
    }

    #[test]
    fn test_temporal_indicator_counts_window() {
        let engine = RiskScoringEngine::new(&AnalysisConfig::default()).unwrap();
        let mut entities = Vec::new();
        for day in 1..=6 {
            let mut c = company(&format!("c{day}"));
            c.created_at = Some(chrono::Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap());
            entities.push(c);
        }
        let score = engine.score(&snapshot_with(entities, vec![]));
        let temporal = score
            .indicators
            .iter()
            .find(|i| i.name == "temporal_pattern")
            .unwrap();
        assert_eq!(temporal.raw_value, 6.0);
    }

    #[test]
    fn test_idempotent() {
        let engine = RiskScoringEngine::new(&AnalysisConfig::default()).unwrap();
        let mut c = company("c1");
        c.judicial_issues = Some(3);
        let snap = snapshot_with(vec![c], vec![]);
        let a = engine.score(&snap);
        let b = engine.score(&snap);
        assert_eq!(a.total_score, b.total_score);
        assert_eq!(a.recommendations, b.recommendations);
        assert_eq!(a.indicators.len(), b.indicators.len());
    }

    #[test]
    fn test_percentile() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&v, 0.0), 1.0);
        assert_eq!(percentile(&v, 1.0), 4.0);
        assert!((percentile(&v, 0.5) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_saturate() {
        assert_eq!(saturate(5.0, 10.0), 50.0);
        assert_eq!(saturate(20.0, 10.0), 100.0);
        assert_eq!(saturate(1.0, 0.0), 0.0);
    }
}
