//! Temporal anomaly indicator
//!
//! Registries process filings on business days; entities whose recorded
//! creation falls on a weekend usually indicate backdated or fabricated
//! records. Batches of entities created on the exact same calendar day
//! indicate coordinated registration.

use crate::config::DetectorConfig;
use crate::detectors::base::Detector;
use crate::models::{InvestigationSnapshot, Pattern, Severity};
use anyhow::Result;
use chrono::{Datelike, NaiveDate, Weekday};
use serde_json::json;
use std::collections::BTreeMap;

/// Detects weekend creations and same-day registration batches
pub struct TemporalAnomalyDetector {
    same_day_min: usize,
}

impl TemporalAnomalyDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            same_day_min: config.same_day_min,
        }
    }

    fn weekend_creations(&self, snapshot: &InvestigationSnapshot) -> Option<Pattern> {
        let mut dated = 0usize;
        let mut weekend: Vec<&str> = Vec::new();
        for e in &snapshot.entities {
            let Some(ts) = e.created_at else { continue };
            dated += 1;
            if matches!(ts.weekday(), Weekday::Sat | Weekday::Sun) {
                weekend.push(e.id.as_str());
            }
        }
        if weekend.is_empty() {
            return None;
        }

        let ratio = weekend.len() as f64 / dated as f64;
        let severity = if ratio >= 0.5 && weekend.len() >= 5 {
            Severity::High
        } else if weekend.len() >= 3 {
            Severity::Medium
        } else {
            Severity::Low
        };

        Some(
            Pattern::new(
                self.name(),
                severity,
                (0.4 + 0.6 * ratio).clamp(0.4, 1.0),
                format!("{} entities created on weekends", weekend.len()),
                format!(
                    "{} of {} dated entities were created on a Saturday or Sunday, \
                     when registries do not process filings",
                    weekend.len(),
                    dated
                ),
                weekend.iter().map(|s| s.to_string()).collect(),
            )
            .with_evidence("weekend_count", json!(weekend.len()))
            .with_evidence("dated_count", json!(dated)),
        )
    }

    fn same_day_batches(&self, snapshot: &InvestigationSnapshot) -> Vec<Pattern> {
        let mut by_day: BTreeMap<NaiveDate, Vec<&str>> = BTreeMap::new();
        for e in &snapshot.entities {
            if let Some(ts) = e.created_at {
                by_day.entry(ts.date_naive()).or_default().push(e.id.as_str());
            }
        }

        by_day
            .into_iter()
            .filter(|(_, ids)| ids.len() >= self.same_day_min)
            .map(|(day, ids)| {
                let n = ids.len();
                let excess = n as f64 / self.same_day_min as f64;
                let severity = if excess >= 2.0 {
                    Severity::Critical
                } else if excess >= 1.5 {
                    Severity::High
                } else {
                    Severity::Medium
                };
                Pattern::new(
                    self.name(),
                    severity,
                    (0.5 + 0.25 * (excess - 1.0)).clamp(0.5, 1.0),
                    format!("{n} entities created on {day}"),
                    format!(
                        "{n} entities were created on the exact same calendar day \
                         ({day}), suggesting a coordinated registration batch"
                    ),
                    ids.iter().map(|s| s.to_string()).collect(),
                )
                .with_evidence("date", json!(day.to_string()))
                .with_evidence("entity_count", json!(n))
            })
            .collect()
    }
}

impl Detector for TemporalAnomalyDetector {
    fn name(&self) -> &'static str {
        "TemporalAnomalyDetector"
    }

    fn description(&self) -> &'static str {
        "Detects weekend creations and same-day registration batches"
    }

    fn category(&self) -> &'static str {
        "temporal"
    }

    fn scan(&self, snapshot: &InvestigationSnapshot) -> Result<Vec<Pattern>> {
        let mut patterns = self.same_day_batches(snapshot);
        if let Some(p) = self.weekend_creations(snapshot) {
            patterns.push(p);
        }
        Ok(patterns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Entity, EntityKind};
    use chrono::{TimeZone, Utc};

    fn dated_entity(id: &str, y: i32, m: u32, d: u32) -> Entity {
        let mut e = Entity::new(id, EntityKind::Company);
        e.created_at = Some(Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap());
        e
    }

    fn snapshot(entities: Vec<Entity>) -> InvestigationSnapshot {
        InvestigationSnapshot {
            investigation_id: "inv".to_string(),
            entities,
            relationships: vec![],
        }
    }

    #[test]
    fn test_weekend_creation_flagged() {
        let detector = TemporalAnomalyDetector::new(&DetectorConfig::default());
        // 2024-06-01 is a Saturday
        let entities = vec![
            dated_entity("sat", 2024, 6, 1),
            dated_entity("mon", 2024, 6, 3),
        ];
        let patterns = detector.scan(&snapshot(entities)).unwrap();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].entities, vec!["sat".to_string()]);
    }

    #[test]
    fn test_same_day_batch_flagged() {
        let detector = TemporalAnomalyDetector::new(&DetectorConfig::default());
        // 2024-06-04 is a Tuesday, so only the batch rule fires
        let entities: Vec<Entity> = (1..=5)
            .map(|i| dated_entity(&format!("e{i}"), 2024, 6, 4))
            .collect();
        let patterns = detector.scan(&snapshot(entities)).unwrap();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].entities.len(), 5);
        assert_eq!(patterns[0].severity, Severity::Medium);
    }

    #[test]
    fn test_double_batch_is_critical() {
        let detector = TemporalAnomalyDetector::new(&DetectorConfig::default());
        let entities: Vec<Entity> = (1..=10)
            .map(|i| dated_entity(&format!("e{i}"), 2024, 6, 4))
            .collect();
        let patterns = detector.scan(&snapshot(entities)).unwrap();
        assert_eq!(patterns[0].severity, Severity::Critical);
    }

    #[test]
    fn test_undated_snapshot_silently_empty() {
        let detector = TemporalAnomalyDetector::new(&DetectorConfig::default());
        let entities = vec![
            Entity::new("a", EntityKind::Company),
            Entity::new("b", EntityKind::Person),
        ];
        assert!(detector.scan(&snapshot(entities)).unwrap().is_empty());
    }

    #[test]
    fn test_weekday_spread_not_flagged() {
        let detector = TemporalAnomalyDetector::new(&DetectorConfig::default());
        let entities = vec![
            dated_entity("a", 2024, 6, 3),
            dated_entity("b", 2024, 6, 4),
            dated_entity("c", 2024, 6, 5),
        ];
        assert!(detector.scan(&snapshot(entities)).unwrap().is_empty());
    }
}
