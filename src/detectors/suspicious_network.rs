//! Suspicious network indicator
//!
//! Two rules over the company population:
//! - a high ratio of inactive companies (front networks are abandoned in
//!   bulk once they have served their purpose)
//! - many entities declaring the same activity code, a possible cartel or
//!   coordinated registration footprint

use crate::config::DetectorConfig;
use crate::detectors::base::Detector;
use crate::models::{EntityKind, EntityStatus, InvestigationSnapshot, Pattern, Severity};
use anyhow::Result;
use serde_json::json;
use std::collections::BTreeMap;

/// Detects inactive-heavy company clusters and shared-activity groups
pub struct SuspiciousNetworkDetector {
    inactive_ratio_threshold: f64,
    inactive_min_companies: usize,
    shared_activity_min: usize,
}

impl SuspiciousNetworkDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            inactive_ratio_threshold: config.inactive_ratio_threshold,
            inactive_min_companies: config.inactive_min_companies,
            shared_activity_min: config.shared_activity_min,
        }
    }

    fn inactive_cluster(&self, snapshot: &InvestigationSnapshot) -> Option<Pattern> {
        let companies: Vec<_> = snapshot.entities_of_kind(EntityKind::Company).collect();
        if companies.len() < self.inactive_min_companies {
            return None;
        }

        let inactive: Vec<&str> = companies
            .iter()
            .filter(|c| c.status == EntityStatus::Inactive)
            .map(|c| c.id.as_str())
            .collect();
        let ratio = inactive.len() as f64 / companies.len() as f64;
        if ratio <= self.inactive_ratio_threshold {
            return None;
        }

        // Confidence scales with the excess over the threshold; a fully
        // inactive network reads 1.0.
        let headroom = 1.0 - self.inactive_ratio_threshold;
        let confidence = 0.6 + 0.4 * ((ratio - self.inactive_ratio_threshold) / headroom);

        let severity = if ratio >= self.inactive_ratio_threshold * 2.0 || ratio >= 0.8 {
            Severity::Critical
        } else if ratio >= 0.6 {
            Severity::High
        } else {
            Severity::Medium
        };

        Some(
            Pattern::new(
                self.name(),
                severity,
                confidence,
                format!("{:.0}% of companies are inactive", ratio * 100.0),
                format!(
                    "{} of {} companies in the network are inactive (threshold {:.0}%)",
                    inactive.len(),
                    companies.len(),
                    self.inactive_ratio_threshold * 100.0
                ),
                inactive.iter().map(|s| s.to_string()).collect(),
            )
            .with_evidence("inactive_count", json!(inactive.len()))
            .with_evidence("company_count", json!(companies.len()))
            .with_evidence("inactive_ratio", json!(ratio)),
        )
    }

    fn shared_activity_groups(&self, snapshot: &InvestigationSnapshot) -> Vec<Pattern> {
        let mut by_code: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for e in &snapshot.entities {
            if let Some(code) = e.activity_code.as_deref() {
                by_code.entry(code).or_default().push(e.id.as_str());
            }
        }

        by_code
            .into_iter()
            .filter(|(_, ids)| ids.len() >= self.shared_activity_min)
            .map(|(code, ids)| {
                let n = ids.len();
                let excess = n as f64 / self.shared_activity_min as f64;
                let severity = if excess >= 2.0 {
                    Severity::High
                } else {
                    Severity::Medium
                };
                Pattern::new(
                    self.name(),
                    severity,
                    (0.5 + 0.25 * (excess - 1.0)).clamp(0.5, 1.0),
                    format!("{n} entities share activity code {code}"),
                    format!(
                        "{n} entities declare the same activity code \"{code}\", \
                         a possible cartel or coordinated registration"
                    ),
                    ids.iter().map(|s| s.to_string()).collect(),
                )
                .with_evidence("activity_code", json!(code))
                .with_evidence("entity_count", json!(n))
            })
            .collect()
    }
}

impl Detector for SuspiciousNetworkDetector {
    fn name(&self) -> &'static str {
        "SuspiciousNetworkDetector"
    }

    fn description(&self) -> &'static str {
        "Detects inactive-heavy company clusters and shared-activity-code groups"
    }

    fn category(&self) -> &'static str {
        "network"
    }

    fn scan(&self, snapshot: &InvestigationSnapshot) -> Result<Vec<Pattern>> {
        let mut patterns = self.shared_activity_groups(snapshot);
        if let Some(p) = self.inactive_cluster(snapshot) {
            patterns.push(p);
        }
        Ok(patterns)
    }
}
