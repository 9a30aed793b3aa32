//! Abnormal concentration indicator
//!
//! Two concentration rules:
//! - geographic: an unusual number of investigated entities registered in
//!   a single city
//! - size: statistical outliers by size/value metric inside a comparable
//!   same-kind group, using an IQR fence

use crate::config::DetectorConfig;
use crate::detectors::base::Detector;
use crate::models::{Entity, EntityKind, InvestigationSnapshot, Pattern, Severity};
use anyhow::Result;
use serde_json::json;
use std::collections::BTreeMap;

/// Detects geographic clustering and size outliers
pub struct AbnormalConcentrationDetector {
    geo_min: usize,
    iqr_k: f64,
    min_group: usize,
}

impl AbnormalConcentrationDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            geo_min: config.geo_concentration_min,
            iqr_k: config.size_outlier_iqr_k,
            min_group: config.size_outlier_min_group,
        }
    }

    fn geographic(&self, snapshot: &InvestigationSnapshot) -> Vec<Pattern> {
        let mut by_city: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for e in &snapshot.entities {
            if let Some(city) = e.city.as_deref() {
                by_city.entry(city).or_default().push(e.id.as_str());
            }
        }

        by_city
            .into_iter()
            .filter(|(_, ids)| ids.len() >= self.geo_min)
            .map(|(city, ids)| {
                let n = ids.len();
                let excess = n as f64 / self.geo_min as f64;
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
                    format!("{n} entities concentrated in {city}"),
                    format!(
                        "{n} investigated entities are registered in \"{city}\" \
                         (threshold {})",
                        self.geo_min
                    ),
                    ids.iter().map(|s| s.to_string()).collect(),
                )
                .with_evidence("city", json!(city))
                .with_evidence("entity_count", json!(n))
            })
            .collect()
    }

    /// IQR-fence outliers among entities of one kind. Groups smaller than
    /// the configured minimum are not statistically comparable and are
    /// skipped.
    fn size_outliers(&self, snapshot: &InvestigationSnapshot) -> Vec<Pattern> {
        let mut patterns = Vec::new();

        for kind in [EntityKind::Company, EntityKind::Property, EntityKind::Person] {
            let group: Vec<&Entity> = snapshot
                .entities_of_kind(kind)
                .filter(|e| matches!(e.size_metric, Some(v) if v.is_finite()))
                .collect();
            if group.len() < self.min_group {
                continue;
            }

            let mut values: Vec<f64> = group.iter().filter_map(|e| e.size_metric).collect();
            values.sort_by(|a, b| a.total_cmp(b));
            let q1 = percentile(&values, 0.25);
            let q3 = percentile(&values, 0.75);
            let iqr = q3 - q1;
            if iqr <= f64::EPSILON {
                continue; // degenerate distribution, every value identical
            }
            let upper = q3 + self.iqr_k * iqr;
            let lower = q1 - self.iqr_k * iqr;

            let outliers: Vec<&&Entity> = group
                .iter()
                .filter(|e| {
                    let v = e.size_metric.unwrap_or(0.0);
                    v > upper || v < lower
                })
                .collect();
            if outliers.is_empty() {
                continue;
            }

            // Confidence from how far the worst outlier sits beyond the fence
            let worst_excess = outliers
                .iter()
                .filter_map(|e| e.size_metric)
                .map(|v| {
                    if v > upper {
                        (v - upper) / iqr
                    } else {
                        (lower - v) / iqr
                    }
                })
                .fold(0.0_f64, f64::max);
            let confidence = (0.5 + 0.15 * worst_excess).clamp(0.5, 1.0);
            let severity = if worst_excess >= 3.0 {
                Severity::High
            } else {
                Severity::Medium
            };

            patterns.push(
                Pattern::new(
                    self.name(),
                    severity,
                    confidence,
                    format!("{} size outliers among {kind} entities", outliers.len()),
                    format!(
                        "{} of {} {kind} entities fall outside the IQR fence \
                         (k = {:.1}) for their size metric",
                        outliers.len(),
                        group.len(),
                        self.iqr_k
                    ),
                    outliers.iter().map(|e| e.id.clone()).collect(),
                )
                .with_evidence("entity_kind", json!(kind.to_string()))
                .with_evidence("group_size", json!(group.len()))
                .with_evidence("upper_fence", json!(upper))
                .with_evidence("lower_fence", json!(lower)),
            );
        }

        patterns
    }
}

impl Detector for AbnormalConcentrationDetector {
    fn name(&self) -> &'static str {
        "AbnormalConcentrationDetector"
    }

    fn description(&self) -> &'static str {
        "Detects geographic entity clustering and size-metric outliers"
    }

    fn category(&self) -> &'static str {
        "concentration"
    }

    fn scan(&self, snapshot: &InvestigationSnapshot) -> Result<Vec<Pattern>> {
        let mut patterns = self.geographic(snapshot);
        patterns.extend(self.size_outliers(snapshot));
        Ok(patterns)
    }
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
