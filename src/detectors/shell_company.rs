//! Shell-company indicator
//!
//! Flags groups of companies sharing one registered address where the
//! registered capital is below the low-capital threshold and the creation
//! dates fall within a short window of each other. The combination of
//! shared address, negligible capital and batch registration is the
//! classic fronting-entity footprint.

use crate::config::DetectorConfig;
use crate::detectors::base::Detector;
use crate::models::{Entity, EntityKind, InvestigationSnapshot, Pattern, Severity};
use anyhow::Result;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::debug;

/// Detects clusters of low-capital companies registered together at one address
pub struct ShellCompanyDetector {
    min_companies: usize,
    low_capital: f64,
    window_days: i64,
}

impl ShellCompanyDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            min_companies: config.shell_min_companies,
            low_capital: config.shell_low_capital,
            window_days: config.shell_window_days,
        }
    }

    /// Severity bands: crossing the group-size threshold is already High
    /// (fronting structures are inherently serious); 2x the threshold is
    /// Critical.
    fn severity(&self, group_size: usize) -> Severity {
        if group_size >= self.min_companies * 2 {
            Severity::Critical
        } else {
            Severity::High
        }
    }

    /// Confidence grows with how far the group exceeds the threshold,
    /// starting at 0.7 at the threshold and saturating at 1.0.
    fn confidence(&self, group_size: usize) -> f64 {
        let excess = group_size as f64 / self.min_companies as f64;
        (0.7 + 0.3 * (excess - 1.0)).clamp(0.7, 1.0)
    }

    /// A group qualifies when, after filtering to low-capital companies with
    /// known creation dates, it still clears the size threshold and the
    /// creation dates span at most the configured window.
    fn qualify<'a>(&self, companies: &[&'a Entity]) -> Option<Vec<&'a Entity>> {
        let qualified: Vec<&Entity> = companies
            .iter()
            .filter(|c| matches!(c.size_metric, Some(cap) if cap < self.low_capital))
            .filter(|c| c.created_at.is_some())
            .copied()
            .collect();

        if qualified.len() < self.min_companies {
            return None;
        }

        let mut dates: Vec<_> = qualified.iter().filter_map(|c| c.created_at).collect();
        dates.sort_unstable();
        let span = *dates.last()? - *dates.first()?;
        if span > chrono::Duration::days(self.window_days) {
            return None;
        }

        Some(qualified)
    }
}

impl Detector for ShellCompanyDetector {
    fn name(&self) -> &'static str {
        "ShellCompanyDetector"
    }

    fn description(&self) -> &'static str {
        "Detects groups of low-capital companies registered together at one address"
    }

    fn category(&self) -> &'static str {
        "shell_company"
    }

    fn scan(&self, snapshot: &InvestigationSnapshot) -> Result<Vec<Pattern>> {
        // BTreeMap keeps address iteration deterministic
        let mut by_address: BTreeMap<&str, Vec<&Entity>> = BTreeMap::new();
        for company in snapshot.entities_of_kind(EntityKind::Company) {
            if let Some(addr) = company.address.as_deref() {
                by_address.entry(addr).or_default().push(company);
            }
        }

        if by_address.is_empty() {
            debug!("no company addresses in snapshot, skipping");
            return Ok(vec![]);
        }

        let mut patterns = Vec::new();
        for (address, companies) in &by_address {
            let Some(group) = self.qualify(companies) else {
                continue;
            };

            let n = group.len();
            let entities: Vec<String> = group.iter().map(|c| c.id.clone()).collect();
            let max_capital = group
                .iter()
                .filter_map(|c| c.size_metric)
                .fold(0.0_f64, f64::max);

            let pattern = Pattern::new(
                self.name(),
                self.severity(n),
                self.confidence(n),
                format!("{n} low-capital companies at one address"),
                format!(
                    "{n} companies share the address \"{address}\", all with capital \
                     below {:.0} and created within {} days of each other",
                    self.low_capital, self.window_days
                ),
                entities,
            )
            .with_evidence("shared_address", json!(address))
            .with_evidence("company_count", json!(n))
            .with_evidence("max_capital", json!(max_capital))
            .with_evidence("window_days", json!(self.window_days));

            patterns.push(pattern);
        }

        Ok(patterns)
    }
}
