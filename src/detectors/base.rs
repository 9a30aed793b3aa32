//! Base detector trait and types
//!
//! This module defines the core abstractions for pattern detection:
//! - `Detector` trait that all detectors must implement
//! - `DetectorResult` for capturing execution results
//! - `DetectionSummary` aggregate statistics

use crate::models::{InvestigationSnapshot, Pattern, Severity};
use anyhow::Result;
use std::collections::HashMap;

/// Result from running a single detector
#[derive(Debug, Clone)]
pub struct DetectorResult {
    /// Name of the detector that produced these results
    pub detector_name: String,
    /// Patterns produced by the detector
    pub patterns: Vec<Pattern>,
    /// Execution time in milliseconds
    pub duration_ms: u64,
    /// Whether the detector completed successfully
    pub success: bool,
    /// Error message if the detector failed
    pub error: Option<String>,
}

impl DetectorResult {
    /// Create a successful result
    pub fn success(detector_name: String, patterns: Vec<Pattern>, duration_ms: u64) -> Self {
        Self {
            detector_name,
            patterns,
            duration_ms,
            success: true,
            error: None,
        }
    }

    /// Create a failed result
    pub fn failure(detector_name: String, error: String, duration_ms: u64) -> Self {
        Self {
            detector_name,
            patterns: Vec::new(),
            duration_ms,
            success: false,
            error: Some(error),
        }
    }
}

/// Trait for all pattern detectors
///
/// Detectors scan the investigation snapshot for fraud-relevant behavioral
/// patterns like:
/// - Shell-company clusters (shared address, low capital, rapid creation)
/// - Suspicious networks (inactive clusters, shared activity codes)
/// - Circular transaction chains
/// - Abnormal geographic or size concentration
/// - Temporal anomalies (weekend or batch registrations)
///
/// Every detector is a pure function of the snapshot: no shared mutable
/// state, no I/O, and no dependence on sibling detectors. Execution order
/// is unspecified and results must be order-independent.
///
/// # Example Implementation
///
/// ```ignore
/// pub struct MyDetector;
///
/// impl Detector for MyDetector {
///     fn name(&self) -> &'static str {
///         "MyDetector"
///     }
///
///     fn description(&self) -> &'static str {
///         "Detects my specific behavioral pattern"
///     }
///
///     fn scan(&self, snapshot: &InvestigationSnapshot) -> Result<Vec<Pattern>> {
///         Ok(vec![])
///     }
/// }
/// ```
pub trait Detector: Send + Sync {
    /// Unique identifier for this detector
    fn name(&self) -> &'static str;

    /// Human-readable description of what this detector finds
    fn description(&self) -> &'static str;

    /// Run detection over the snapshot and return findings
    ///
    /// A detector that cannot evaluate (a required field is missing across
    /// the whole snapshot) returns `Ok(vec![])` rather than an error; a
    /// returned error is logged by the engine and never aborts siblings.
    fn scan(&self, snapshot: &InvestigationSnapshot) -> Result<Vec<Pattern>>;

    /// Category of patterns this detector finds
    ///
    /// Used for grouping and filtering findings in reports.
    fn category(&self) -> &'static str {
        "behavioral"
    }
}

/// Progress callback for detector execution
pub type ProgressCallback = Box<dyn Fn(&str, usize, usize) + Send + Sync>;

/// Summary statistics from running all detectors
#[derive(Debug, Clone, Default)]
pub struct DetectionSummary {
    /// Total number of detectors run
    pub detectors_run: usize,
    /// Number of detectors that succeeded
    pub detectors_succeeded: usize,
    /// Number of detectors that failed
    pub detectors_failed: usize,
    /// Total patterns across all detectors
    pub total_patterns: usize,
    /// Patterns by severity
    pub by_severity: HashMap<Severity, usize>,
    /// Total execution time in milliseconds
    pub total_duration_ms: u64,
}

impl DetectionSummary {
    /// Update summary with a detector result
    pub fn add_result(&mut self, result: &DetectorResult) {
        self.detectors_run += 1;
        self.total_duration_ms += result.duration_ms;

        if result.success {
            self.detectors_succeeded += 1;
            self.total_patterns += result.patterns.len();

            for pattern in &result.patterns {
                *self.by_severity.entry(pattern.severity).or_insert(0) += 1;
            }
        } else {
            self.detectors_failed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detector_result_success() {
        let result = DetectorResult::success("TestDetector".to_string(), vec![], 100);
        assert!(result.success);
        assert!(result.error.is_none());
        assert_eq!(result.duration_ms, 100);
    }

    #[test]
    fn test_detector_result_failure() {
        let result = DetectorResult::failure("TestDetector".to_string(), "oops".to_string(), 50);
        assert!(!result.success);
        assert_eq!(result.error, Some("oops".to_string()));
    }

    #[test]
    fn test_detection_summary() {
        let mut summary = DetectionSummary::default();

        let result1 = DetectorResult::success("D1".to_string(), vec![], 100);
        let result2 = DetectorResult::failure("D2".to_string(), "err".to_string(), 50);

        summary.add_result(&result1);
        summary.add_result(&result2);

        assert_eq!(summary.detectors_run, 2);
        assert_eq!(summary.detectors_succeeded, 1);
        assert_eq!(summary.detectors_failed, 1);
        assert_eq!(summary.total_duration_ms, 150);
    }
}
