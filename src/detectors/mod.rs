//! Behavioral pattern detectors
//!
//! This module provides the detector framework and the built-in catalogue
//! for finding fraud-relevant behavioral patterns in an investigation
//! snapshot.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     DetectorEngine                          │
//! │  - Registers detectors                                      │
//! │  - Runs detectors in parallel (rayon)                       │
//! │  - Isolates failures and panics per detector                │
//! │  - Deduplicates and sorts the collected patterns            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Detector Trait                         │
//! │  - name(): Unique identifier                                │
//! │  - description(): Human-readable description                │
//! │  - scan(snapshot): Run detection, return patterns           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Detector catalogue
//!
//! - `ShellCompanyDetector` - low-capital companies batch-registered at a
//!   shared address
//! - `SuspiciousNetworkDetector` - inactive-heavy clusters and shared
//!   activity codes
//! - `CircularTransactionDetector` - directed transaction cycles (SCC)
//! - `AbnormalConcentrationDetector` - geographic clustering and size
//!   outliers
//! - `TemporalAnomalyDetector` - weekend creations and same-day batches
//!
//! Detectors are pure functions of the snapshot: no shared mutable state,
//! unspecified execution order, order-independent results. New detectors
//! implement `Detector` and register into the engine without touching its
//! core loop.
//!
//! # Usage
//!
//! ```ignore
//! use fraudgraph::config::AnalysisConfig;
//! use fraudgraph::detectors::{default_detectors, DetectorEngineBuilder};
//!
//! let config = AnalysisConfig::default();
//! let engine = DetectorEngineBuilder::new()
//!     .workers(4)
//!     .detectors(default_detectors(&config)?)
//!     .build();
//!
//! let patterns = engine.run(&snapshot)?;
//! ```

mod base;
mod engine;

mod abnormal_concentration;
mod circular_transaction;
mod shell_company;
mod suspicious_network;
mod temporal_anomaly;

pub use base::{DetectionSummary, Detector, DetectorResult, ProgressCallback};
pub use engine::{DetectorEngine, DetectorEngineBuilder};

pub use abnormal_concentration::AbnormalConcentrationDetector;
pub use circular_transaction::CircularTransactionDetector;
pub use shell_company::ShellCompanyDetector;
pub use suspicious_network::SuspiciousNetworkDetector;
pub use temporal_anomaly::TemporalAnomalyDetector;

use crate::config::{AnalysisConfig, ConfigError};
use std::sync::Arc;

/// The built-in detector catalogue, configured from `config.detectors`.
/// Fails fast on an invalid detector configuration, before any scan runs.
pub fn default_detectors(config: &AnalysisConfig) -> Result<Vec<Arc<dyn Detector>>, ConfigError> {
    let d = &config.detectors;
    d.validate()?;
    Ok(vec![
        Arc::new(ShellCompanyDetector::new(d)),
        Arc::new(SuspiciousNetworkDetector::new(d)),
        Arc::new(CircularTransactionDetector::new(d)),
        Arc::new(AbnormalConcentrationDetector::new(d)),
        Arc::new(TemporalAnomalyDetector::new(d)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalogue_is_complete() {
        let detectors = default_detectors(&AnalysisConfig::default()).unwrap();
        let names: Vec<&str> = detectors.iter().map(|d| d.name()).collect();
        assert_eq!(detectors.len(), 5);
        assert!(names.contains(&"ShellCompanyDetector"));
        assert!(names.contains(&"SuspiciousNetworkDetector"));
        assert!(names.contains(&"CircularTransactionDetector"));
        assert!(names.contains(&"AbnormalConcentrationDetector"));
        assert!(names.contains(&"TemporalAnomalyDetector"));
    }

    #[test]
    fn test_invalid_detector_config_rejected() {
        let mut config = AnalysisConfig::default();
        config.detectors.inactive_ratio_threshold = 1.5;
        assert!(default_detectors(&config).is_err());
    }
}
