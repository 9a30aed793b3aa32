//! Weighted risk scoring
//!
//! Turns an investigation snapshot into one composite 0-100 risk score
//! built from seven weighted indicators, with a confidence value that
//! reflects how much of the snapshot was actually computable.
//!
//! # Scoring formula
//!
//! ```text
//! total_score = Σ (normalized_indicator × weight)   clamped to [0,100]
//!
//! Where the seven indicator weights are validated to sum to 1.0:
//!   property_concentration 0.15   contract_value 0.20
//!   judicial_issues 0.25          company_network 0.15
//!   temporal_pattern 0.10         geographic_dispersion 0.10
//!   data_completeness 0.05
//! ```
//!
//! Confidence is the fraction of indicators computable from non-missing
//! inputs, capped low when the snapshot is below the minimum sample size.

pub mod risk_scorer;

pub use risk_scorer::{RiskScoringEngine, INDICATOR_NAMES};
