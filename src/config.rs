//! Analysis configuration
//!
//! All weights, thresholds and size guards used by the three engines live
//! in one explicit, validated structure passed in at engine construction.
//! Nothing here is module-level mutable state: callers that need
//! investigation-type-specific policies (agricultural vs urban norms)
//! clone the defaults and override fields per investigation.
//!
//! Validation happens once, in `AnalysisConfig::validate()`, and engine
//! constructors fail fast on an invalid configuration before any
//! computation starts.

use crate::models::RelationshipKind;
use serde::Deserialize;
use thiserror::Error;

/// Tolerance for the weight-sum invariant
const WEIGHT_SUM_EPSILON: f64 = 1e-6;

/// Configuration errors: caller programming errors, rejected before any
/// score is computed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("indicator weights must sum to 1.0, got {sum}")]
    WeightSum { sum: f64 },

    #[error("centrality blend weights must sum to 1.0, got {sum}")]
    BlendSum { sum: f64 },

    #[error("{name} must be within {min}..={max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{name} must be at least {min}, got {value}")]
    TooSmall {
        name: &'static str,
        value: usize,
        min: usize,
    },
}

/// Weights for the seven risk indicators. Must sum to 1.0.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndicatorWeights {
    pub property_concentration: f64,
    pub contract_value: f64,
    pub judicial_issues: f64,
    pub company_network: f64,
    pub temporal_pattern: f64,
    pub geographic_dispersion: f64,
    pub data_completeness: f64,
}

impl Default for IndicatorWeights {
    fn default() -> Self {
        Self {
            property_concentration: 0.15,
            contract_value: 0.20,
            judicial_issues: 0.25,
            company_network: 0.15,
            temporal_pattern: 0.10,
            geographic_dispersion: 0.10,
            data_completeness: 0.05,
        }
    }
}

impl IndicatorWeights {
    pub fn sum(&self) -> f64 {
        self.property_concentration
            + self.contract_value
            + self.judicial_issues
            + self.company_network
            + self.temporal_pattern
            + self.geographic_dispersion
            + self.data_completeness
    }
}

/// Saturation ceilings and bands for the risk scorer
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: IndicatorWeights,
    /// Properties held by one owner that saturate the concentration
    /// indicator at 100
    pub property_ceiling: usize,
    /// Judicial issue count that saturates the indicator at 100
    pub judicial_ceiling: u32,
    /// Company count that saturates the network indicator at 100
    pub company_ceiling: usize,
    /// Sliding window for rapid-creation sequences, in days
    pub temporal_window_days: i64,
    /// Creations inside one window that saturate the indicator at 100
    pub temporal_ceiling: usize,
    /// Distinct states that saturate the dispersion indicator at 100
    pub state_ceiling: usize,
    /// IQR fence multiplier for value-based outlier normalization
    pub outlier_iqr_k: f64,
    /// Normalized value at which an indicator triggers a recommendation
    pub high_risk_threshold: f64,
    /// Below this many entities, confidence is capped
    pub min_sample_size: usize,
    /// Confidence ceiling applied under the minimum sample size
    pub small_sample_confidence_cap: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: IndicatorWeights::default(),
            property_ceiling: 10,
            judicial_ceiling: 20,
            company_ceiling: 20,
            temporal_window_days: 30,
            temporal_ceiling: 10,
            state_ceiling: 8,
            outlier_iqr_k: 1.5,
            high_risk_threshold: 70.0,
            min_sample_size: 3,
            small_sample_confidence_cap: 0.3,
        }
    }
}

/// Thresholds for the heuristic detectors
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Minimum companies at one address for a shell-company group
    pub shell_min_companies: usize,
    /// Capital below this marks a company as low-capital
    pub shell_low_capital: f64,
    /// Maximum spread of creation dates inside a shell group, in days
    pub shell_window_days: i64,
    /// Inactive-company ratio above this flags a suspicious network
    pub inactive_ratio_threshold: f64,
    /// Minimum companies before the inactive ratio is meaningful
    pub inactive_min_companies: usize,
    /// Entities sharing one activity code to flag a possible cartel
    pub shared_activity_min: usize,
    /// Relationship kinds considered transactional for cycle detection
    pub transactional_kinds: Vec<RelationshipKind>,
    /// Entities in one city to flag geographic concentration
    pub geo_concentration_min: usize,
    /// IQR fence multiplier for size-outlier detection
    pub size_outlier_iqr_k: f64,
    /// Minimum comparable group size for size-outlier detection
    pub size_outlier_min_group: usize,
    /// Entities created on the same calendar day to flag a batch
    pub same_day_min: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            shell_min_companies: 5,
            shell_low_capital: 10_000.0,
            shell_window_days: 30,
            inactive_ratio_threshold: 0.4,
            inactive_min_companies: 3,
            shared_activity_min: 5,
            transactional_kinds: vec![RelationshipKind::Owns, RelationshipKind::Leases],
            geo_concentration_min: 15,
            size_outlier_iqr_k: 1.5,
            size_outlier_min_group: 5,
            same_day_min: 5,
        }
    }
}

/// Size guards and knobs for the network analyzer
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Above this node count, exact betweenness is skipped and the result
    /// is flagged approximate. Brandes is O(V*E); this guard keeps a single
    /// large investigation from starving the host process.
    pub max_betweenness_nodes: usize,
    /// Weight of degree centrality in the blended score
    pub degree_weight: f64,
    /// Weight of betweenness centrality in the blended score
    pub betweenness_weight: f64,
    /// How many top-ranked nodes to report as key players
    pub key_player_count: usize,
    /// Degree must exceed mean + hub_sigma * stddev to flag a hub
    pub hub_sigma: f64,
    /// Absolute degree floor for hub flagging
    pub hub_min_degree: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_betweenness_nodes: 2_000,
            degree_weight: 0.5,
            betweenness_weight: 0.5,
            key_player_count: 10,
            hub_sigma: 2.0,
            hub_min_degree: 5,
        }
    }
}

/// Top-level configuration for all three engines
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub scoring: ScoringConfig,
    pub detectors: DetectorConfig,
    pub graph: GraphConfig,
}

impl ScoringConfig {
    /// Validate the scoring section. Called by the scoring engine
    /// constructor before any computation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sum = self.weights.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(ConfigError::WeightSum { sum });
        }
        check_range(
            "scoring.high_risk_threshold",
            self.high_risk_threshold,
            0.0,
            100.0,
        )?;
        check_range(
            "scoring.small_sample_confidence_cap",
            self.small_sample_confidence_cap,
            0.0,
            1.0,
        )?;
        check_range("scoring.outlier_iqr_k", self.outlier_iqr_k, 0.0, f64::MAX)?;
        Ok(())
    }
}

impl DetectorConfig {
    /// Validate the detector section. Called when the catalogue is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(
            "detectors.inactive_ratio_threshold",
            self.inactive_ratio_threshold,
            0.0,
            1.0,
        )?;
        check_range(
            "detectors.size_outlier_iqr_k",
            self.size_outlier_iqr_k,
            0.0,
            f64::MAX,
        )?;
        if self.shell_min_companies < 2 {
            return Err(ConfigError::TooSmall {
                name: "detectors.shell_min_companies",
                value: self.shell_min_companies,
                min: 2,
            });
        }
        Ok(())
    }
}

impl GraphConfig {
    /// Validate the graph section. Called by the network analyzer
    /// constructor before any computation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let blend = self.degree_weight + self.betweenness_weight;
        if (blend - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(ConfigError::BlendSum { sum: blend });
        }
        if self.key_player_count == 0 {
            return Err(ConfigError::TooSmall {
                name: "graph.key_player_count",
                value: 0,
                min: 1,
            });
        }
        Ok(())
    }
}

impl AnalysisConfig {
    /// Validate every section at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scoring.validate()?;
        self.detectors.validate()?;
        self.graph.validate()?;
        Ok(())
    }
}

fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < min || value > max {
        return Err(ConfigError::OutOfRange {
            name,
            value,
            min,
            max,
        });
    }
    Ok(())
}
