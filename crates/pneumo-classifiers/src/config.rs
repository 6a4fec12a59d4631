use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::metrics::AverageKind;

/// Central configuration for the ensemble classifier used by the trainers.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ModelConfig {
    #[serde(flatten)]
    pub model_type: ModelType,
}

/// Supported model types and their hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub enum ModelType {
    RandomForest {
        n_estimators: usize,
        /// `None` grows trees until leaves are pure.
        max_depth: Option<usize>,
        min_samples_split: usize,
        /// Features considered per split; `None` selects `floor(sqrt(n_features))`.
        max_features: Option<usize>,
    },
    GBDT {
        learning_rate: f32,
        max_depth: u32,
        num_boost_round: u32,
        debug: bool,
        training_optimization_level: u8,
        loss_type: String,
    },
}

impl Default for ModelType {
    fn default() -> Self {
        ModelType::RandomForest {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            max_features: None,
        }
    }
}

impl ModelType {
    /// Number of ensemble members (trees or boosting rounds).
    pub fn n_estimators(&self) -> usize {
        match self {
            ModelType::RandomForest { n_estimators, .. } => *n_estimators,
            ModelType::GBDT { num_boost_round, .. } => *num_boost_round as usize,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModelType::RandomForest { .. } => "random_forest",
            ModelType::GBDT { .. } => "gbdt",
        }
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "random_forest" | "random-forest" | "rf" => Ok(ModelType::default()),
            "gbdt" => Ok(ModelType::GBDT {
                learning_rate: 0.1,
                max_depth: 6,
                num_boost_round: 100,
                debug: false,
                training_optimization_level: 2,
                loss_type: "LogLikelyhood".to_string(),
            }),
            _ => Err(format!(
                "Unknown model type: {}. Expected one of: random_forest, gbdt",
                s
            )),
        }
    }
}

impl ModelConfig {
    pub fn new(model_type: ModelType) -> Self {
        Self { model_type }
    }

    /// Random forest with the given number of trees and default tree settings.
    pub fn random_forest(n_estimators: usize) -> Self {
        Self {
            model_type: ModelType::RandomForest {
                n_estimators,
                max_depth: None,
                min_samples_split: 2,
                max_features: None,
            },
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_type: ModelType::default(),
        }
    }
}

/// How a fractional per-cluster quota is turned into a row count.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuotaRounding {
    /// Truncate; clusters smaller than `1 / cluster_quota` contribute nothing.
    Floor,
    /// Round up; every non-empty cluster contributes at least one row.
    #[default]
    Ceil,
}

impl QuotaRounding {
    pub fn apply(&self, value: f64) -> usize {
        match self {
            QuotaRounding::Floor => value.floor() as usize,
            QuotaRounding::Ceil => value.ceil() as usize,
        }
    }
}

/// Parameters of one resampling pass.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ResamplingConfig {
    pub k_clusters: usize,
    /// Fraction of minority rows drawn into the uncertainty pool.
    pub sampling_fraction: f64,
    /// Desired minority:majority ratio of the oversampling input after synthesis.
    pub target_ratio: f64,
    /// Fraction of each cluster kept in the diverse minority set.
    pub cluster_quota: f64,
    pub quota_rounding: QuotaRounding,
    pub k_neighbors: usize,
    pub kmeans_max_iter: usize,
}

impl Default for ResamplingConfig {
    fn default() -> Self {
        Self {
            k_clusters: 4,
            sampling_fraction: 0.25,
            target_ratio: 0.25,
            cluster_quota: 0.20,
            quota_rounding: QuotaRounding::Ceil,
            k_neighbors: 5,
            kmeans_max_iter: 300,
        }
    }
}

/// Configuration of the iterative active-learning trainer.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ActiveSmoteConfig {
    pub model: ModelConfig,
    pub resampling: ResamplingConfig,
    pub n_rounds: usize,
    /// Relative growth of the target ratio applied before every round.
    pub ratio_growth_per_round: f64,
    pub seed: u64,
}

impl Default for ActiveSmoteConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            resampling: ResamplingConfig::default(),
            n_rounds: 5,
            ratio_growth_per_round: 0.0,
            seed: 42,
        }
    }
}

impl ActiveSmoteConfig {
    /// Target ratio used in the given (1-based) round.
    pub fn target_ratio_for_round(&self, round: usize) -> f64 {
        self.resampling.target_ratio * (1.0 + self.ratio_growth_per_round).powi(round as i32)
    }
}

/// Configuration of the one-shot SMOTE baseline.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BaselineConfig {
    pub model: ModelConfig,
    pub k_neighbors: usize,
    /// Snap categorical features during synthesis (plain SMOTE when false).
    pub respect_categorical: bool,
    pub seed: u64,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            k_neighbors: 5,
            respect_categorical: false,
            seed: 42,
        }
    }
}

/// What the evaluator does when a single trial fails.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    Abort,
    /// Record the failed trial and drop it from both paired series.
    SkipAndRecord,
}

/// Configuration of the paired comparison harness.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EvaluatorConfig {
    pub num_trials: usize,
    pub base_seed: u64,
    /// Averaging used for trainer A's precision/recall/F1 series.
    pub average_a: AverageKind,
    /// Averaging used for trainer B's precision/recall/F1 series.
    pub average_b: AverageKind,
    pub failure_policy: FailurePolicy,
    pub parallel: bool,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            num_trials: 10,
            base_seed: 42,
            average_a: AverageKind::Weighted,
            average_b: AverageKind::Weighted,
            failure_policy: FailurePolicy::Abort,
            parallel: false,
        }
    }
}
