//! Trainers: the iterative active-learning SMOTE trainer and the one-shot
//! SMOTE baseline it is compared against.
//!
//! Both record one `RoundMetrics` per fitted-and-evaluated model (the
//! baseline records a single round) and summarise a run as the mean over
//! its rounds.
pub mod active;
pub mod baseline;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::data_handling::{ClassBalance, LabeledDataset};
use crate::error::Result;
use crate::metrics::{classification_report, AverageKind, ClassMetrics, ClassificationReport};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::factory::build_model;

pub use active::{ActiveSmoteTrainer, TrainerPhase};
pub use baseline::SmoteBaselineTrainer;

/// A training procedure that can be reset and re-run with a seed.
pub trait Trainer: Send {
    fn name(&self) -> &str;

    /// Drop every resampled row, fitted model and recorded round.
    fn reset(&mut self);

    /// Run to completion from a reset state.
    ///
    /// The same seed and inputs always yield the same history.
    fn train(&mut self, seed: u64) -> Result<TrainingSummary>;

    fn history(&self) -> &TrainingHistory;

    /// The most recently fitted classifier.
    fn classifier(&self) -> Option<Arc<dyn ClassifierModel>>;
}

/// Metrics recorded after one fit on the (grown) training set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundMetrics {
    /// 1-based round index
    pub round: usize,
    pub accuracy: f64,
    pub minority: ClassMetrics,
    pub majority: ClassMetrics,
    pub weighted_avg: ClassMetrics,
    pub macro_avg: ClassMetrics,
    /// Rows the classifier was fitted on
    pub grown_size: usize,
    pub minority_count: usize,
    pub synthetic_rows: usize,
}

impl RoundMetrics {
    pub fn from_report(
        round: usize,
        report: &ClassificationReport,
        balance: &ClassBalance,
        fitted_on: &LabeledDataset,
        synthetic_rows: usize,
    ) -> Self {
        RoundMetrics {
            round,
            accuracy: report.accuracy,
            minority: report.class(balance.minority),
            majority: report.class(balance.majority),
            weighted_avg: report.weighted_avg,
            macro_avg: report.macro_avg,
            grown_size: fitted_on.nrows(),
            minority_count: fitted_on.count_label(balance.minority),
            synthetic_rows,
        }
    }

    pub fn average(&self, kind: AverageKind) -> ClassMetrics {
        match kind {
            AverageKind::Macro => self.macro_avg,
            AverageKind::Weighted => self.weighted_avg,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AveragedMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

/// Mean of every recorded round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub rounds: usize,
    pub overall_accuracy: f64,
    pub overall_weighted_avg: AveragedMetrics,
    pub overall_macro_avg: AveragedMetrics,
}

impl TrainingSummary {
    pub fn average(&self, kind: AverageKind) -> AveragedMetrics {
        match kind {
            AverageKind::Macro => self.overall_macro_avg,
            AverageKind::Weighted => self.overall_weighted_avg,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    rounds: Vec<RoundMetrics>,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, metrics: RoundMetrics) {
        self.rounds.push(metrics);
    }

    pub fn clear(&mut self) {
        self.rounds.clear();
    }

    pub fn rounds(&self) -> &[RoundMetrics] {
        &self.rounds
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    pub fn last(&self) -> Option<&RoundMetrics> {
        self.rounds.last()
    }

    pub fn accuracy(&self) -> Vec<f64> {
        self.rounds.iter().map(|r| r.accuracy).collect()
    }

    /// Mean-of-rounds summary; `None` before any round was recorded.
    pub fn summary(&self) -> Option<TrainingSummary> {
        if self.rounds.is_empty() {
            return None;
        }
        let n = self.rounds.len() as f64;
        let mean_of = |kind: AverageKind| AveragedMetrics {
            precision: self.rounds.iter().map(|r| r.average(kind).precision).sum::<f64>() / n,
            recall: self.rounds.iter().map(|r| r.average(kind).recall).sum::<f64>() / n,
            f1_score: self.rounds.iter().map(|r| r.average(kind).f1_score).sum::<f64>() / n,
        };
        Some(TrainingSummary {
            rounds: self.rounds.len(),
            overall_accuracy: self.rounds.iter().map(|r| r.accuracy).sum::<f64>() / n,
            overall_weighted_avg: mean_of(AverageKind::Weighted),
            overall_macro_avg: mean_of(AverageKind::Macro),
        })
    }
}

/// Fit a fresh model on `train` and score it on `test`.
pub(crate) fn fit_and_evaluate(
    model_config: &ModelConfig,
    seed: u64,
    train: &LabeledDataset,
    test: &LabeledDataset,
) -> Result<(Arc<dyn ClassifierModel>, ClassificationReport)> {
    let mut model = build_model(model_config, seed);
    log::debug!("Fitting {} on {} rows", model.name(), train.nrows());
    model.fit(&train.x, &train.y)?;

    let y_pred = model.predict(&test.x)?;
    let report = classification_report(&test.y, &y_pred)?;
    log::debug!("Classification report:\n{}", report.render());
    Ok((Arc::from(model), report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn metrics(value: f64) -> ClassMetrics {
        ClassMetrics {
            precision: value,
            recall: value,
            f1_score: value,
            support: 10,
        }
    }

    fn round(round: usize, accuracy: f64, weighted: f64, macro_: f64) -> RoundMetrics {
        RoundMetrics {
            round,
            accuracy,
            minority: metrics(0.0),
            majority: metrics(1.0),
            weighted_avg: metrics(weighted),
            macro_avg: metrics(macro_),
            grown_size: 100,
            minority_count: 20,
            synthetic_rows: 0,
        }
    }

    #[test]
    fn test_summary_is_mean_of_rounds() {
        let mut history = TrainingHistory::new();
        assert!(history.summary().is_none());

        history.push(round(1, 0.8, 0.7, 0.6));
        history.push(round(2, 0.9, 0.9, 0.8));
        let summary = history.summary().unwrap();

        assert_eq!(summary.rounds, 2);
        assert!((summary.overall_accuracy - 0.85).abs() < 1e-12);
        assert!((summary.average(AverageKind::Weighted).precision - 0.8).abs() < 1e-12);
        assert!((summary.average(AverageKind::Macro).f1_score - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_round_metrics_follow_class_identity() {
        let mut per_class = BTreeMap::new();
        per_class.insert(0, metrics(0.9));
        per_class.insert(1, metrics(0.4));
        let report = ClassificationReport {
            per_class,
            accuracy: 0.85,
            macro_avg: metrics(0.65),
            weighted_avg: metrics(0.8),
        };
        // label 0 is the minority here
        let balance = ClassBalance {
            majority: 1,
            minority: 0,
            majority_count: 70,
            minority_count: 30,
        };
        let data = LabeledDataset::new(
            ndarray::Array2::zeros((3, 1)),
            ndarray::Array1::from_vec(vec![0, 1, 1]),
            vec!["f".to_string()],
            "y",
        )
        .unwrap();

        let m = RoundMetrics::from_report(1, &report, &balance, &data, 0);
        assert_eq!(m.minority.precision, 0.9);
        assert_eq!(m.majority.precision, 0.4);
        assert_eq!(m.minority_count, 1);
        assert_eq!(m.grown_size, 3);
    }
}
