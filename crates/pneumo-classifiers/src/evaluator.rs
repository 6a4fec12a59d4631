//! Paired comparison of two trainers over repeated trials.
//!
//! Every trial resets both trainers, trains them with the same trial seed,
//! and records the mean-of-rounds accuracy, precision, recall and F1 of
//! each. A dependent-samples t-test per metric then compares the two
//! per-trial series.
use std::fmt;
use std::path::Path;

use anyhow::Context;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{EvaluatorConfig, FailurePolicy};
use crate::error::{Result, TrainingError};
use crate::io::{write_comparison, write_trial_results};
use crate::metrics::AverageKind;
use crate::stats::{mean, paired_ttest};
use crate::trainer::{Trainer, TrainingSummary};

/// Metrics compared between the two trainers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    Accuracy,
    Precision,
    Recall,
    F1Score,
}

impl Metric {
    pub const ALL: [Metric; 4] = [Metric::Accuracy, Metric::Precision, Metric::Recall, Metric::F1Score];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Accuracy => "accuracy",
            Metric::Precision => "precision",
            Metric::Recall => "recall",
            Metric::F1Score => "f1-score",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One trainer's aggregated metrics for one trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    /// 1-based trial index
    pub trial: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

impl TrialResult {
    pub fn from_summary(trial: usize, summary: &TrainingSummary, kind: AverageKind) -> Self {
        let avg = summary.average(kind);
        TrialResult {
            trial,
            accuracy: summary.overall_accuracy,
            precision: avg.precision,
            recall: avg.recall,
            f1_score: avg.f1_score,
        }
    }

    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Accuracy => self.accuracy,
            Metric::Precision => self.precision,
            Metric::Recall => self.recall,
            Metric::F1Score => self.f1_score,
        }
    }

    /// Mean of the four metrics.
    pub fn average(&self) -> f64 {
        Metric::ALL.iter().map(|&m| self.value(m)).sum::<f64>() / Metric::ALL.len() as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricComparison {
    pub metric: Metric,
    pub t_value: f64,
    pub p_value: f64,
}

/// A trial dropped under `FailurePolicy::SkipAndRecord`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialFailure {
    /// 1-based trial index
    pub trial: usize,
    pub trainer: String,
    pub error: String,
}

/// Which side of the comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    A,
    B,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub trainer_a: String,
    pub trainer_b: String,
    pub average_a: AverageKind,
    pub average_b: AverageKind,
    pub trials_a: Vec<TrialResult>,
    pub trials_b: Vec<TrialResult>,
    pub comparisons: Vec<MetricComparison>,
    pub failed_trials: Vec<TrialFailure>,
}

impl ComparisonReport {
    pub fn trials(&self, side: Side) -> &[TrialResult] {
        match side {
            Side::A => &self.trials_a,
            Side::B => &self.trials_b,
        }
    }

    /// Per-trial values of one metric, in trial order.
    pub fn series(&self, side: Side, metric: Metric) -> Vec<f64> {
        self.trials(side).iter().map(|t| t.value(metric)).collect()
    }

    pub fn comparison(&self, metric: Metric) -> Option<&MetricComparison> {
        self.comparisons.iter().find(|c| c.metric == metric)
    }

    pub fn mean(&self, side: Side, metric: Metric) -> Option<f64> {
        mean(&self.series(side, metric))
    }

    /// Write `model_a.csv`, `model_b.csv` and `comparison.csv` into `dir`.
    pub fn save(&self, dir: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create results directory: {}", dir.display()))?;
        write_trial_results(&dir.join("model_a.csv"), &self.trials_a)?;
        write_trial_results(&dir.join("model_b.csv"), &self.trials_b)?;
        write_comparison(&dir.join("comparison.csv"), &self.comparisons)?;
        log::info!("Comparison results saved to {}", dir.display());
        Ok(())
    }
}

type TrialOutcome = std::result::Result<(TrainingSummary, TrainingSummary), (String, TrainingError)>;

pub struct ComparativeEvaluator {
    config: EvaluatorConfig,
}

impl ComparativeEvaluator {
    pub fn new(config: EvaluatorConfig) -> Self {
        ComparativeEvaluator { config }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Seed of the 0-based trial `t`; distinct per trial and reproducible.
    pub fn trial_seed(&self, t: usize) -> u64 {
        self.config.base_seed ^ ((t as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    /// Run `num_trials` trials in order, resetting and retraining both
    /// trainers in place.
    pub fn run_trials<A, B>(&self, a: &mut A, b: &mut B, num_trials: usize) -> Result<ComparisonReport>
    where
        A: Trainer + ?Sized,
        B: Trainer + ?Sized,
    {
        check_trials(num_trials)?;
        let mut outcomes = Vec::with_capacity(num_trials);
        for t in 0..num_trials {
            outcomes.push(self.run_one(a, b, t));
        }
        self.assemble(a.name(), b.name(), outcomes)
    }

    /// Run `num_trials` trials on private clones of the trainers, across
    /// worker threads when `parallel` is configured. Results are collected
    /// in trial order.
    pub fn run<A, B>(&self, a: &A, b: &B, num_trials: usize) -> Result<ComparisonReport>
    where
        A: Trainer + Clone + Sync,
        B: Trainer + Clone + Sync,
    {
        check_trials(num_trials)?;
        let trial = |t: usize| {
            let mut a = a.clone();
            let mut b = b.clone();
            self.run_one(&mut a, &mut b, t)
        };
        let outcomes: Vec<TrialOutcome> = if self.config.parallel {
            (0..num_trials).into_par_iter().map(trial).collect()
        } else {
            (0..num_trials).map(trial).collect()
        };
        self.assemble(a.name(), b.name(), outcomes)
    }

    fn run_one<A, B>(&self, a: &mut A, b: &mut B, t: usize) -> TrialOutcome
    where
        A: Trainer + ?Sized,
        B: Trainer + ?Sized,
    {
        let seed = self.trial_seed(t);
        log::info!("==================== STARTING TEST {} ====================", t + 1);

        a.reset();
        b.reset();

        log::info!("Training started: {}", a.name());
        let summary_a = a
            .train(seed)
            .map_err(|e| (a.name().to_string(), e.in_trial(t + 1)))?;
        log::info!("Training started: {}", b.name());
        let summary_b = b
            .train(seed)
            .map_err(|e| (b.name().to_string(), e.in_trial(t + 1)))?;
        Ok((summary_a, summary_b))
    }

    fn assemble(&self, name_a: &str, name_b: &str, outcomes: Vec<TrialOutcome>) -> Result<ComparisonReport> {
        let mut trials_a = Vec::new();
        let mut trials_b = Vec::new();
        let mut failed_trials = Vec::new();

        for (t, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok((summary_a, summary_b)) => {
                    trials_a.push(TrialResult::from_summary(t + 1, &summary_a, self.config.average_a));
                    trials_b.push(TrialResult::from_summary(t + 1, &summary_b, self.config.average_b));
                }
                Err((trainer, error)) => match self.config.failure_policy {
                    FailurePolicy::Abort => return Err(error),
                    FailurePolicy::SkipAndRecord => {
                        log::warn!("Skipping trial {} ({} failed): {}", t + 1, trainer, error);
                        failed_trials.push(TrialFailure {
                            trial: t + 1,
                            trainer,
                            error: error.to_string(),
                        });
                    }
                },
            }
        }

        if trials_a.len() < 2 {
            return Err(TrainingError::InsufficientTrials {
                available: trials_a.len(),
            });
        }

        let mut report = ComparisonReport {
            trainer_a: name_a.to_string(),
            trainer_b: name_b.to_string(),
            average_a: self.config.average_a,
            average_b: self.config.average_b,
            trials_a,
            trials_b,
            comparisons: Vec::with_capacity(Metric::ALL.len()),
            failed_trials,
        };

        for metric in Metric::ALL {
            log::debug!("Computing t-value and p-value for {}", metric);
            let res = paired_ttest(&report.series(Side::A, metric), &report.series(Side::B, metric))?;
            report.comparisons.push(MetricComparison {
                metric,
                t_value: res.statistic,
                p_value: res.pvalue,
            });
        }
        Ok(report)
    }
}

fn check_trials(num_trials: usize) -> Result<()> {
    if num_trials < 2 {
        return Err(TrainingError::InsufficientTrials { available: num_trials });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Stage;
    use crate::models::classifier_trait::ClassifierModel;
    use crate::trainer::{AveragedMetrics, TrainingHistory};
    use std::sync::Arc;

    /// Trainer whose summary is a fixed function of the seed.
    #[derive(Clone)]
    struct FixedTrainer {
        name: &'static str,
        offset: f64,
        fail_on: Option<u64>,
        history: TrainingHistory,
    }

    impl FixedTrainer {
        fn new(name: &'static str, offset: f64) -> Self {
            FixedTrainer {
                name,
                offset,
                fail_on: None,
                history: TrainingHistory::new(),
            }
        }
    }

    impl Trainer for FixedTrainer {
        fn name(&self) -> &str {
            self.name
        }

        fn reset(&mut self) {}

        fn train(&mut self, seed: u64) -> Result<TrainingSummary> {
            if self.fail_on == Some(seed) {
                return Err(TrainingError::sampling(Stage::Clustering, "too few rows"));
            }
            let v = (seed % 97) as f64 / 100.0 + self.offset;
            let avg = AveragedMetrics {
                precision: v,
                recall: v,
                f1_score: v,
            };
            Ok(TrainingSummary {
                rounds: 1,
                overall_accuracy: v,
                overall_weighted_avg: avg,
                overall_macro_avg: avg,
            })
        }

        fn history(&self) -> &TrainingHistory {
            &self.history
        }

        fn classifier(&self) -> Option<Arc<dyn ClassifierModel>> {
            None
        }
    }

    #[test]
    fn test_identical_trainers_give_null_statistics() {
        let evaluator = ComparativeEvaluator::new(EvaluatorConfig::default());
        let report = evaluator
            .run(&FixedTrainer::new("a", 0.0), &FixedTrainer::new("b", 0.0), 4)
            .unwrap();
        for c in &report.comparisons {
            assert_eq!(c.t_value, 0.0);
            assert_eq!(c.p_value, 1.0);
        }
        assert_eq!(report.trials_a.len(), 4);
        assert_eq!(report.trials_b.len(), 4);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let a = FixedTrainer::new("a", 0.05);
        let b = FixedTrainer::new("b", 0.0);
        let sequential = ComparativeEvaluator::new(EvaluatorConfig::default())
            .run_trials(&mut a.clone(), &mut b.clone(), 5)
            .unwrap();
        let parallel = ComparativeEvaluator::new(EvaluatorConfig {
            parallel: true,
            ..EvaluatorConfig::default()
        })
        .run(&a, &b, 5)
        .unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_single_trial_is_rejected_before_training() {
        let mut a = FixedTrainer::new("a", 0.0);
        a.fail_on = Some(ComparativeEvaluator::new(EvaluatorConfig::default()).trial_seed(0));
        let err = ComparativeEvaluator::new(EvaluatorConfig::default())
            .run_trials(&mut a, &mut FixedTrainer::new("b", 0.0), 1)
            .unwrap_err();
        assert!(matches!(err, TrainingError::InsufficientTrials { available: 1 }));
    }

    #[test]
    fn test_failed_trial_aborts_or_is_recorded() {
        let evaluator = ComparativeEvaluator::new(EvaluatorConfig::default());
        let mut a = FixedTrainer::new("a", 0.0);
        a.fail_on = Some(evaluator.trial_seed(1));

        let err = evaluator
            .run_trials(&mut a.clone(), &mut FixedTrainer::new("b", 0.0), 3)
            .unwrap_err();
        assert_eq!(err.trial(), Some(2));
        assert_eq!(err.stage(), Some(Stage::Clustering));

        let skipping = ComparativeEvaluator::new(EvaluatorConfig {
            failure_policy: FailurePolicy::SkipAndRecord,
            ..EvaluatorConfig::default()
        });
        let report = skipping
            .run_trials(&mut a, &mut FixedTrainer::new("b", 0.0), 3)
            .unwrap();
        assert_eq!(report.failed_trials.len(), 1);
        assert_eq!(report.failed_trials[0].trial, 2);
        assert_eq!(report.trials_a.len(), report.trials_b.len());
        assert_eq!(
            report.trials_a.iter().map(|t| t.trial).collect::<Vec<_>>(),
            vec![1, 3]
        );
    }

    #[test]
    fn test_trial_seeds_are_distinct() {
        let evaluator = ComparativeEvaluator::new(EvaluatorConfig::default());
        let seeds: std::collections::HashSet<u64> = (0..50).map(|t| evaluator.trial_seed(t)).collect();
        assert_eq!(seeds.len(), 50);
    }

    #[test]
    fn test_trial_average() {
        let trial = TrialResult {
            trial: 1,
            accuracy: 0.8,
            precision: 0.6,
            recall: 0.7,
            f1_score: 0.9,
        };
        assert!((trial.average() - 0.75).abs() < 1e-12);
    }
}
