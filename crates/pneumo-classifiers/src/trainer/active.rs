use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::ActiveSmoteConfig;
use crate::data_handling::{ClassBalance, DatasetSplit, LabeledDataset};
use crate::error::{Result, Stage, TrainingError};
use crate::metrics::ClassificationReport;
use crate::models::classifier_trait::ClassifierModel;
use crate::sampling::ResamplingEngine;
use crate::trainer::{fit_and_evaluate, RoundMetrics, Trainer, TrainingHistory, TrainingSummary};

/// Where a trainer is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrainerPhase {
    #[default]
    Idle,
    InitialFit,
    /// 1-based round currently executing
    IteratingRound(usize),
    Converged,
}

impl fmt::Display for TrainerPhase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TrainerPhase::Idle => f.write_str("idle"),
            TrainerPhase::InitialFit => f.write_str("initial fit"),
            TrainerPhase::IteratingRound(i) => write!(f, "round {}", i),
            TrainerPhase::Converged => f.write_str("converged"),
        }
    }
}

/// Mutable state owned by one trainer; rebuilt by `reset`.
#[derive(Clone)]
struct TrainingState {
    phase: TrainerPhase,
    grown: LabeledDataset,
    classifier: Option<Arc<dyn ClassifierModel>>,
    report: Option<ClassificationReport>,
    history: TrainingHistory,
    total_synthetic: usize,
}

impl TrainingState {
    fn new(train: &LabeledDataset) -> Self {
        TrainingState {
            phase: TrainerPhase::Idle,
            grown: train.clone(),
            classifier: None,
            report: None,
            history: TrainingHistory::new(),
            total_synthetic: 0,
        }
    }
}

/// Iterative trainer: fit, score the training rows, grow the training set
/// with uncertainty- and diversity-guided synthetic minority rows, refit,
/// and evaluate on the held-out set, for a fixed number of rounds.
#[derive(Clone)]
pub struct ActiveSmoteTrainer {
    config: ActiveSmoteConfig,
    split: DatasetSplit,
    engine: ResamplingEngine,
    state: TrainingState,
}

impl ActiveSmoteTrainer {
    /// Fails with `DataShapeMismatch` unless the training partition holds
    /// exactly two labels, and with `InvalidSamplingConfiguration` for an
    /// invalid resampling configuration or zero rounds.
    pub fn new(split: DatasetSplit, config: ActiveSmoteConfig) -> Result<Self> {
        let balance = split.train.class_balance()?;
        if config.n_rounds == 0 {
            return Err(TrainingError::sampling(Stage::Fit, "n_rounds must be at least 1"));
        }
        let engine = ResamplingEngine::new(
            config.resampling.clone(),
            balance,
            split.train.categorical_features.clone(),
        )?;

        log::debug!(
            "Active SMOTE trainer: majority label {} ({} rows), minority label {} ({} rows)",
            balance.majority,
            balance.majority_count,
            balance.minority,
            balance.minority_count
        );

        let state = TrainingState::new(&split.train);
        Ok(ActiveSmoteTrainer {
            config,
            split,
            engine,
            state,
        })
    }

    pub fn config(&self) -> &ActiveSmoteConfig {
        &self.config
    }

    pub fn split(&self) -> &DatasetSplit {
        &self.split
    }

    pub fn balance(&self) -> &ClassBalance {
        self.engine.balance()
    }

    pub fn phase(&self) -> TrainerPhase {
        self.state.phase
    }

    /// Original training rows followed by every synthetic row added so far.
    pub fn grown(&self) -> &LabeledDataset {
        &self.state.grown
    }

    pub fn report(&self) -> Option<&ClassificationReport> {
        self.state.report.as_ref()
    }

    pub fn total_synthetic_rows(&self) -> usize {
        self.state.total_synthetic
    }

    /// Run with the configured seed.
    pub fn train_default(&mut self) -> Result<TrainingSummary> {
        let seed = self.config.seed;
        self.train(seed)
    }

    /// Persist the latest fitted classifier.
    pub fn save_model(&self, path: &Path) -> anyhow::Result<()> {
        let model = self
            .state
            .classifier
            .as_ref()
            .context("No fitted classifier to save; run train() first")?;
        model.save(path, &self.split.train.feature_names)
    }

    fn probabilities(model: &dyn ClassifierModel, train: &LabeledDataset) -> Result<Array2<f32>> {
        model.predict_proba(&train.x).map_err(|e| match e {
            TrainingError::DataShapeMismatch(reason) => TrainingError::model(Stage::UncertaintySampling, reason),
            other => other,
        })
    }

    fn run_round(&mut self, round: usize, probabilities: &Array2<f32>, rng: &mut StdRng, seed: u64) -> Result<Array2<f32>> {
        let target_ratio = self.config.target_ratio_for_round(round);
        let outcome = self
            .engine
            .resample(&self.split.train, &self.state.grown, probabilities, target_ratio, rng)?;

        let (model, report) = fit_and_evaluate(&self.config.model, seed, &outcome.grown, &self.split.test)?;
        let next = Self::probabilities(model.as_ref(), &self.split.train)?;

        let synthetic_rows = outcome.synthetic.nrows();
        self.state.history.push(RoundMetrics::from_report(
            round,
            &report,
            self.engine.balance(),
            &outcome.grown,
            synthetic_rows,
        ));
        log::info!(
            "Round {}: accuracy {:.4}, minority f1 {:.4}, {} synthetic rows, grown set {} rows",
            round,
            report.accuracy,
            report.class(self.engine.balance().minority).f1_score,
            synthetic_rows,
            outcome.grown.nrows()
        );

        self.state.total_synthetic += synthetic_rows;
        self.state.grown = outcome.grown;
        self.state.classifier = Some(model);
        self.state.report = Some(report);
        Ok(next)
    }
}

impl Trainer for ActiveSmoteTrainer {
    fn name(&self) -> &str {
        "active_smote"
    }

    fn reset(&mut self) {
        self.state = TrainingState::new(&self.split.train);
    }

    fn train(&mut self, seed: u64) -> Result<TrainingSummary> {
        self.reset();
        let mut rng = StdRng::seed_from_u64(seed);

        log::info!("==================== {}: initial fit ====================", self.name());
        self.state.phase = TrainerPhase::InitialFit;
        let (model, report) = fit_and_evaluate(&self.config.model, seed, &self.split.train, &self.split.test)?;
        let mut probabilities = Self::probabilities(model.as_ref(), &self.split.train)?;
        log::info!("Initial fit: accuracy {:.4}", report.accuracy);
        self.state.classifier = Some(model);
        self.state.report = Some(report);

        for round in 1..=self.config.n_rounds {
            log::info!("==================== ITERATION {} ====================", round);
            self.state.phase = TrainerPhase::IteratingRound(round);
            probabilities = self
                .run_round(round, &probabilities, &mut rng, seed)
                .map_err(|e| e.in_round(round))?;
        }

        self.state.phase = TrainerPhase::Converged;
        log::info!(
            "Retraining done: {} rounds, {} synthetic rows",
            self.state.history.len(),
            self.state.total_synthetic
        );

        self.state
            .history
            .summary()
            .ok_or_else(|| TrainingError::model(Stage::Evaluation, "no rounds were recorded"))
    }

    fn history(&self) -> &TrainingHistory {
        &self.state.history
    }

    fn classifier(&self) -> Option<Arc<dyn ClassifierModel>> {
        self.state.classifier.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelConfig, ResamplingConfig};
    use ndarray::Array1;
    use rand::Rng;

    fn split() -> DatasetSplit {
        let mut rng = StdRng::seed_from_u64(3);
        let build = |n_major: usize, n_minor: usize, rng: &mut StdRng| {
            let n = n_major + n_minor;
            let mut values = Vec::with_capacity(n * 2);
            let mut labels = Vec::with_capacity(n);
            for i in 0..n {
                let minor = i >= n_major;
                let centre = if minor { 2.0 } else { 0.0 };
                values.push(centre + rng.gen::<f32>());
                values.push(centre + rng.gen::<f32>());
                labels.push(i32::from(minor));
            }
            LabeledDataset::new(
                Array2::from_shape_vec((n, 2), values).unwrap(),
                Array1::from_vec(labels),
                vec!["a".into(), "b".into()],
                "y",
            )
            .unwrap()
        };
        let train = build(40, 12, &mut rng);
        let test = build(10, 4, &mut rng);
        DatasetSplit::new(train, test).unwrap()
    }

    fn config(n_rounds: usize) -> ActiveSmoteConfig {
        ActiveSmoteConfig {
            model: ModelConfig::random_forest(10),
            resampling: ResamplingConfig {
                k_clusters: 2,
                sampling_fraction: 0.5,
                ..ResamplingConfig::default()
            },
            n_rounds,
            ..ActiveSmoteConfig::default()
        }
    }

    #[test]
    fn test_phases_and_round_count() {
        let mut trainer = ActiveSmoteTrainer::new(split(), config(3)).unwrap();
        assert_eq!(trainer.phase(), TrainerPhase::Idle);

        let summary = trainer.train(7).unwrap();
        assert_eq!(trainer.phase(), TrainerPhase::Converged);
        assert_eq!(summary.rounds, 3);
        assert_eq!(trainer.history().len(), 3);
        assert!(trainer.classifier().is_some());
        assert!(trainer.report().is_some());
    }

    #[test]
    fn test_grown_set_keeps_original_rows() {
        let split = split();
        let mut trainer = ActiveSmoteTrainer::new(split.clone(), config(2)).unwrap();
        trainer.train(1).unwrap();

        let grown = trainer.grown();
        assert_eq!(grown.nrows(), split.train.nrows() + trainer.total_synthetic_rows());
        let head: Vec<usize> = (0..split.train.nrows()).collect();
        assert_eq!(grown.select_rows(&head), split.train);
    }

    #[test]
    fn test_reset_restores_original_data() {
        let split = split();
        let mut trainer = ActiveSmoteTrainer::new(split.clone(), config(1)).unwrap();
        trainer.train(1).unwrap();
        trainer.reset();
        assert_eq!(trainer.phase(), TrainerPhase::Idle);
        assert_eq!(trainer.grown(), &split.train);
        assert!(trainer.history().is_empty());
        assert!(trainer.classifier().is_none());
    }

    #[test]
    fn test_single_class_training_partition_is_rejected() {
        let split = split();
        let majority = split.train.indices_of(0);
        let train = split.train.select_rows(&majority);
        let single = DatasetSplit::new(train, split.test).unwrap();

        let err = ActiveSmoteTrainer::new(single, config(2)).err().unwrap();
        assert!(matches!(err, TrainingError::DataShapeMismatch(_)));
    }

    #[test]
    fn test_zero_rounds_is_rejected() {
        assert!(ActiveSmoteTrainer::new(split(), config(0)).is_err());
    }

    #[test]
    fn test_round_error_reports_round_index() {
        let mut cfg = config(2);
        // 6 minority candidates cannot form 7 clusters
        cfg.resampling.k_clusters = 7;
        let mut trainer = ActiveSmoteTrainer::new(split(), cfg).unwrap();
        let err = trainer.train(1).unwrap_err();
        assert_eq!(err.round(), Some(1));
        assert_eq!(err.stage(), Some(Stage::Clustering));
    }
}
