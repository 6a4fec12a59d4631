use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::BaselineConfig;
use crate::data_handling::{ClassBalance, DatasetSplit, LabeledDataset};
use crate::error::{Result, Stage, TrainingError};
use crate::metrics::ClassificationReport;
use crate::models::classifier_trait::ClassifierModel;
use crate::sampling::{SamplingStrategy, Smote};
use crate::trainer::{fit_and_evaluate, RoundMetrics, Trainer, TrainingHistory, TrainingSummary};

/// One-shot comparator: SMOTE the full training set up to the majority
/// count, fit once, evaluate once.
#[derive(Clone)]
pub struct SmoteBaselineTrainer {
    config: BaselineConfig,
    split: DatasetSplit,
    balance: ClassBalance,
    resampled: LabeledDataset,
    classifier: Option<Arc<dyn ClassifierModel>>,
    report: Option<ClassificationReport>,
    history: TrainingHistory,
}

impl SmoteBaselineTrainer {
    pub fn new(split: DatasetSplit, config: BaselineConfig) -> Result<Self> {
        let balance = split.train.class_balance()?;
        if config.k_neighbors == 0 {
            return Err(TrainingError::sampling(Stage::Synthesis, "k_neighbors must be at least 1"));
        }
        let resampled = split.train.clone();
        Ok(SmoteBaselineTrainer {
            config,
            split,
            balance,
            resampled,
            classifier: None,
            report: None,
            history: TrainingHistory::new(),
        })
    }

    pub fn config(&self) -> &BaselineConfig {
        &self.config
    }

    pub fn balance(&self) -> &ClassBalance {
        &self.balance
    }

    /// Training rows after oversampling.
    pub fn resampled(&self) -> &LabeledDataset {
        &self.resampled
    }

    pub fn report(&self) -> Option<&ClassificationReport> {
        self.report.as_ref()
    }

    /// Run with the configured seed.
    pub fn train_default(&mut self) -> Result<TrainingSummary> {
        let seed = self.config.seed;
        self.train(seed)
    }

    pub fn save_model(&self, path: &Path) -> anyhow::Result<()> {
        let model = self
            .classifier
            .as_ref()
            .context("No fitted classifier to save; run train() first")?;
        model.save(path, &self.split.train.feature_names)
    }

    fn smote(&self) -> Smote {
        let smote = Smote::new(self.config.k_neighbors);
        if self.config.respect_categorical {
            smote.with_categorical_features(self.split.train.categorical_features.clone())
        } else {
            smote
        }
    }
}

impl Trainer for SmoteBaselineTrainer {
    fn name(&self) -> &str {
        "smote_baseline"
    }

    fn reset(&mut self) {
        self.resampled = self.split.train.clone();
        self.classifier = None;
        self.report = None;
        self.history.clear();
    }

    fn train(&mut self, seed: u64) -> Result<TrainingSummary> {
        self.reset();
        let mut rng = StdRng::seed_from_u64(seed);

        log::info!("==================== {}: training ====================", self.name());
        log::info!(
            "Minority/Majority count: {} / {}",
            self.balance.minority_count,
            self.balance.majority_count
        );

        let synthetic = self
            .smote()
            .fit_resample(&self.split.train, &self.balance, SamplingStrategy::NotMajority, &mut rng)?;
        self.resampled = self.split.train.concat(&synthetic)?;

        let after = self.balance.recount(&self.resampled.y);
        log::info!(
            "Minority/Majority count: {} / {}",
            after.minority_count,
            after.majority_count
        );

        let (model, report) = fit_and_evaluate(&self.config.model, seed, &self.resampled, &self.split.test)?;
        log::info!("Baseline: accuracy {:.4}", report.accuracy);

        self.history.push(RoundMetrics::from_report(
            1,
            &report,
            &self.balance,
            &self.resampled,
            synthetic.nrows(),
        ));
        self.classifier = Some(model);
        self.report = Some(report);

        self.history
            .summary()
            .ok_or_else(|| TrainingError::model(Stage::Evaluation, "no rounds were recorded"))
    }

    fn history(&self) -> &TrainingHistory {
        &self.history
    }

    fn classifier(&self) -> Option<Arc<dyn ClassifierModel>> {
        self.classifier.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use ndarray::{Array1, Array2};
    use rand::Rng;

    fn dataset(n_major: usize, n_minor: usize, rng: &mut StdRng) -> LabeledDataset {
        let n = n_major + n_minor;
        let mut values = Vec::with_capacity(n * 2);
        let mut labels = Vec::with_capacity(n);
        for i in 0..n {
            let minor = i >= n_major;
            let centre = if minor { 2.0 } else { 0.0 };
            values.push(centre + rng.gen::<f32>());
            values.push(rng.gen_range(0..3) as f32);
            labels.push(i32::from(minor));
        }
        LabeledDataset::new(
            Array2::from_shape_vec((n, 2), values).unwrap(),
            Array1::from_vec(labels),
            vec!["temp".into(), "cough".into()],
            "y",
        )
        .unwrap()
    }

    fn trainer(respect_categorical: bool) -> SmoteBaselineTrainer {
        let mut rng = StdRng::seed_from_u64(8);
        let train = dataset(30, 6, &mut rng).with_categorical_indices(vec![1]).unwrap();
        let test = dataset(10, 3, &mut rng).with_categorical_indices(vec![1]).unwrap();
        let config = BaselineConfig {
            model: ModelConfig::random_forest(10),
            respect_categorical,
            ..BaselineConfig::default()
        };
        SmoteBaselineTrainer::new(DatasetSplit::new(train, test).unwrap(), config).unwrap()
    }

    #[test]
    fn test_baseline_balances_classes() {
        let mut trainer = trainer(false);
        let summary = trainer.train(42).unwrap();

        assert_eq!(summary.rounds, 1);
        let counts = trainer.resampled().class_counts();
        assert_eq!(counts[&0], 30);
        assert_eq!(counts[&1], 30);
        assert_eq!(trainer.history().last().unwrap().synthetic_rows, 24);
    }

    #[test]
    fn test_categorical_snapping_is_optional() {
        let mut trainer = trainer(true);
        trainer.train(42).unwrap();
        let synthetic = trainer.resampled().select_rows(&(36..60).collect::<Vec<_>>());
        assert!(synthetic.x.column(1).iter().all(|v| v.fract() == 0.0));
    }

    #[test]
    fn test_same_seed_same_summary() {
        let mut a = trainer(false);
        let mut b = trainer(false);
        assert_eq!(a.train(5).unwrap(), b.train(5).unwrap());
    }

    #[test]
    fn test_train_default_uses_configured_seed() {
        let mut a = trainer(false);
        let mut b = trainer(false);
        let seed = a.config().seed;
        assert_eq!(a.train_default().unwrap(), b.train(seed).unwrap());
        assert_eq!(a.resampled(), b.resampled());
    }
}
