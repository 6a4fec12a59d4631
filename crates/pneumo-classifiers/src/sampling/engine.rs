use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::index;

use crate::config::ResamplingConfig;
use crate::data_handling::{ClassBalance, LabeledDataset};
use crate::error::{Result, Stage, TrainingError};
use crate::sampling::kmeans::{ClusterAssignment, KMeans};
use crate::sampling::smote::{SamplingStrategy, Smote};

/// Minority rows drawn as candidates for synthesis, with the confidence
/// (max class probability) the current model assigns them.
#[derive(Debug, Clone, PartialEq)]
pub struct UncertaintySample {
    /// Row indices into the original training set, ascending
    pub indices: Vec<usize>,
    pub confidence: Vec<f32>,
}

impl UncertaintySample {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Everything one resampling pass produced.
#[derive(Debug, Clone)]
pub struct ResampleOutcome {
    /// Previous grown set with `synthetic` appended
    pub grown: LabeledDataset,
    pub synthetic: LabeledDataset,
    pub uncertainty: UncertaintySample,
    /// Clusters over the uncertainty sample (labels aligned with `uncertainty.indices`)
    pub clusters: ClusterAssignment,
    /// Original training-row indices of the diverse minority set
    pub diverse: Vec<usize>,
}

/// Uncertainty-guided, cluster-diverse minority oversampling.
///
/// The engine holds no per-round state: every call takes the original
/// training set, the current grown snapshot and the latest class
/// probabilities, and returns a new snapshot.
#[derive(Debug, Clone)]
pub struct ResamplingEngine {
    config: ResamplingConfig,
    balance: ClassBalance,
    smote: Smote,
}

impl ResamplingEngine {
    pub fn new(config: ResamplingConfig, balance: ClassBalance, categorical_features: Vec<usize>) -> Result<Self> {
        if !(config.sampling_fraction > 0.0 && config.sampling_fraction <= 1.0) {
            return Err(TrainingError::sampling(
                Stage::UncertaintySampling,
                format!("sampling_fraction must lie in (0, 1], got {}", config.sampling_fraction),
            ));
        }
        if config.k_clusters == 0 {
            return Err(TrainingError::sampling(Stage::Clustering, "k_clusters must be at least 1"));
        }
        if !(config.cluster_quota > 0.0 && config.cluster_quota <= 1.0) {
            return Err(TrainingError::sampling(
                Stage::Clustering,
                format!("cluster_quota must lie in (0, 1], got {}", config.cluster_quota),
            ));
        }
        if !(config.target_ratio > 0.0 && config.target_ratio.is_finite()) {
            return Err(TrainingError::sampling(
                Stage::Synthesis,
                format!("target_ratio must be positive, got {}", config.target_ratio),
            ));
        }
        if config.k_neighbors == 0 {
            return Err(TrainingError::sampling(Stage::Synthesis, "k_neighbors must be at least 1"));
        }

        let smote = Smote::new(config.k_neighbors).with_categorical_features(categorical_features);
        Ok(ResamplingEngine { config, balance, smote })
    }

    pub fn config(&self) -> &ResamplingConfig {
        &self.config
    }

    pub fn balance(&self) -> &ClassBalance {
        &self.balance
    }

    /// Draw `round(sampling_fraction * minority)` minority rows uniformly.
    pub fn uncertainty_sampling(
        &self,
        original: &LabeledDataset,
        probabilities: &Array2<f32>,
        rng: &mut StdRng,
    ) -> Result<UncertaintySample> {
        if probabilities.nrows() != original.nrows() {
            return Err(TrainingError::shape(format!(
                "{} probability rows for {} training rows",
                probabilities.nrows(),
                original.nrows()
            )));
        }

        let minority = original.indices_of(self.balance.minority);
        let pool_size = (self.config.sampling_fraction * minority.len() as f64).round() as usize;
        if pool_size == 0 {
            return Err(TrainingError::sampling(
                Stage::UncertaintySampling,
                format!(
                    "sampling fraction {} of {} minority rows selects no rows",
                    self.config.sampling_fraction,
                    minority.len()
                ),
            ));
        }
        if pool_size > minority.len() {
            return Err(TrainingError::sampling(
                Stage::UncertaintySampling,
                format!("cannot draw {} of {} minority rows", pool_size, minority.len()),
            ));
        }

        let mut indices: Vec<usize> = index::sample(rng, minority.len(), pool_size)
            .into_iter()
            .map(|i| minority[i])
            .collect();
        indices.sort_unstable();

        let confidence = indices
            .iter()
            .map(|&i| probabilities.row(i).iter().copied().fold(f32::MIN, f32::max))
            .collect();

        Ok(UncertaintySample { indices, confidence })
    }

    /// Cluster the pool and keep `cluster_quota` of every cluster.
    ///
    /// Returns the clustering and the chosen original-row indices. A cluster
    /// whose rounded quota is zero contributes nothing.
    pub fn diversity_sampling(
        &self,
        original: &LabeledDataset,
        pool: &UncertaintySample,
        rng: &mut StdRng,
    ) -> Result<(ClusterAssignment, Vec<usize>)> {
        let x_pool = original.select_rows(&pool.indices).x;
        let clusters = KMeans::new(self.config.k_clusters)
            .with_max_iter(self.config.kmeans_max_iter)
            .fit(&x_pool, rng)?;

        let mut diverse = Vec::new();
        for (cluster, members) in clusters.members().into_iter().enumerate() {
            let quota = self
                .config
                .quota_rounding
                .apply(self.config.cluster_quota * members.len() as f64);
            if quota > members.len() {
                return Err(TrainingError::sampling(
                    Stage::Clustering,
                    format!(
                        "quota of {} exceeds the {} rows of cluster {}",
                        quota,
                        members.len(),
                        cluster
                    ),
                ));
            }
            if quota == 0 {
                log::debug!("Cluster {} ({} rows) contributes no rows", cluster, members.len());
                continue;
            }
            diverse.extend(
                index::sample(rng, members.len(), quota)
                    .into_iter()
                    .map(|i| pool.indices[members[i]]),
            );
        }
        diverse.sort_unstable();

        log::debug!(
            "Diversity sampling: cluster sizes {:?}, {} diverse minority rows",
            clusters.sizes(),
            diverse.len()
        );
        Ok((clusters, diverse))
    }

    /// Diverse minority rows followed by every majority row of the original set.
    pub fn build_oversampling_input(&self, original: &LabeledDataset, diverse: &[usize]) -> LabeledDataset {
        let mut rows = diverse.to_vec();
        rows.extend(original.indices_of(self.balance.majority));
        original.select_rows(&rows)
    }

    /// Synthetic minority rows bringing `input` up to `target_ratio`.
    pub fn synthesize(&self, input: &LabeledDataset, target_ratio: f64, rng: &mut StdRng) -> Result<LabeledDataset> {
        let counts = self.balance.recount(&input.y);
        log::info!(
            "Majority/Minority count: {} {}",
            counts.majority_count,
            counts.minority_count
        );
        log::info!("SMOTE sampling ratio: {:.4}", target_ratio);

        self.smote
            .fit_resample(input, &self.balance, SamplingStrategy::Ratio(target_ratio), rng)
            .map_err(|e| match e {
                TrainingError::DataShapeMismatch(reason) => TrainingError::sampling(Stage::Synthesis, reason),
                other => other,
            })
    }

    /// One full pass: uncertainty sampling, diversity sampling, synthesis,
    /// and appending the synthetic rows to `grown`.
    pub fn resample(
        &self,
        original: &LabeledDataset,
        grown: &LabeledDataset,
        probabilities: &Array2<f32>,
        target_ratio: f64,
        rng: &mut StdRng,
    ) -> Result<ResampleOutcome> {
        let uncertainty = self.uncertainty_sampling(original, probabilities, rng)?;
        let (clusters, diverse) = self.diversity_sampling(original, &uncertainty, rng)?;
        let input = self.build_oversampling_input(original, &diverse);
        let synthetic = self.synthesize(&input, target_ratio, rng)?;

        let grown = grown.concat(&synthetic)?;
        let after = self.balance.recount(&grown.y);
        log::info!(
            "Grown set: {} rows, Majority/Minority count: {} {}",
            grown.nrows(),
            after.majority_count,
            after.minority_count
        );

        Ok(ResampleOutcome {
            grown,
            synthetic,
            uncertainty,
            clusters,
            diverse,
        })
    }
}
