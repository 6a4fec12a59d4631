//! SMOTE and SMOTE-NC minority oversampling.
//!
//! New rows are placed on the segment between a minority row and one of its
//! `k` nearest minority neighbours. With categorical features declared, the
//! distance adds `median_std²` for every categorical mismatch (`median_std`
//! being the median std of the continuous minority columns) and categorical
//! values of a new row are the most frequent value among the neighbours, so
//! they always stay valid category codes.

use std::cmp::Ordering;

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::Rng;

use crate::data_handling::{ClassBalance, LabeledDataset};
use crate::error::{Result, Stage, TrainingError};
use crate::preprocessing::{continuous_columns, fit_scaler, median_std};

/// How many minority rows to synthesize.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamplingStrategy {
    /// Reach `minority / majority = ratio`
    Ratio(f64),
    /// Bring the minority class up to the majority count
    NotMajority,
}

#[derive(Debug, Clone)]
pub struct Smote {
    k_neighbors: usize,
    categorical_features: Vec<usize>,
}

impl Smote {
    pub fn new(k_neighbors: usize) -> Self {
        Smote {
            k_neighbors,
            categorical_features: Vec::new(),
        }
    }

    /// Treat the given columns as categorical (SMOTE-NC).
    pub fn with_categorical_features(mut self, categorical_features: Vec<usize>) -> Self {
        self.categorical_features = categorical_features;
        self
    }

    pub fn k_neighbors(&self) -> usize {
        self.k_neighbors
    }

    /// `floor(ratio * majority) - minority` for a ratio target, the count
    /// difference for `NotMajority`; never negative.
    pub fn n_samples_to_generate(balance: &ClassBalance, strategy: SamplingStrategy) -> usize {
        let target = match strategy {
            SamplingStrategy::Ratio(ratio) => (ratio * balance.majority_count as f64).floor() as usize,
            SamplingStrategy::NotMajority => balance.majority_count,
        };
        target.saturating_sub(balance.minority_count)
    }

    /// Synthesize minority rows for `data`.
    ///
    /// Label identities come from `balance`; counts are taken from `data`.
    /// Only the new rows are returned, labelled with the minority label.
    pub fn fit_resample(
        &self,
        data: &LabeledDataset,
        balance: &ClassBalance,
        strategy: SamplingStrategy,
        rng: &mut StdRng,
    ) -> Result<LabeledDataset> {
        if self.k_neighbors == 0 {
            return Err(TrainingError::sampling(Stage::Synthesis, "k_neighbors must be at least 1"));
        }
        if let SamplingStrategy::Ratio(ratio) = strategy {
            if !(ratio > 0.0 && ratio.is_finite()) {
                return Err(TrainingError::sampling(
                    Stage::Synthesis,
                    format!("sampling ratio must be positive, got {}", ratio),
                ));
            }
        }
        if let Some(&bad) = self.categorical_features.iter().find(|&&c| c >= data.ncols()) {
            return Err(TrainingError::shape(format!(
                "categorical feature index {} out of range for {} columns",
                bad,
                data.ncols()
            )));
        }

        let counts = balance.recount(&data.y);
        let n_generate = Self::n_samples_to_generate(&counts, strategy);
        if n_generate == 0 {
            log::warn!(
                "Minority:majority ratio {:.3} already meets the target; no synthetic rows generated",
                counts.ratio()
            );
            return Ok(data.empty_like());
        }

        let minority_idx = data.indices_of(balance.minority);
        if minority_idx.len() < 2 {
            log::warn!(
                "Only {} minority row(s) available; skipping synthesis",
                minority_idx.len()
            );
            return Ok(data.empty_like());
        }

        let minority = data.select_rows(&minority_idx);
        let k = self.k_neighbors.min(minority.nrows() - 1);
        if k < self.k_neighbors {
            log::debug!(
                "k_neighbors clamped from {} to {} ({} minority rows)",
                self.k_neighbors,
                k,
                minority.nrows()
            );
        }

        let neighbours = self.nearest_neighbours(&minority.x, k);
        let m = minority.nrows();
        let ncols = data.ncols();

        let mut values = Vec::with_capacity(n_generate * ncols);
        for _ in 0..n_generate {
            let pick = rng.gen_range(0..m * k);
            let (row, nn) = (pick / k, neighbours[pick / k][pick % k]);
            let gap: f32 = rng.gen();

            for col in 0..ncols {
                let value = if self.categorical_features.contains(&col) {
                    most_frequent(neighbours[row].iter().map(|&j| minority.x[(j, col)]))
                } else {
                    let base = minority.x[(row, col)];
                    base + gap * (minority.x[(nn, col)] - base)
                };
                values.push(value);
            }
        }

        let x = Array2::from_shape_vec((n_generate, ncols), values)
            .map_err(|e| TrainingError::shape(e.to_string()))?;
        let y = Array1::from_elem(n_generate, balance.minority);

        log::debug!(
            "Synthesized {} minority rows from {} minority rows (k = {})",
            n_generate,
            m,
            k
        );

        Ok(LabeledDataset {
            x,
            y,
            feature_names: data.feature_names.clone(),
            target_name: data.target_name.clone(),
            categorical_features: data.categorical_features.clone(),
        })
    }

    /// `k` nearest other rows for every row, closest first (ties by index).
    fn nearest_neighbours(&self, x: &Array2<f32>, k: usize) -> Vec<Vec<usize>> {
        let n = x.nrows();
        let continuous = continuous_columns(x.ncols(), &self.categorical_features);
        let penalty = if self.categorical_features.is_empty() {
            0.0
        } else {
            let sc = fit_scaler(x);
            let med = median_std(&sc, &continuous) as f64;
            med * med
        };

        (0..n)
            .map(|i| {
                let mut dists: Vec<(f64, usize)> = (0..n)
                    .filter(|&j| j != i)
                    .map(|j| {
                        let mut d: f64 = continuous
                            .iter()
                            .map(|&c| {
                                let diff = (x[(i, c)] - x[(j, c)]) as f64;
                                diff * diff
                            })
                            .sum();
                        for &c in &self.categorical_features {
                            if x[(i, c)] != x[(j, c)] {
                                d += penalty;
                            }
                        }
                        (d, j)
                    })
                    .collect();
                dists.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal).then(a.1.cmp(&b.1)));
                dists.into_iter().take(k).map(|(_, j)| j).collect()
            })
            .collect()
    }
}

/// Mode of the values; the smallest value wins ties.
fn most_frequent(values: impl Iterator<Item = f32>) -> f32 {
    let mut values: Vec<f32> = values.collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let mut best = (values.first().copied().unwrap_or(0.0), 0usize);
    let mut i = 0;
    while i < values.len() {
        let mut j = i;
        while j < values.len() && values[j] == values[i] {
            j += 1;
        }
        if j - i > best.1 {
            best = (values[i], j - i);
        }
        i = j;
    }
    best.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    /// 12 majority rows (label 0) and 4 minority rows (label 1); column 1 is
    /// a categorical code.
    fn imbalanced() -> LabeledDataset {
        let mut values = Vec::new();
        let mut labels = Vec::new();
        for i in 0..12 {
            values.extend_from_slice(&[i as f32, (i % 3) as f32]);
            labels.push(0);
        }
        for (v, code) in [(20.0, 1.0), (21.0, 1.0), (22.0, 2.0), (23.0, 1.0)] {
            values.extend_from_slice(&[v, code]);
            labels.push(1);
        }
        let x = Array2::from_shape_vec((16, 2), values).unwrap();
        LabeledDataset::new(
            x,
            Array1::from_vec(labels),
            vec!["age".to_string(), "cough".to_string()],
            "risk",
        )
        .unwrap()
        .with_categorical_indices(vec![1])
        .unwrap()
    }

    #[test]
    fn test_sample_counts() {
        let balance = ClassBalance {
            majority: 0,
            minority: 1,
            majority_count: 80,
            minority_count: 4,
        };
        assert_eq!(Smote::n_samples_to_generate(&balance, SamplingStrategy::Ratio(0.25)), 16);
        assert_eq!(Smote::n_samples_to_generate(&balance, SamplingStrategy::NotMajority), 76);
        assert_eq!(Smote::n_samples_to_generate(&balance, SamplingStrategy::Ratio(0.01)), 0);
    }

    #[test]
    fn test_smote_nc_keeps_categories_valid() {
        let data = imbalanced();
        let balance = data.class_balance().unwrap();
        let smote = Smote::new(5).with_categorical_features(vec![1]);
        let mut rng = StdRng::seed_from_u64(42);

        let synthetic = smote
            .fit_resample(&data, &balance, SamplingStrategy::NotMajority, &mut rng)
            .unwrap();

        assert_eq!(synthetic.nrows(), 8);
        assert!(synthetic.y.iter().all(|&l| l == 1));
        for row in synthetic.x.rows() {
            assert!((20.0..=23.0).contains(&row[0]));
            assert!(row[1] == 1.0 || row[1] == 2.0);
        }
    }

    #[test]
    fn test_too_few_minority_rows() {
        let data = imbalanced();
        let keep: Vec<usize> = (0..13).collect();
        let data = data.select_rows(&keep);
        let balance = data.class_balance().unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let synthetic = Smote::new(5)
            .fit_resample(&data, &balance, SamplingStrategy::NotMajority, &mut rng)
            .unwrap();
        assert!(synthetic.is_empty());
    }

    #[test]
    fn test_most_frequent_prefers_smaller_on_ties() {
        assert_eq!(most_frequent([2.0, 1.0, 2.0, 1.0].into_iter()), 1.0);
        assert_eq!(most_frequent([3.0, 3.0, 1.0].into_iter()), 3.0);
    }
}
