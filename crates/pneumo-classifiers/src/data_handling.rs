//! Data structures and helpers for labeled tabular datasets.
//!
//! This module defines `LabeledDataset`, `ClassBalance` and `DatasetSplit`
//! and contains helpers for selecting rows, concatenating snapshots and
//! creating the train/test partitions consumed by the trainers.
use std::collections::{BTreeMap, BTreeSet};

use ndarray::{concatenate, Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{Result, TrainingError};

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledDataset {
    /// Feature matrix, one row per patient
    pub x: Array2<f32>,
    /// Target labels
    pub y: Array1<i32>,
    /// Feature names, aligned with the columns of `x`
    pub feature_names: Vec<String>,
    /// Name of the target column (never among `feature_names`)
    pub target_name: String,
    /// Column indices of categorical features
    pub categorical_features: Vec<usize>,
}

/// Majority/minority label identities derived from empirical frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassBalance {
    pub majority: i32,
    pub minority: i32,
    pub majority_count: usize,
    pub minority_count: usize,
}

impl ClassBalance {
    /// Minority:majority ratio.
    pub fn ratio(&self) -> f64 {
        if self.majority_count == 0 {
            return 0.0;
        }
        self.minority_count as f64 / self.majority_count as f64
    }

    /// Labels in ascending order, matching the column order of `predict_proba`.
    pub fn classes(&self) -> [i32; 2] {
        if self.majority < self.minority {
            [self.majority, self.minority]
        } else {
            [self.minority, self.majority]
        }
    }

    /// Recount both classes in `y`, keeping the label identities fixed.
    pub fn recount(&self, y: &Array1<i32>) -> ClassBalance {
        ClassBalance {
            majority: self.majority,
            minority: self.minority,
            majority_count: y.iter().filter(|&&v| v == self.majority).count(),
            minority_count: y.iter().filter(|&&v| v == self.minority).count(),
        }
    }
}

impl LabeledDataset {
    pub fn new(
        x: Array2<f32>,
        y: Array1<i32>,
        feature_names: Vec<String>,
        target_name: impl Into<String>,
    ) -> Result<Self> {
        let target_name = target_name.into();
        if x.nrows() != y.len() {
            return Err(TrainingError::shape(format!(
                "{} feature rows but {} labels",
                x.nrows(),
                y.len()
            )));
        }
        if feature_names.len() != x.ncols() {
            return Err(TrainingError::shape(format!(
                "{} feature names for {} feature columns",
                feature_names.len(),
                x.ncols()
            )));
        }
        if feature_names.iter().any(|name| name == &target_name) {
            return Err(TrainingError::shape(format!(
                "target column '{}' must not be part of the features",
                target_name
            )));
        }
        Ok(LabeledDataset {
            x,
            y,
            feature_names,
            target_name,
            categorical_features: Vec::new(),
        })
    }

    /// Build a dataset from a full table by pulling out the target column.
    pub fn from_table(table: Array2<f32>, column_names: Vec<String>, target_name: &str) -> Result<Self> {
        if column_names.len() != table.ncols() {
            return Err(TrainingError::shape(format!(
                "{} column names for {} table columns",
                column_names.len(),
                table.ncols()
            )));
        }
        let Some(target_idx) = column_names.iter().position(|name| name == target_name) else {
            return Err(TrainingError::shape(format!(
                "missing target column '{}'",
                target_name
            )));
        };

        let feature_idx: Vec<usize> = (0..table.ncols()).filter(|&c| c != target_idx).collect();
        let x = table.select(Axis(1), &feature_idx);
        let mut y = Vec::with_capacity(table.nrows());
        for (row, &value) in table.column(target_idx).iter().enumerate() {
            if !value.is_finite() || value.fract() != 0.0 {
                return Err(TrainingError::shape(format!(
                    "target '{}' at row {} is not an integer label: {}",
                    target_name,
                    row + 1,
                    value
                )));
            }
            y.push(value as i32);
        }
        let feature_names = feature_idx.iter().map(|&c| column_names[c].clone()).collect();

        LabeledDataset::new(x, Array1::from_vec(y), feature_names, target_name)
    }

    /// Mark the named columns as categorical.
    pub fn with_categorical_features(self, names: &[String]) -> Result<Self> {
        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            let idx = self
                .feature_names
                .iter()
                .position(|f| f == name)
                .ok_or_else(|| TrainingError::shape(format!("unknown categorical feature '{}'", name)))?;
            indices.push(idx);
        }
        self.with_categorical_indices(indices)
    }

    pub fn with_categorical_indices(mut self, mut indices: Vec<usize>) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.ncols()) {
            return Err(TrainingError::shape(format!(
                "categorical feature index {} out of range for {} features",
                bad,
                self.ncols()
            )));
        }
        indices.sort_unstable();
        indices.dedup();
        self.categorical_features = indices;
        Ok(self)
    }

    /// Columns whose values are all integers with at most `max_levels` distinct values.
    pub fn infer_categorical_features(&self, max_levels: usize) -> Vec<usize> {
        (0..self.ncols())
            .filter(|&col| {
                let mut levels = BTreeSet::new();
                for &v in self.x.column(col).iter() {
                    if !v.is_finite() || v.fract() != 0.0 {
                        return false;
                    }
                    levels.insert(v as i64);
                    if levels.len() > max_levels {
                        return false;
                    }
                }
                true
            })
            .collect()
    }

    pub fn nrows(&self) -> usize {
        self.x.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.x.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.nrows() == 0
    }

    pub fn class_counts(&self) -> BTreeMap<i32, usize> {
        let mut counts = BTreeMap::new();
        for &label in self.y.iter() {
            *counts.entry(label).or_insert(0) += 1;
        }
        counts
    }

    pub fn count_label(&self, label: i32) -> usize {
        self.y.iter().filter(|&&v| v == label).count()
    }

    /// Derive majority/minority identities from label frequency.
    ///
    /// Exactly two labels are required. On a tie the smaller label is the majority.
    pub fn class_balance(&self) -> Result<ClassBalance> {
        let counts = self.class_counts();
        if counts.len() != 2 {
            return Err(TrainingError::shape(format!(
                "expected exactly two classes in '{}', found {}",
                self.target_name,
                counts.len()
            )));
        }
        let mut entries: Vec<(i32, usize)> = counts.into_iter().collect();
        // Stable sort on count keeps the smaller label first on ties.
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(ClassBalance {
            majority: entries[0].0,
            minority: entries[1].0,
            majority_count: entries[0].1,
            minority_count: entries[1].1,
        })
    }

    pub fn indices_of(&self, label: i32) -> Vec<usize> {
        self.y
            .iter()
            .enumerate()
            .filter_map(|(i, &v)| if v == label { Some(i) } else { None })
            .collect()
    }

    pub fn select_rows(&self, indices: &[usize]) -> LabeledDataset {
        LabeledDataset {
            x: self.x.select(Axis(0), indices),
            y: self.y.select(Axis(0), indices),
            feature_names: self.feature_names.clone(),
            target_name: self.target_name.clone(),
            categorical_features: self.categorical_features.clone(),
        }
    }

    /// A new dataset with `other`'s rows appended after this one's.
    pub fn concat(&self, other: &LabeledDataset) -> Result<LabeledDataset> {
        if self.feature_names != other.feature_names {
            return Err(TrainingError::shape(
                "cannot concatenate datasets with different feature columns",
            ));
        }
        let x = concatenate(Axis(0), &[self.x.view(), other.x.view()])
            .map_err(|e| TrainingError::shape(e.to_string()))?;
        let y = concatenate(Axis(0), &[self.y.view(), other.y.view()])
            .map_err(|e| TrainingError::shape(e.to_string()))?;
        Ok(LabeledDataset {
            x,
            y,
            feature_names: self.feature_names.clone(),
            target_name: self.target_name.clone(),
            categorical_features: self.categorical_features.clone(),
        })
    }

    /// An empty dataset with the same columns.
    pub fn empty_like(&self) -> LabeledDataset {
        self.select_rows(&[])
    }

    pub fn log_summary(&self, title: &str) {
        let counts = self
            .class_counts()
            .iter()
            .map(|(label, count)| format!("{}={}", label, count))
            .collect::<Vec<_>>()
            .join(", ");
        log::info!(
            "{}: {} rows, {} features ({} categorical), '{}' counts: {}",
            title,
            self.nrows(),
            self.ncols(),
            self.categorical_features.len(),
            self.target_name,
            counts
        );
    }
}

/// Disjoint train and test partitions of one dataset.
#[derive(Debug, Clone)]
pub struct DatasetSplit {
    pub train: LabeledDataset,
    pub test: LabeledDataset,
}

impl DatasetSplit {
    pub fn new(train: LabeledDataset, test: LabeledDataset) -> Result<Self> {
        if train.feature_names != test.feature_names {
            return Err(TrainingError::shape(
                "train and test partitions have different feature columns",
            ));
        }
        if train.target_name != test.target_name {
            return Err(TrainingError::shape(format!(
                "train target '{}' differs from test target '{}'",
                train.target_name, test.target_name
            )));
        }
        if train.is_empty() || test.is_empty() {
            return Err(TrainingError::shape("train and test partitions must not be empty"));
        }
        Ok(DatasetSplit { train, test })
    }
}

/// Shuffle rows with a seeded generator and hold out `test_fraction` of them.
pub fn train_test_split(
    dataset: &LabeledDataset,
    test_fraction: f64,
    seed: u64,
) -> Result<DatasetSplit> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(TrainingError::shape(format!(
            "test fraction must lie in (0, 1), got {}",
            test_fraction
        )));
    }
    let n_samples = dataset.nrows();
    let n_test = (n_samples as f64 * test_fraction).ceil() as usize;
    if n_test == 0 || n_test >= n_samples {
        return Err(TrainingError::shape(format!(
            "cannot hold out {} of {} rows",
            n_test, n_samples
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut indices: Vec<usize> = (0..n_samples).collect();
    indices.shuffle(&mut rng);

    let (test_idx, train_idx) = indices.split_at(n_test);
    let mut train_idx = train_idx.to_vec();
    let mut test_idx = test_idx.to_vec();
    train_idx.sort_unstable();
    test_idx.sort_unstable();

    log::debug!(
        "Split {} rows into {} train and {} test rows (seed {})",
        n_samples,
        train_idx.len(),
        test_idx.len(),
        seed
    );

    DatasetSplit::new(dataset.select_rows(&train_idx), dataset.select_rows(&test_idx))
}
