pub mod compare;
pub mod predict;
pub mod train;

use std::path::Path;

use anyhow::{Context, Result};
use pneumo_classifiers::data_handling::{train_test_split, DatasetSplit};
use pneumo_classifiers::io::read_labeled_csv;

use crate::config::PipelineConfig;

/// Read the labeled table and hold out the configured test partition.
pub fn load_split(data: &Path, config: &PipelineConfig) -> Result<DatasetSplit> {
    let mut dataset = read_labeled_csv(data, &config.data)?;
    if dataset.categorical_features.is_empty() {
        if let Some(max_levels) = config.infer_categorical_max_levels {
            let inferred = dataset.infer_categorical_features(max_levels);
            log::info!("Inferred {} categorical feature(s)", inferred.len());
            dataset = dataset.with_categorical_indices(inferred)?;
        }
    }
    dataset.log_summary("Input data");

    train_test_split(&dataset, config.test_fraction, config.split_seed)
        .with_context(|| format!("Failed to split {}", data.display()))
}

pub(crate) fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create output directory: {}", dir.display()))
}
