use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};

use pneumo_classifiers::config::{ActiveSmoteConfig, BaselineConfig, EvaluatorConfig, ModelType};
use pneumo_classifiers::io::CsvTableConfig;

/// Everything the `train` and `compare` commands need, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data: CsvTableConfig,
    /// Fraction of rows held out for evaluation
    pub test_fraction: f64,
    pub split_seed: u64,
    /// Infer categorical columns (integer-valued, at most this many levels)
    /// when none are named.
    pub infer_categorical_max_levels: Option<usize>,
    pub active: ActiveSmoteConfig,
    pub baseline: BaselineConfig,
    pub evaluator: EvaluatorConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data: CsvTableConfig::default(),
            test_fraction: 0.3,
            split_seed: 42,
            infer_categorical_max_levels: None,
            active: ActiveSmoteConfig::default(),
            baseline: BaselineConfig::default(),
            evaluator: EvaluatorConfig::default(),
        }
    }
}

/// Load a pipeline configuration from a JSON file.
pub fn load_pipeline_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig> {
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
    let config: PipelineConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
    Ok(config)
}

impl PipelineConfig {
    /// Start from the `config` file (or defaults) and apply command-line
    /// overrides. Only arguments the subcommand defines are consulted.
    pub fn from_arguments(matches: &ArgMatches) -> Result<Self> {
        let mut config = match matches.get_one::<PathBuf>("config") {
            Some(path) => {
                log::info!("Using config: {}", path.display());
                load_pipeline_config(path)?
            }
            None => {
                log::info!("No config provided; using defaults.");
                PipelineConfig::default()
            }
        };

        if let Some(target) = arg::<String>(matches, "target") {
            config.data.target = target;
        }
        if let Some(columns) = arg::<String>(matches, "categorical") {
            config.data.categorical_columns = split_list(&columns);
        }
        if let Some(columns) = arg::<String>(matches, "drop") {
            config.data.drop_columns = split_list(&columns);
        }
        if let Some(fraction) = arg::<f64>(matches, "test_fraction") {
            config.test_fraction = fraction;
        }
        if let Some(seed) = arg::<u64>(matches, "seed") {
            config.split_seed = seed;
            config.active.seed = seed;
            config.baseline.seed = seed;
            config.evaluator.base_seed = seed;
        }
        if let Some(rounds) = arg::<usize>(matches, "rounds") {
            config.active.n_rounds = rounds;
        }
        if let Some(model_type) = arg::<String>(matches, "model_type") {
            let model_type = ModelType::from_str(&model_type).map_err(anyhow::Error::msg)?;
            config.active.model.model_type = model_type.clone();
            config.baseline.model.model_type = model_type;
        }
        if let Some(trials) = arg::<usize>(matches, "trials") {
            config.evaluator.num_trials = trials;
        }
        if flag(matches, "parallel") {
            config.evaluator.parallel = true;
        }

        Ok(config)
    }
}

fn arg<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, id: &str) -> Option<T> {
    matches.try_get_one::<T>(id).ok().flatten().cloned()
}

fn flag(matches: &ArgMatches, id: &str) -> bool {
    matches.try_get_one::<bool>(id).ok().flatten().copied().unwrap_or(false)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
