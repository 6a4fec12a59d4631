//! `pneumo train`: fit the active-learning SMOTE trainer on a CSV table.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use pneumo_classifiers::io::write_history_csv;
use pneumo_classifiers::report::{save_report, training_report};
use pneumo_classifiers::trainer::{ActiveSmoteTrainer, Trainer, TrainingSummary};

use crate::commands::{ensure_dir, load_split};
use crate::config::PipelineConfig;

/// Files written by a training run.
#[derive(Debug)]
pub struct TrainOutput {
    pub summary: TrainingSummary,
    pub model: PathBuf,
    pub history: PathBuf,
    pub report: Option<PathBuf>,
}

pub fn run_train(data: &Path, config: &PipelineConfig, output_dir: &Path, write_report: bool) -> Result<TrainOutput> {
    let split = load_split(data, config)?;
    let mut trainer = ActiveSmoteTrainer::new(split, config.active.clone())?;
    let summary = trainer.train_default()?;

    log::info!(
        "Overall accuracy {:.4}, weighted f1 {:.4} over {} rounds",
        summary.overall_accuracy,
        summary.overall_weighted_avg.f1_score,
        summary.rounds
    );
    if let Some(report) = trainer.report() {
        log::info!("Final classification report:\n{}", report.render());
    }

    ensure_dir(output_dir)?;
    let model = output_dir.join("model.json");
    trainer.save_model(&model)?;

    let history = output_dir.join("history.csv");
    write_history_csv(&history, trainer.history())?;

    let config_json = serde_json::to_string_pretty(config).context("Failed to serialize config")?;
    let config_path = output_dir.join("pneumo_config.json");
    std::fs::write(&config_path, &config_json)
        .with_context(|| format!("Failed to write config: {}", config_path.display()))?;

    let report = if write_report {
        let path = output_dir.join("report.html");
        save_report(&training_report(trainer.name(), trainer.history(), &config_json), &path)?;
        Some(path)
    } else {
        None
    };

    Ok(TrainOutput {
        summary,
        model,
        history,
        report,
    })
}
