//! `pneumo compare`: paired trials of the active learner against the
//! one-shot SMOTE baseline.
use std::path::Path;

use anyhow::{Context, Result};

use pneumo_classifiers::evaluator::{ComparativeEvaluator, ComparisonReport, Side};
use pneumo_classifiers::report::{comparison_report, save_report};
use pneumo_classifiers::trainer::{ActiveSmoteTrainer, SmoteBaselineTrainer};

use crate::commands::{ensure_dir, load_split};
use crate::config::PipelineConfig;

pub fn run_compare(data: &Path, config: &PipelineConfig, output_dir: &Path, write_report: bool) -> Result<ComparisonReport> {
    let split = load_split(data, config)?;
    let active = ActiveSmoteTrainer::new(split.clone(), config.active.clone())?;
    let baseline = SmoteBaselineTrainer::new(split, config.baseline.clone())?;

    let evaluator = ComparativeEvaluator::new(config.evaluator.clone());
    let report = evaluator.run(&active, &baseline, config.evaluator.num_trials)?;

    ensure_dir(output_dir)?;
    report.save(output_dir)?;
    if write_report {
        let config_json = serde_json::to_string_pretty(config).context("Failed to serialize config")?;
        save_report(&comparison_report(&report, &config_json), &output_dir.join("comparison.html"))?;
    }
    Ok(report)
}

/// Plain-text t-test table.
pub fn render_comparison(report: &ComparisonReport) -> String {
    let mut out = format!(
        "{:<12}{:>14}{:>16}{:>10}{:>10}\n",
        "metric", report.trainer_a, report.trainer_b, "t-value", "p-value"
    );
    for c in &report.comparisons {
        let a = report.mean(Side::A, c.metric).unwrap_or(f64::NAN);
        let b = report.mean(Side::B, c.metric).unwrap_or(f64::NAN);
        out.push_str(&format!(
            "{:<12}{:>14.4}{:>16.4}{:>10.4}{:>10.4}\n",
            c.metric.name(),
            a,
            b,
            c.t_value,
            c.p_value
        ));
    }
    if !report.failed_trials.is_empty() {
        out.push_str(&format!("{} trial(s) skipped\n", report.failed_trials.len()));
    }
    out
}
