//! IO utilities: CSV table loading and CSV result files.
pub mod csv_table;

use std::path::Path;

use anyhow::{Context, Result};

use crate::evaluator::{MetricComparison, TrialResult};
use crate::metrics::ClassMetrics;
use crate::trainer::TrainingHistory;

pub use csv_table::{read_feature_csv, read_labeled_csv, CsvTableConfig};

fn writer(path: &Path) -> Result<csv::Writer<std::fs::File>> {
    csv::Writer::from_path(path).with_context(|| format!("Failed to create CSV file: {}", path.display()))
}

/// One row per trial: `Test, accuracy, precision, recall, f1-score, Average`.
pub fn write_trial_results(path: &Path, trials: &[TrialResult]) -> Result<()> {
    let mut wtr = writer(path)?;
    wtr.write_record(["Test", "accuracy", "precision", "recall", "f1-score", "Average"])?;
    for t in trials {
        wtr.write_record(&[
            t.trial.to_string(),
            t.accuracy.to_string(),
            t.precision.to_string(),
            t.recall.to_string(),
            t.f1_score.to_string(),
            t.average().to_string(),
        ])?;
    }
    wtr.flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// One row per metric: `Metrics, t-value, p-value`.
pub fn write_comparison(path: &Path, comparisons: &[MetricComparison]) -> Result<()> {
    let mut wtr = writer(path)?;
    wtr.write_record(["Metrics", "t-value", "p-value"])?;
    for c in comparisons {
        wtr.write_record(&[c.metric.name().to_string(), c.t_value.to_string(), c.p_value.to_string()])?;
    }
    wtr.flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn metric_columns(prefix: &str) -> [String; 3] {
    [
        format!("{}_precision", prefix),
        format!("{}_recall", prefix),
        format!("{}_f1-score", prefix),
    ]
}

fn metric_values(m: &ClassMetrics) -> [String; 3] {
    [m.precision.to_string(), m.recall.to_string(), m.f1_score.to_string()]
}

/// Per-round metrics of a training run.
pub fn write_history_csv(path: &Path, history: &TrainingHistory) -> Result<()> {
    let mut wtr = writer(path)?;

    let mut header = vec!["round".to_string(), "accuracy".to_string()];
    for prefix in ["minority", "majority", "weighted_avg", "macro_avg"] {
        header.extend(metric_columns(prefix));
    }
    header.extend(["grown_size", "minority_count", "synthetic_rows"].map(str::to_string));
    wtr.write_record(&header)?;

    for r in history.rounds() {
        let mut row = vec![r.round.to_string(), r.accuracy.to_string()];
        for m in [&r.minority, &r.majority, &r.weighted_avg, &r.macro_avg] {
            row.extend(metric_values(m));
        }
        row.extend([
            r.grown_size.to_string(),
            r.minority_count.to_string(),
            r.synthetic_rows.to_string(),
        ]);
        wtr.write_record(&row)?;
    }
    wtr.flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
