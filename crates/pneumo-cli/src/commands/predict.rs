//! `pneumo predict`: score new rows with a saved classifier.
use std::io;
use std::path::Path;

use anyhow::{Context, Result};

use pneumo_classifiers::io::{read_feature_csv, CsvTableConfig};
use pneumo_classifiers::models::factory::load_model;

/// Predicted label and `[p0, p1]` for one input row.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub row: usize,
    pub label: i32,
    pub proba: [f32; 2],
}

pub fn run_predict(model_path: &Path, rows: &Path, table: &CsvTableConfig) -> Result<Vec<Prediction>> {
    let saved = load_model(model_path)?;
    let model = saved.model;
    let x = read_feature_csv(rows, table, &saved.feature_names)?;
    log::info!(
        "Scoring {} rows ({} features) with {}",
        x.nrows(),
        saved.feature_names.len(),
        model.name()
    );

    let labels = model
        .predict(&x)
        .with_context(|| format!("Failed to score {}", rows.display()))?;
    let proba = model.predict_proba(&x)?;

    Ok(labels
        .iter()
        .zip(proba.rows())
        .enumerate()
        .map(|(row, (&label, p))| Prediction {
            row: row + 1,
            label,
            proba: [p[0], p[1]],
        })
        .collect())
}

pub fn write_predictions<W: io::Write>(writer: W, predictions: &[Prediction]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["row", "prediction", "p0", "p1"])?;
    for p in predictions {
        wtr.write_record(&[
            p.row.to_string(),
            p.label.to_string(),
            p.proba[0].to_string(),
            p.proba[1].to_string(),
        ])?;
    }
    wtr.flush().context("Failed to write predictions")?;
    Ok(())
}
