//! Delimited patient-table reader.
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use csv::StringRecord;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::data_handling::LabeledDataset;

/// How to turn a CSV table into a `LabeledDataset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvTableConfig {
    /// Column holding the binary label.
    pub target: String,
    /// Columns removed before anything else happens.
    pub drop_columns: Vec<String>,
    /// Columns treated as categorical by the synthesizer.
    pub categorical_columns: Vec<String>,
    /// Per-column mapping from string value to numeric code.
    pub value_maps: BTreeMap<String, BTreeMap<String, f32>>,
}

impl Default for CsvTableConfig {
    fn default() -> Self {
        Self {
            target: "target".to_string(),
            drop_columns: Vec::new(),
            categorical_columns: Vec::new(),
            value_maps: BTreeMap::new(),
        }
    }
}

struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

fn read_raw(path: &Path) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read CSV header row")?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record: StringRecord = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(RawTable { headers, rows })
}

/// Numeric codes for one column.
///
/// Mapped columns go through their value map; numeric columns are parsed;
/// other columns are ordinal-encoded in sorted order when `allow_ordinal`.
fn encode_column(
    name: &str,
    values: &[&str],
    value_map: Option<&BTreeMap<String, f32>>,
    allow_ordinal: bool,
) -> Result<Vec<f32>> {
    if let Some(map) = value_map {
        return values
            .iter()
            .enumerate()
            .map(|(row, v)| {
                map.get(*v)
                    .copied()
                    .or_else(|| v.parse::<f32>().ok())
                    .ok_or_else(|| anyhow!("Unmapped value '{}' in column '{}' at row {}", v, name, row + 1))
            })
            .collect();
    }

    let parsed: Vec<Option<f32>> = values.iter().map(|v| v.parse::<f32>().ok()).collect();
    if parsed.iter().all(Option::is_some) {
        return Ok(parsed.into_iter().flatten().collect());
    }

    if !allow_ordinal {
        let (row, bad) = values
            .iter()
            .enumerate()
            .find(|(_, v)| v.parse::<f32>().is_err())
            .map(|(row, v)| (row + 1, *v))
            .unwrap_or((0, ""));
        bail!("Invalid numeric value '{}' in column '{}' at row {}", bad, name, row);
    }

    let levels: BTreeSet<&str> = values.iter().copied().collect();
    let codes: BTreeMap<&str, f32> = levels.into_iter().enumerate().map(|(i, v)| (v, i as f32)).collect();
    log::debug!("Ordinal-encoded column '{}' with {} levels", name, codes.len());
    Ok(values.iter().map(|v| codes[v]).collect())
}

fn encode_table(raw: &RawTable, keep: &[usize], config: &CsvTableConfig, allow_ordinal: &dyn Fn(&str) -> bool) -> Result<Array2<f32>> {
    let n_rows = raw.rows.len();
    let mut table = Array2::<f32>::zeros((n_rows, keep.len()));

    for (out_col, &col) in keep.iter().enumerate() {
        let name = raw.headers[col].as_str();
        let values: Vec<&str> = raw
            .rows
            .iter()
            .enumerate()
            .map(|(row, r)| {
                r.get(col)
                    .map(String::as_str)
                    .ok_or_else(|| anyhow!("Missing value for column '{}' at row {}", name, row + 1))
            })
            .collect::<Result<_>>()?;
        let encoded = encode_column(name, &values, config.value_maps.get(name), allow_ordinal(name))?;
        for (row, v) in encoded.into_iter().enumerate() {
            table[(row, out_col)] = v;
        }
    }
    Ok(table)
}

/// Read a CSV table into a `LabeledDataset`.
///
/// Dropped columns are removed first; the target column must remain. Target
/// values must be integral after encoding.
pub fn read_labeled_csv(path: &Path, config: &CsvTableConfig) -> Result<LabeledDataset> {
    let raw = read_raw(path)?;
    if !raw.headers.iter().any(|h| h == &config.target) {
        bail!("Missing target column '{}' in {}", config.target, path.display());
    }
    if config.drop_columns.contains(&config.target) {
        bail!("Target column '{}' cannot be dropped", config.target);
    }

    let keep: Vec<usize> = (0..raw.headers.len())
        .filter(|&i| !config.drop_columns.contains(&raw.headers[i]))
        .collect();
    let names: Vec<String> = keep.iter().map(|&i| raw.headers[i].clone()).collect();

    let ordinal = |name: &str| name == config.target || config.categorical_columns.iter().any(|c| c == name);
    let table = encode_table(&raw, &keep, config, &ordinal)?;

    if let Some(target_col) = names.iter().position(|n| n == &config.target) {
        if let Some(bad) = table.column(target_col).iter().find(|v| v.fract() != 0.0) {
            bail!("Target column '{}' holds non-integer value {}", config.target, bad);
        }
    }

    let dataset = LabeledDataset::from_table(table, names, &config.target)?
        .with_categorical_features(&config.categorical_columns)?;

    log::debug!(
        "Read {} rows x {} features from {}",
        dataset.nrows(),
        dataset.ncols(),
        path.display()
    );
    Ok(dataset)
}

/// Read feature rows for prediction.
///
/// Columns are picked by header name in the order of `feature_names`, so the
/// file may hold them in any order and carry extra columns. A feature that
/// is absent or listed in `drop_columns` is an error. Values must be numeric
/// or covered by a value map.
pub fn read_feature_csv(path: &Path, config: &CsvTableConfig, feature_names: &[String]) -> Result<Array2<f32>> {
    if feature_names.is_empty() {
        bail!("No feature columns requested from {}", path.display());
    }
    let raw = read_raw(path)?;

    let mut keep = Vec::with_capacity(feature_names.len());
    let mut missing = Vec::new();
    for name in feature_names {
        match raw.headers.iter().position(|h| h == name) {
            Some(col) if !config.drop_columns.contains(name) => keep.push(col),
            _ => missing.push(name.as_str()),
        }
    }
    if !missing.is_empty() {
        bail!("Missing feature columns in {}: {}", path.display(), missing.join(", "));
    }

    encode_table(&raw, &keep, config, &|_: &str| false)
}
