use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::{ModelConfig, ModelType};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::gbdt::GbdtClassifier;
use crate::models::random_forest::RandomForestClassifier;

/// Build a boxed, unfitted classifier from a `ModelConfig`.
///
/// `seed` drives every random choice the model makes while fitting.
pub fn build_model(params: &ModelConfig, seed: u64) -> Box<dyn ClassifierModel> {
    match &params.model_type {
        ModelType::RandomForest {
            n_estimators,
            max_depth,
            min_samples_split,
            max_features,
        } => Box::new(
            RandomForestClassifier::new(*n_estimators)
                .with_max_depth(*max_depth)
                .with_min_samples_split(*min_samples_split)
                .with_max_features(*max_features)
                .with_seed(seed),
        ),
        ModelType::GBDT { .. } => Box::new(GbdtClassifier::new(params.clone())),
    }
}

#[derive(Serialize)]
struct ArtifactRef<'a, M> {
    kind: &'a str,
    feature_names: &'a [String],
    model: &'a M,
}

#[derive(Deserialize)]
struct Artifact<M> {
    kind: String,
    feature_names: Vec<String>,
    model: M,
}

/// A model read back from disk with the feature columns it expects.
pub struct SavedModel {
    pub model: Box<dyn ClassifierModel>,
    /// Column names in the order the model consumes them.
    pub feature_names: Vec<String>,
}

/// Write a fitted model as `{"kind": ..., "feature_names": [...], "model": ...}`.
pub(crate) fn write_artifact<M: Serialize>(
    path: &Path,
    kind: &str,
    feature_names: &[String],
    model: &M,
) -> anyhow::Result<()> {
    let json = serde_json::to_string(&ArtifactRef {
        kind,
        feature_names,
        model,
    })
    .with_context(|| format!("Failed to serialize {} model", kind))?;
    fs::write(path, json).with_context(|| format!("Failed to write model to {}", path.display()))?;
    log::info!("Saved {} model to {}", kind, path.display());
    Ok(())
}

fn read_artifact<M>(value: serde_json::Value, path: &Path) -> anyhow::Result<SavedModel>
where
    M: ClassifierModel + DeserializeOwned + 'static,
{
    let artifact: Artifact<M> = serde_json::from_value(value)
        .with_context(|| format!("Malformed model artifact: {}", path.display()))?;
    log::debug!(
        "Loaded {} model ({} features) from {}",
        artifact.kind,
        artifact.feature_names.len(),
        path.display()
    );
    Ok(SavedModel {
        model: Box::new(artifact.model),
        feature_names: artifact.feature_names,
    })
}

/// Load a model previously written by `ClassifierModel::save`.
pub fn load_model(path: &Path) -> anyhow::Result<SavedModel> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read model file: {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse model JSON: {}", path.display()))?;

    let kind = value
        .get("kind")
        .and_then(|k| k.as_str())
        .map(str::to_string)
        .with_context(|| format!("Model artifact has no \"kind\": {}", path.display()))?;

    match kind.as_str() {
        "random_forest" => read_artifact::<RandomForestClassifier>(value, path),
        "gbdt" => read_artifact::<GbdtClassifier>(value, path),
        other => bail!("Unknown model kind '{}' in {}", other, path.display()),
    }
}
