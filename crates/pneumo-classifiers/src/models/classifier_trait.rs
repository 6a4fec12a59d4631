use std::path::Path;

use ndarray::{Array1, Array2};

use crate::error::{Result, Stage, TrainingError};

/// A small trait abstraction for the binary classifiers driven by the
/// trainers. Implementations are fitted once and then only queried, so a
/// fitted model can be shared behind an `Arc` across threads.
pub trait ClassifierModel: Send + Sync {
    /// Fit the model on two-label data.
    fn fit(&mut self, x: &Array2<f32>, y: &Array1<i32>) -> Result<()>;

    /// The two labels seen during `fit`, ascending. `None` before fitting.
    fn classes(&self) -> Option<[i32; 2]>;

    /// Class probabilities, shape `(n_samples, 2)`, columns ordered as `classes()`.
    fn predict_proba(&self, x: &Array2<f32>) -> Result<Array2<f32>>;

    /// Predicted labels (highest probability, ties to the smaller label).
    fn predict(&self, x: &Array2<f32>) -> Result<Array1<i32>> {
        let classes = self
            .classes()
            .ok_or_else(|| TrainingError::model(Stage::Evaluation, "model has not been fitted"))?;
        let proba = self.predict_proba(x)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| if row[1] > row[0] { classes[1] } else { classes[0] })
            .collect())
    }

    /// Label for a single feature vector.
    fn predict_row(&self, features: &[f32]) -> Result<i32> {
        let x = single_row(features)?;
        Ok(self.predict(&x)?[0])
    }

    /// `[p0, p1]` for a single feature vector.
    fn predict_row_proba(&self, features: &[f32]) -> Result<[f32; 2]> {
        let x = single_row(features)?;
        let proba = self.predict_proba(&x)?;
        Ok([proba[(0, 0)], proba[(0, 1)]])
    }

    /// Optional human readable name for the model
    fn name(&self) -> &str {
        "classifier"
    }

    /// Persist the fitted model as a JSON artifact, together with the names
    /// of the columns it was fitted on, in order.
    fn save(&self, path: &Path, feature_names: &[String]) -> anyhow::Result<()>;
}

fn single_row(features: &[f32]) -> Result<Array2<f32>> {
    Array2::from_shape_vec((1, features.len()), features.to_vec())
        .map_err(|e| TrainingError::shape(e.to_string()))
}

/// Sorted distinct labels, required to be exactly two.
pub(crate) fn binary_classes(y: &Array1<i32>) -> Result<[i32; 2]> {
    let mut labels: Vec<i32> = y.to_vec();
    labels.sort_unstable();
    labels.dedup();
    match labels.as_slice() {
        [a, b] => Ok([*a, *b]),
        _ => Err(TrainingError::model(
            Stage::Fit,
            format!("expected two classes, found {}", labels.len()),
        )),
    }
}

pub(crate) fn check_fit_input(x: &Array2<f32>, y: &Array1<i32>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(TrainingError::shape(format!(
            "{} feature rows but {} labels",
            x.nrows(),
            y.len()
        )));
    }
    if x.nrows() == 0 {
        return Err(TrainingError::model(Stage::Fit, "cannot fit with zero samples"));
    }
    Ok(())
}
