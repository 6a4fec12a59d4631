//! Small preprocessing utilities shared by the samplers and models.
//!
//! Provides a column-wise mean/std `Scaler` (used by SMOTE-NC to weigh
//! categorical mismatches against continuous spread) and helpers to split
//! feature columns into continuous and categorical groups.

use ndarray::Array2;

/// Simple standard scaler (per-column mean/std).
#[derive(Clone, Debug)]
pub struct Scaler {
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

impl Scaler {
    /// Floor applied to every column std.
    const MIN_STD: f32 = 1e-6;
}

/// Fit a `Scaler` from an `Array2<f32>` where rows are samples and
/// columns are features. An empty matrix yields zero means and `MIN_STD`.
pub fn fit_scaler(x: &Array2<f32>) -> Scaler {
    let (nrows, ncols) = x.dim();
    if nrows == 0 {
        return Scaler {
            mean: vec![0.0; ncols],
            std: vec![Scaler::MIN_STD; ncols],
        };
    }

    let nrows_f = nrows as f32;
    let mean: Vec<f32> = x.columns().into_iter().map(|c| c.sum() / nrows_f).collect();
    let std = x
        .columns()
        .into_iter()
        .zip(mean.iter())
        .map(|(c, &m)| {
            let var = c.iter().map(|&v| (v - m) * (v - m)).sum::<f32>() / nrows_f;
            var.sqrt().max(Scaler::MIN_STD)
        })
        .collect();

    Scaler { mean, std }
}

/// Indices of columns that are not in `categorical`.
pub fn continuous_columns(n_features: usize, categorical: &[usize]) -> Vec<usize> {
    (0..n_features).filter(|c| !categorical.contains(c)).collect()
}

/// Median of the stds of the given columns; 0 when there are none.
///
/// SMOTE-NC adds the square of this value to the distance for every
/// categorical feature on which two rows disagree.
pub fn median_std(sc: &Scaler, columns: &[usize]) -> f32 {
    let mut stds: Vec<f32> = columns.iter().map(|&c| sc.std[c]).collect();
    if stds.is_empty() {
        return 0.0;
    }
    stds.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = stds.len() / 2;
    if stds.len() % 2 == 0 {
        (stds[mid - 1] + stds[mid]) / 2.0
    } else {
        stds[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaler_and_median_std() {
        let x = Array2::from_shape_vec((4, 3), vec![
            1.0, 0.0, 10.0,
            3.0, 0.0, 10.0,
            1.0, 1.0, 30.0,
            3.0, 1.0, 30.0,
        ])
        .unwrap();
        let sc = fit_scaler(&x);
        assert_eq!(sc.mean, vec![2.0, 0.5, 20.0]);
        assert_eq!(sc.std, vec![1.0, 0.5, 10.0]);

        // column 1 treated as categorical
        let cont = continuous_columns(3, &[1]);
        assert_eq!(cont, vec![0, 2]);
        assert!((median_std(&sc, &cont) - 5.5).abs() < 1e-6);
    }
}
