#![allow(dead_code)]

use ndarray::{Array1, Array2};
use pneumo_classifiers::data_handling::{DatasetSplit, LabeledDataset};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Patient-like rows: two continuous vitals and one 3-level symptom score.
/// Minority (label 1) rows are shifted so the classes overlap only partly.
pub fn patients(n_major: usize, n_minor: usize, seed: u64) -> LabeledDataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = n_major + n_minor;
    let mut values = Vec::with_capacity(n * 3);
    let mut labels = Vec::with_capacity(n);
    for i in 0..n {
        let minor = i >= n_major;
        let shift = if minor { 1.5 } else { 0.0 };
        values.push(36.5 + shift + rng.gen::<f32>());
        values.push(70.0 + 10.0 * shift + 8.0 * rng.gen::<f32>());
        values.push(rng.gen_range(0..3) as f32);
        labels.push(i32::from(minor));
    }
    LabeledDataset::new(
        Array2::from_shape_vec((n, 3), values).unwrap(),
        Array1::from_vec(labels),
        vec!["temperature".into(), "pulse".into(), "cough".into()],
        "risk",
    )
    .unwrap()
    .with_categorical_indices(vec![2])
    .unwrap()
}

/// 100 training rows (80 majority / 20 minority) and a 40-row test set
/// holding both classes.
pub fn scenario_split() -> DatasetSplit {
    DatasetSplit::new(patients(80, 20, 1), patients(32, 8, 2)).unwrap()
}

/// Route library logs to the test harness (`RUST_LOG=pneumo_classifiers=info`).
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
