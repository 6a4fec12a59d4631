use std::path::Path;

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, Stage, TrainingError};
use crate::models::classifier_trait::{binary_classes, check_fit_input, ClassifierModel};
use crate::models::factory::write_artifact;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        proba: [f32; 2],
    },
    Split {
        feature: usize,
        threshold: f32,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn leaf_proba(&self, row: &[f32]) -> [f32; 2] {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { proba } => return *proba,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Random forest of Gini-split CART trees.
///
/// Each tree is grown on a bootstrap sample with its own generator seeded
/// from `seed + tree_index`, so trees can be built in parallel and the
/// fitted forest only depends on the seed and the data. Class
/// probabilities are the mean of the leaf class frequencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    n_estimators: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    max_features: Option<usize>,
    seed: u64,
    n_features: usize,
    classes: Option<[i32; 2]>,
    trees: Vec<TreeNode>,
}

impl RandomForestClassifier {
    pub fn new(n_estimators: usize) -> Self {
        RandomForestClassifier {
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            max_features: None,
            seed: 42,
            n_features: 0,
            classes: None,
            trees: Vec::new(),
        }
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split.max(2);
        self
    }

    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Depth of the deepest tree.
    pub fn max_tree_depth(&self) -> usize {
        self.trees.iter().map(TreeNode::depth).max().unwrap_or(0)
    }

    fn features_per_split(&self, n_features: usize) -> usize {
        let m = self
            .max_features
            .unwrap_or_else(|| (n_features as f64).sqrt().floor() as usize);
        m.clamp(1, n_features.max(1))
    }
}

struct TreeBuilder<'a> {
    x: &'a Array2<f32>,
    y: &'a [usize],
    max_depth: Option<usize>,
    min_samples_split: usize,
    max_features: usize,
}

fn gini(counts: [usize; 2]) -> f64 {
    let n = (counts[0] + counts[1]) as f64;
    if n == 0.0 {
        return 0.0;
    }
    let p0 = counts[0] as f64 / n;
    let p1 = counts[1] as f64 / n;
    1.0 - p0 * p0 - p1 * p1
}

impl<'a> TreeBuilder<'a> {
    fn counts(&self, indices: &[usize]) -> [usize; 2] {
        let mut counts = [0usize; 2];
        for &i in indices {
            counts[self.y[i]] += 1;
        }
        counts
    }

    fn build(&self, indices: Vec<usize>, depth: usize, rng: &mut StdRng) -> TreeNode {
        let counts = self.counts(&indices);
        let n = indices.len();
        let leaf = TreeNode::Leaf {
            proba: [counts[0] as f32 / n as f32, counts[1] as f32 / n as f32],
        };

        let pure = counts[0] == 0 || counts[1] == 0;
        let too_small = n < self.min_samples_split;
        let too_deep = self.max_depth.map_or(false, |d| depth >= d);
        if pure || too_small || too_deep {
            return leaf;
        }

        let Some((feature, threshold)) = self.best_split(&indices, counts, rng) else {
            return leaf;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.x[(i, feature)] <= threshold);
        if left.is_empty() || right.is_empty() {
            return leaf;
        }

        TreeNode::Split {
            feature,
            threshold,
            left: Box::new(self.build(left, depth + 1, rng)),
            right: Box::new(self.build(right, depth + 1, rng)),
        }
    }

    /// Best (feature, threshold) by weighted Gini impurity over a random
    /// subset of `max_features` features. Further features are only visited
    /// while no impurity-reducing split has been found.
    fn best_split(&self, indices: &[usize], parent: [usize; 2], rng: &mut StdRng) -> Option<(usize, f32)> {
        let n = indices.len();
        let parent_impurity = gini(parent);

        let mut features: Vec<usize> = (0..self.x.ncols()).collect();
        features.shuffle(rng);

        let mut best: Option<(usize, f32, f64)> = None;
        let mut pairs: Vec<(f32, usize)> = Vec::with_capacity(n);

        for (visited, &feature) in features.iter().enumerate() {
            if visited >= self.max_features && best.is_some() {
                break;
            }

            pairs.clear();
            pairs.extend(indices.iter().map(|&i| (self.x[(i, feature)], self.y[i])));
            pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            let mut left = [0usize; 2];
            for k in 0..n - 1 {
                left[pairs[k].1] += 1;
                let (lo, hi) = (pairs[k].0, pairs[k + 1].0);
                if lo >= hi {
                    continue;
                }
                let n_left = k + 1;
                let right = [parent[0] - left[0], parent[1] - left[1]];
                let impurity = (n_left as f64 * gini(left) + (n - n_left) as f64 * gini(right)) / n as f64;

                if impurity + 1e-12 < parent_impurity
                    && best.map_or(true, |(_, _, b)| impurity + 1e-12 < b)
                {
                    let mut threshold = lo + (hi - lo) / 2.0;
                    if threshold >= hi {
                        threshold = lo;
                    }
                    best = Some((feature, threshold, impurity));
                }
            }
        }

        best.map(|(feature, threshold, _)| (feature, threshold))
    }
}

impl ClassifierModel for RandomForestClassifier {
    fn fit(&mut self, x: &Array2<f32>, y: &Array1<i32>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.n_estimators == 0 {
            return Err(TrainingError::model(Stage::Fit, "n_estimators must be at least 1"));
        }
        let classes = binary_classes(y)?;
        let y_idx: Vec<usize> = y.iter().map(|&v| usize::from(v == classes[1])).collect();
        let n_samples = x.nrows();

        let builder = TreeBuilder {
            x,
            y: &y_idx,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            max_features: self.features_per_split(x.ncols()),
        };

        let seed = self.seed;
        let trees: Vec<TreeNode> = (0..self.n_estimators)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(t as u64));
                let bootstrap: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
                builder.build(bootstrap, 0, &mut rng)
            })
            .collect();

        log::trace!(
            "Fitted random forest: {} trees on {} rows x {} features",
            trees.len(),
            n_samples,
            x.ncols()
        );

        self.trees = trees;
        self.classes = Some(classes);
        self.n_features = x.ncols();
        Ok(())
    }

    fn classes(&self) -> Option<[i32; 2]> {
        self.classes
    }

    fn predict_proba(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        if self.trees.is_empty() {
            return Err(TrainingError::model(Stage::Evaluation, "model has not been fitted"));
        }
        if x.ncols() != self.n_features {
            return Err(TrainingError::shape(format!(
                "model expects {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }

        let n_trees = self.trees.len() as f32;
        let mut out = Array2::<f32>::zeros((x.nrows(), 2));
        for (r, row) in x.rows().into_iter().enumerate() {
            let row = row.to_vec();
            let mut acc = [0f32; 2];
            for tree in &self.trees {
                let p = tree.leaf_proba(&row);
                acc[0] += p[0];
                acc[1] += p[1];
            }
            out[(r, 0)] = acc[0] / n_trees;
            out[(r, 1)] = acc[1] / n_trees;
        }
        Ok(out)
    }

    fn name(&self) -> &str {
        "random_forest"
    }

    fn save(&self, path: &Path, feature_names: &[String]) -> anyhow::Result<()> {
        write_artifact(path, self.name(), feature_names, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Array2<f32>, Array1<i32>) {
        let x = Array2::from_shape_vec(
            (8, 2),
            vec![
                0.1, 5.0, 0.2, 4.0, 0.3, 6.0, 0.4, 5.5, //
                0.9, 5.0, 1.0, 4.5, 1.1, 6.0, 1.2, 4.0,
            ],
        )
        .unwrap();
        let y = Array1::from_vec(vec![0, 0, 0, 0, 1, 1, 1, 1]);
        (x, y)
    }

    #[test]
    fn test_random_forest_separates_classes() {
        let (x, y) = separable();
        let mut rf = RandomForestClassifier::new(25).with_seed(7).with_max_features(Some(2));
        rf.fit(&x, &y).unwrap();

        assert_eq!(rf.n_trees(), 25);
        assert_eq!(rf.predict(&x).unwrap(), y);

        let proba = rf.predict_proba(&x).unwrap();
        for row in proba.rows() {
            assert!((row[0] + row[1] - 1.0).abs() < 1e-5);
        }
        assert!(rf.predict_row_proba(&[1.15, 5.0]).unwrap()[1] > 0.5);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = separable();
        let mut a = RandomForestClassifier::new(10).with_seed(3);
        let mut b = RandomForestClassifier::new(10).with_seed(3);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.trees, b.trees);
    }

    #[test]
    fn test_max_depth_is_respected() {
        let (x, y) = separable();
        let mut rf = RandomForestClassifier::new(5).with_max_depth(Some(1));
        rf.fit(&x, &y).unwrap();
        assert!(rf.max_tree_depth() <= 1);
    }

    #[test]
    fn test_single_class_is_rejected() {
        let (x, _) = separable();
        let y = Array1::from_vec(vec![1; 8]);
        let err = RandomForestClassifier::new(3).fit(&x, &y).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Fit));
    }
}
