//! Seeded k-means used to spread the minority candidates over the feature space.
//!
//! Centroids are seeded with k-means++ (first centroid uniform, later ones
//! drawn with probability proportional to the squared distance to the
//! nearest chosen centroid) and refined with Lloyd iterations.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::Rng;

use crate::error::{Result, Stage, TrainingError};

/// Partition of a row set into `k` clusters.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterAssignment {
    /// Cluster index for every input row
    pub labels: Vec<usize>,
    /// One centroid per cluster, shape `(k, n_features)`
    pub centroids: Array2<f32>,
    pub k: usize,
    /// Sum of squared distances of rows to their centroid
    pub inertia: f64,
}

impl ClusterAssignment {
    /// Row indices belonging to each cluster, in ascending order.
    pub fn members(&self) -> Vec<Vec<usize>> {
        let mut members = vec![Vec::new(); self.k];
        for (row, &cluster) in self.labels.iter().enumerate() {
            members[cluster].push(row);
        }
        members
    }

    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k];
        for &cluster in &self.labels {
            sizes[cluster] += 1;
        }
        sizes
    }
}

#[derive(Debug, Clone)]
pub struct KMeans {
    k: usize,
    max_iter: usize,
    tol: f64,
}

#[inline]
fn squared_distance(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = (*x - *y) as f64;
            d * d
        })
        .sum()
}

impl KMeans {
    pub fn new(k: usize) -> Self {
        KMeans {
            k,
            max_iter: 300,
            tol: 1e-4,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter.max(1);
        self
    }

    /// Cluster the rows of `x`.
    ///
    /// Fails with `InvalidSamplingConfiguration` when `k` is zero or larger
    /// than the number of rows.
    pub fn fit(&self, x: &Array2<f32>, rng: &mut StdRng) -> Result<ClusterAssignment> {
        let n = x.nrows();
        if self.k == 0 {
            return Err(TrainingError::sampling(Stage::Clustering, "k_clusters must be at least 1"));
        }
        if n < self.k {
            return Err(TrainingError::sampling(
                Stage::Clustering,
                format!("cannot form {} clusters from {} rows", self.k, n),
            ));
        }

        let mut centroids = self.init_centroids(x, rng);
        let mut labels = vec![0usize; n];

        for iter in 0..self.max_iter {
            for (i, row) in x.rows().into_iter().enumerate() {
                labels[i] = nearest(&centroids, row).0;
            }

            let mut sums = Array2::<f64>::zeros((self.k, x.ncols()));
            let mut counts = vec![0usize; self.k];
            for (i, row) in x.rows().into_iter().enumerate() {
                let c = labels[i];
                counts[c] += 1;
                for (j, &v) in row.iter().enumerate() {
                    sums[(c, j)] += v as f64;
                }
            }

            let mut shift = 0.0;
            for c in 0..self.k {
                // Empty clusters keep their previous centroid.
                if counts[c] == 0 {
                    continue;
                }
                let updated: Array1<f32> = sums.row(c).mapv(|s| (s / counts[c] as f64) as f32);
                shift += squared_distance(centroids.row(c), updated.view());
                centroids.row_mut(c).assign(&updated);
            }

            log::trace!("k-means iteration {}: centroid shift {:.6}", iter + 1, shift);
            if shift <= self.tol {
                break;
            }
        }

        let mut inertia = 0.0;
        for (i, row) in x.rows().into_iter().enumerate() {
            let (c, d) = nearest(&centroids, row);
            labels[i] = c;
            inertia += d;
        }

        Ok(ClusterAssignment {
            labels,
            centroids,
            k: self.k,
            inertia,
        })
    }

    fn init_centroids(&self, x: &Array2<f32>, rng: &mut StdRng) -> Array2<f32> {
        let n = x.nrows();
        let mut chosen: Vec<usize> = Vec::with_capacity(self.k);
        chosen.push(rng.gen_range(0..n));

        let mut min_dist: Vec<f64> = x
            .rows()
            .into_iter()
            .map(|row| squared_distance(row, x.row(chosen[0])))
            .collect();

        while chosen.len() < self.k {
            let total: f64 = min_dist.iter().sum();
            let next = if total <= 0.0 {
                // All rows coincide with a centroid; fall back to a uniform pick.
                rng.gen_range(0..n)
            } else {
                let threshold = rng.gen::<f64>() * total;
                let mut cumsum = 0.0;
                let mut next = n - 1;
                for (i, &d) in min_dist.iter().enumerate() {
                    cumsum += d;
                    if d > 0.0 && cumsum >= threshold {
                        next = i;
                        break;
                    }
                }
                next
            };
            chosen.push(next);

            for (i, row) in x.rows().into_iter().enumerate() {
                let d = squared_distance(row, x.row(next));
                if d < min_dist[i] {
                    min_dist[i] = d;
                }
            }
        }

        x.select(Axis(0), &chosen)
    }
}

/// Index of and squared distance to the closest centroid (first on ties).
fn nearest(centroids: &Array2<f32>, row: ArrayView1<f32>) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (c, centroid) in centroids.rows().into_iter().enumerate() {
        let d = squared_distance(row, centroid);
        if d < best.1 {
            best = (c, d);
        }
    }
    best
}
