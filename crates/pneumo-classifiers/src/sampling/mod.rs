//! Resampling engine: uncertainty sampling, k-means diversity sampling and
//! SMOTE-NC synthesis.
pub mod engine;
pub mod kmeans;
pub mod smote;

pub use engine::{ResampleOutcome, ResamplingEngine, UncertaintySample};
pub use kmeans::{ClusterAssignment, KMeans};
pub use smote::{SamplingStrategy, Smote};
