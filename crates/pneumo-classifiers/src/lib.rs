//! pneumo-classifiers: active-learning resampling for clinical risk models.
//!
//! This crate provides the resampling engine (uncertainty sampling, k-means
//! diversity sampling and SMOTE-NC synthesis), ensemble classifier wrappers
//! (random forest, GBDT), the iterative and baseline trainers built on them,
//! and the paired-comparison evaluator used to decide between the two.
//!
//! Data flows as `ndarray` matrices wrapped in `LabeledDataset`; every random
//! draw goes through an explicitly seeded generator so repeated runs are
//! reproducible.
pub mod config;
pub mod data_handling;
pub mod error;
pub mod evaluator;
pub mod io;
pub mod metrics;
pub mod models;
pub mod preprocessing;
pub mod report;
pub mod sampling;
pub mod stats;
pub mod trainer;

pub use error::{Result, Stage, TrainingError};
