pub mod gbdt;
pub mod random_forest;

pub mod classifier_trait;
pub mod factory;
