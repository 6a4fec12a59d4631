use std::path::Path;

use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::config::{ModelConfig, ModelType};
use crate::error::{Result, Stage, TrainingError};
use crate::models::classifier_trait::{binary_classes, check_fit_input, ClassifierModel};
use crate::models::factory::write_artifact;

/// Gradient Boosting Decision Tree (GBDT) classifier
#[derive(Serialize, Deserialize)]
pub struct GbdtClassifier {
    model: Option<GBDT>,
    params: ModelConfig,
    classes: Option<[i32; 2]>,
    n_features: usize,
}

impl GbdtClassifier {
    pub fn new(params: ModelConfig) -> Self {
        GbdtClassifier {
            model: None,
            params,
            classes: None,
            n_features: 0,
        }
    }

    /// Training target for the positive/negative class under the given loss.
    fn encode_label(loss_type: &str, positive: bool) -> Result<f32> {
        match loss_type {
            "LogLikelyhood" => Ok(if positive { 1.0 } else { -1.0 }),
            "BinaryLogistic" => Ok(if positive { 1.0 } else { 0.0 }),
            other => Err(TrainingError::model(
                Stage::Fit,
                format!("unsupported GBDT loss for classification: {}", other),
            )),
        }
    }

    fn to_data(x: &Array2<f32>) -> DataVec {
        let mut data = DataVec::new();
        for row in x.rows() {
            data.push(Data::new_training_data(row.to_vec(), 1.0, 0.0, None));
        }
        data
    }
}

impl ClassifierModel for GbdtClassifier {
    fn fit(&mut self, x: &Array2<f32>, y: &Array1<i32>) -> Result<()> {
        check_fit_input(x, y)?;
        let classes = binary_classes(y)?;

        match &self.params.model_type {
            ModelType::GBDT {
                learning_rate,
                max_depth,
                num_boost_round,
                debug,
                training_optimization_level,
                loss_type,
            } => {
                let mut config = Config::new();

                config.set_feature_size(x.ncols());
                config.set_shrinkage(*learning_rate);
                config.set_max_depth(*max_depth);
                config.set_iterations(*num_boost_round as usize);
                config.set_debug(*debug);
                config.set_training_optimization_level(*training_optimization_level);
                config.set_loss(loss_type);

                let mut gbdt = GBDT::new(&config);

                let mut train_x = DataVec::new();
                for (row, &label) in x.rows().into_iter().zip(y.iter()) {
                    let target = Self::encode_label(loss_type, label == classes[1])?;
                    train_x.push(Data::new_training_data(row.to_vec(), 1.0, target, None));
                }

                gbdt.fit(&mut train_x);
                log::trace!(
                    "Fitted GBDT: {} rounds on {} rows x {} features",
                    num_boost_round,
                    x.nrows(),
                    x.ncols()
                );

                self.model = Some(gbdt);
                self.classes = Some(classes);
                self.n_features = x.ncols();
                Ok(())
            }
            other => Err(TrainingError::model(
                Stage::Fit,
                format!("expected GBDT parameters, got {}", other.name()),
            )),
        }
    }

    fn classes(&self) -> Option<[i32; 2]> {
        self.classes
    }

    fn predict_proba(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| TrainingError::model(Stage::Evaluation, "model has not been fitted"))?;
        if x.ncols() != self.n_features {
            return Err(TrainingError::shape(format!(
                "model expects {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }

        // Both supported losses make `predict` return P(positive class).
        let positive = model.predict(&Self::to_data(x));
        let mut out = Array2::<f32>::zeros((x.nrows(), 2));
        for (r, p) in positive.into_iter().enumerate() {
            let p = p.clamp(0.0, 1.0);
            out[(r, 0)] = 1.0 - p;
            out[(r, 1)] = p;
        }
        Ok(out)
    }

    fn name(&self) -> &str {
        "gbdt"
    }

    fn save(&self, path: &Path, feature_names: &[String]) -> anyhow::Result<()> {
        write_artifact(path, self.name(), feature_names, self)
    }
}
