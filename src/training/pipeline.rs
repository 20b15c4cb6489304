//! Scaler + classifier pipeline
//!
//! Two named stages, `scaler` and `xgb`. Parameters are addressed as
//! `<stage>__<param>`, e.g. `xgb__max_depth` or `scaler__with_mean`.

use crate::error::{Result, TrainerError};
use crate::optimizer::{ParameterValue, TrialParams};
use crate::preprocessing::{ClassLabel, LabelEncoder, StandardScaler};
use crate::training::metrics::accuracy_score;
use crate::training::xgboost::{XGBoostClassifier, XGBoostConfig};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

pub const SCALER_STEP: &str = "scaler";
pub const CLASSIFIER_STEP: &str = "xgb";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    scaler: StandardScaler,
    classifier: XGBoostClassifier,
    encoder: LabelEncoder,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(StandardScaler::new(), XGBoostConfig::default())
    }
}

impl Pipeline {
    pub fn new(scaler: StandardScaler, config: XGBoostConfig) -> Self {
        Self {
            scaler,
            classifier: XGBoostClassifier::new(config),
            encoder: LabelEncoder::new(),
        }
    }

    /// Apply one `<stage>__<param>` setting
    pub fn set_param(&mut self, key: &str, value: &ParameterValue) -> Result<()> {
        let invalid = |reason: &str| TrainerError::InvalidParameter {
            name: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let (stage, param) = key
            .split_once("__")
            .ok_or_else(|| invalid("expected <stage>__<param>"))?;

        match stage {
            SCALER_STEP => {
                let flag = value.as_bool().ok_or_else(|| invalid("expected a boolean"))?;
                self.scaler.set_param(param, flag)
            }
            CLASSIFIER_STEP => self.classifier.config_mut().set_param(param, value),
            _ => Err(invalid("unknown pipeline stage")),
        }
    }

    /// Apply every setting of a grid point
    pub fn set_params(&mut self, params: &TrialParams) -> Result<()> {
        for (key, value) in params {
            self.set_param(key, value)?;
        }
        Ok(())
    }

    /// Fit the label encoder, the scaler and the classifier on `x`
    pub fn fit(&mut self, x: &Array2<f64>, y: &[ClassLabel]) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(TrainerError::ShapeError {
                expected: format!("{} labels", x.nrows()),
                actual: format!("{} labels", y.len()),
            });
        }
        let encoded = self.encoder.fit_transform(y)?;
        if self.encoder.n_classes() < 2 {
            return Err(TrainerError::TrainingError(
                "training labels contain a single class".to_string(),
            ));
        }
        let scaled = self.scaler.fit_transform(x)?;
        self.classifier.fit(&scaled, &encoded)
    }

    /// Class probabilities, columns ordered as [`Pipeline::classes`]
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted() {
            return Err(TrainerError::ModelNotFitted);
        }
        let scaled = self.scaler.transform(x)?;
        self.classifier.predict_proba(&scaled)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<ClassLabel>> {
        if !self.is_fitted() {
            return Err(TrainerError::ModelNotFitted);
        }
        let scaled = self.scaler.transform(x)?;
        let indices = self.classifier.predict(&scaled)?.to_vec();
        self.encoder.inverse_transform(&indices)
    }

    /// Accuracy of `predict(x)` against `y`
    pub fn score(&self, x: &Array2<f64>, y: &[ClassLabel]) -> Result<f64> {
        let preds = self.predict(x)?;
        Ok(accuracy_score(y, &preds))
    }

    pub fn is_fitted(&self) -> bool {
        self.classifier.is_fitted() && self.scaler.is_fitted() && self.encoder.is_fitted()
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn classifier(&self) -> &XGBoostClassifier {
        &self.classifier
    }

    pub fn classes(&self) -> &[ClassLabel] {
        self.encoder.classes()
    }
}
