//! Run configuration

use crate::error::{Result, TrainerError};
use crate::optimizer::{GridSearchConfig, ParamGrid, Scoring};
use crate::training::cross_validation::CVStrategy;
use crate::training::pipeline::Pipeline;
use crate::training::xgboost::XGBoostConfig;
use crate::preprocessing::StandardScaler;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DATA_DIR: &str = "./data";
pub const MODEL_DIR: &str = "./model_training";

/// Everything one training run needs; `Default` is the standard run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub data_dir: PathBuf,
    pub model_dir: PathBuf,

    pub x_train_file: String,
    pub y_train_file: String,
    pub x_test_file: String,
    pub y_test_file: String,
    pub report_file: String,
    pub pmml_file: String,

    /// Sample identifier column present in every input table
    pub index_column: String,
    /// Class column of the label tables
    pub label_column: String,
    /// Target field name written to the PMML document
    pub target_name: String,

    pub param_grid: ParamGrid,
    pub cv_folds: usize,
    pub scoring: Scoring,
    pub n_jobs: Option<usize>,
    pub random_state: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DATA_DIR),
            model_dir: PathBuf::from(MODEL_DIR),
            x_train_file: "X_train.csv".to_string(),
            y_train_file: "y_train.csv".to_string(),
            x_test_file: "X_test.csv".to_string(),
            y_test_file: "y_test.csv".to_string(),
            report_file: "classification_report_xgboost.txt".to_string(),
            pmml_file: "xgboost_model.pmml".to_string(),
            index_column: "idx".to_string(),
            label_column: "label".to_string(),
            target_name: "label".to_string(),
            param_grid: default_param_grid(),
            cv_folds: 3,
            scoring: Scoring::Accuracy,
            n_jobs: None,
            random_state: 42,
        }
    }
}

/// 2 x 2 x 2 x 1 x 1 = 8 candidates
pub fn default_param_grid() -> ParamGrid {
    ParamGrid::new()
        .add("xgb__n_estimators", vec![100i64, 200])
        .add("xgb__max_depth", vec![4i64, 6])
        .add("xgb__learning_rate", vec![0.05, 0.1])
        .add("xgb__subsample", vec![0.8])
        .add("xgb__colsample_bytree", vec![0.8])
}

impl RunConfig {
    /// Load from a JSON file; missing keys keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            TrainerError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cv_folds < 2 {
            return Err(TrainerError::ConfigError(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if self.n_jobs == Some(0) {
            return Err(TrainerError::ConfigError("n_jobs must be positive".to_string()));
        }
        self.param_grid.validate()
    }

    pub fn x_train_path(&self) -> PathBuf {
        self.data_dir.join(&self.x_train_file)
    }

    pub fn y_train_path(&self) -> PathBuf {
        self.data_dir.join(&self.y_train_file)
    }

    pub fn x_test_path(&self) -> PathBuf {
        self.data_dir.join(&self.x_test_file)
    }

    pub fn y_test_path(&self) -> PathBuf {
        self.data_dir.join(&self.y_test_file)
    }

    pub fn report_path(&self) -> PathBuf {
        self.model_dir.join(&self.report_file)
    }

    pub fn pmml_path(&self) -> PathBuf {
        self.model_dir.join(&self.pmml_file)
    }

    /// Stratified folds without shuffling
    pub fn search_config(&self) -> GridSearchConfig {
        let mut config = GridSearchConfig::new()
            .with_cv(CVStrategy::StratifiedKFold { n_splits: self.cv_folds, shuffle: false })
            .with_scoring(self.scoring)
            .with_random_state(self.random_state);
        config.n_jobs = self.n_jobs;
        config
    }

    /// Unfitted scaler + classifier seeded with `random_state`
    pub fn base_pipeline(&self) -> Pipeline {
        let xgb = XGBoostConfig {
            random_state: Some(self.random_state),
            ..XGBoostConfig::default()
        };
        Pipeline::new(StandardScaler::new(), xgb)
    }
}
