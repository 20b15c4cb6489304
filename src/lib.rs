//! Kolosal XGBoost trainer
//!
//! Batch training of a scaler + gradient boosted tree classifier:
//! grid search under stratified k-fold cross-validation, evaluation on a
//! held-out table, a text classification report and a PMML 4.4 export.
//!
//! # Modules
//!
//! - [`utils`] - CSV loading of labeled feature tables
//! - [`preprocessing`] - Standard scaling and class label encoding
//! - [`training`] - Boosted trees, the pipeline, cross-validation, metrics, the run engine
//! - [`optimizer`] - Parameter grid and grid search
//! - [`export`] - PMML document model, writer and scorer
//! - [`config`] - Run configuration
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Core ML modules
pub mod preprocessing;
pub mod training;
pub mod optimizer;

// Utilities
pub mod export;
pub mod utils;

// Services
pub mod cli;

pub use error::{Result, TrainerError};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{Result, TrainerError};

    // Configuration
    pub use crate::config::RunConfig;

    // Preprocessing
    pub use crate::preprocessing::{ClassLabel, LabelEncoder, StandardScaler};

    // Training
    pub use crate::training::{
        ClassificationReport, CrossValidator, CVStrategy, Pipeline, TrainEngine, TrainingOutcome,
        XGBoostClassifier, XGBoostConfig,
    };

    // Optimization
    pub use crate::optimizer::{GridSearchCV, GridSearchConfig, ParamGrid, ParameterValue, Scoring};

    // Export
    pub use crate::export::{export_pipeline, pipeline_to_pmml, PMMLExporter, PMMLScorer};

    // Data loading
    pub use crate::utils::{DataLoader, LabeledTable};
}
