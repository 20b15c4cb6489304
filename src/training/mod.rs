//! Model training module
//!
//! Provides the pieces of a training run:
//! - XGBoost-style gradient boosted trees (binary logistic and softmax)
//! - Scaler + classifier pipeline with `<stage>__<param>` addressing
//! - K-fold and stratified k-fold splitting
//! - Classification metrics and the text report
//! - The engine that runs load, search, evaluate, report and export in order

mod engine;
pub mod cross_validation;
pub mod metrics;
pub mod pipeline;
pub mod xgboost;

pub use engine::{render_report, RunEvent, TrainEngine, TrainingOutcome};
pub use cross_validation::{CrossValidator, CVStrategy, CVSplit, CVResults};
pub use metrics::{accuracy_score, balanced_accuracy_score, f1_macro_score, AverageMetrics, ClassMetrics, ClassificationReport};
pub use pipeline::{Pipeline, CLASSIFIER_STEP, SCALER_STEP};
pub use xgboost::{EvalMetric, Objective, XGBNode, XGBoostClassifier, XGBoostConfig};
