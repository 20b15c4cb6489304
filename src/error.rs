//! Error types for the trainer

use thiserror::Error;

/// Result type alias for trainer operations
pub type Result<T> = std::result::Result<T, TrainerError>;

/// Main error type for the trainer
#[derive(Error, Debug)]
pub enum TrainerError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Preprocessing error: {0}")]
    PreprocessingError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Optimization error: {0}")]
    OptimizationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Export error: {0}")]
    ExportError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<polars::error::PolarsError> for TrainerError {
    fn from(err: polars::error::PolarsError) -> Self {
        TrainerError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for TrainerError {
    fn from(err: serde_json::Error) -> Self {
        TrainerError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for TrainerError {
    fn from(err: ndarray::ShapeError) -> Self {
        TrainerError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
