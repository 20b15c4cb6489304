//! Data preprocessing module
//!
//! Provides the preprocessing pieces of the training pipeline:
//! - Feature scaling (StandardScaler)
//! - Class label encoding (LabelEncoder)

mod encoder;
mod scaler;

pub use encoder::{ClassLabel, LabelEncoder};
pub use scaler::{ScalerParams, StandardScaler};
