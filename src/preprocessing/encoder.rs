//! Class label encoding

use crate::error::{Result, TrainerError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A class value read from a label table.
///
/// Integer labels order numerically and text labels lexically, so the
/// encoded class order is the natural sort order of the labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ClassLabel {
    Int(i64),
    Text(String),
}

impl ClassLabel {
    pub fn is_int(&self) -> bool {
        matches!(self, ClassLabel::Int(_))
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassLabel::Int(v) => write!(f, "{}", v),
            ClassLabel::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for ClassLabel {
    fn from(v: i64) -> Self {
        ClassLabel::Int(v)
    }
}

impl From<&str> for ClassLabel {
    fn from(s: &str) -> Self {
        ClassLabel::Text(s.to_string())
    }
}

/// Maps class labels to dense indices `0..n_classes` (classes kept sorted)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<ClassLabel>,
    is_fitted: bool,
}

impl LabelEncoder {
    /// Create a new encoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit the encoder to the labels seen in training
    pub fn fit(&mut self, labels: &[ClassLabel]) -> Result<&mut Self> {
        if labels.is_empty() {
            return Err(TrainerError::PreprocessingError(
                "cannot fit label encoder on empty labels".to_string(),
            ));
        }

        let unique: BTreeSet<&ClassLabel> = labels.iter().collect();
        self.classes = unique.into_iter().cloned().collect();
        self.is_fitted = true;
        Ok(self)
    }

    /// Encode labels as class indices stored in `f64`
    pub fn transform(&self, labels: &[ClassLabel]) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(TrainerError::ModelNotFitted);
        }

        labels
            .iter()
            .map(|label| {
                self.classes
                    .binary_search(label)
                    .map(|i| i as f64)
                    .map_err(|_| {
                        TrainerError::PreprocessingError(format!("unseen class label: {}", label))
                    })
            })
            .collect()
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, labels: &[ClassLabel]) -> Result<Array1<f64>> {
        self.fit(labels)?;
        self.transform(labels)
    }

    /// Decode class indices back to labels
    pub fn inverse_transform(&self, indices: &[usize]) -> Result<Vec<ClassLabel>> {
        if !self.is_fitted {
            return Err(TrainerError::ModelNotFitted);
        }

        indices
            .iter()
            .map(|&i| {
                self.classes.get(i).cloned().ok_or_else(|| {
                    TrainerError::PreprocessingError(format!("class index {} out of range", i))
                })
            })
            .collect()
    }

    /// Sorted classes seen during fit
    pub fn classes(&self) -> &[ClassLabel] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}
