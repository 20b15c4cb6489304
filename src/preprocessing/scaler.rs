//! Feature scaling

use crate::error::{Result, TrainerError};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Parameters for one fitted feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    /// Mean of the feature (0 when centering is disabled)
    pub center: f64,
    /// Population standard deviation (1 when scaling is disabled or the feature is constant)
    pub scale: f64,
}

/// Standard scaling (z-score normalization): (x - mean) / std
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    with_mean: bool,
    with_std: bool,
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self::new()
    }
}

impl StandardScaler {
    /// Create a new scaler that centers and scales
    pub fn new() -> Self {
        Self {
            with_mean: true,
            with_std: true,
            params: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn with_mean(mut self, with_mean: bool) -> Self {
        self.with_mean = with_mean;
        self
    }

    pub fn with_std(mut self, with_std: bool) -> Self {
        self.with_std = with_std;
        self
    }

    /// Set `with_mean` / `with_std` by parameter name
    pub fn set_param(&mut self, name: &str, value: bool) -> Result<()> {
        match name {
            "with_mean" => self.with_mean = value,
            "with_std" => self.with_std = value,
            other => {
                return Err(TrainerError::InvalidParameter {
                    name: other.to_string(),
                    value: value.to_string(),
                    reason: "unknown scaler parameter".to_string(),
                })
            }
        }
        Ok(())
    }

    /// Fit the scaler; statistics come only from `x`
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(TrainerError::PreprocessingError(
                "cannot fit scaler on zero rows".to_string(),
            ));
        }

        let n = x.nrows() as f64;
        self.params = x
            .axis_iter(Axis(1))
            .enumerate()
            .map(|(j, col)| {
                let mean = col.sum() / n;
                let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                let scale = if !self.with_std {
                    1.0
                } else if std == 0.0 {
                    warn!(feature = j, "zero variance feature, leaving unscaled");
                    1.0
                } else {
                    std
                };
                ScalerParams {
                    center: if self.with_mean { mean } else { 0.0 },
                    scale,
                }
            })
            .collect();

        self.is_fitted = true;
        Ok(self)
    }

    /// Transform the data with the fitted parameters
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(TrainerError::ModelNotFitted);
        }
        if x.ncols() != self.params.len() {
            return Err(TrainerError::ShapeError {
                expected: format!("{} features", self.params.len()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let mut out = x.clone();
        for (mut col, p) in out.axis_iter_mut(Axis(1)).zip(self.params.iter()) {
            col.mapv_inplace(|v| (v - p.center) / p.scale);
        }
        Ok(out)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    /// Inverse transform the data
    pub fn inverse_transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(TrainerError::ModelNotFitted);
        }

        let mut out = x.clone();
        for (mut col, p) in out.axis_iter_mut(Axis(1)).zip(self.params.iter()) {
            col.mapv_inplace(|v| v * p.scale + p.center);
        }
        Ok(out)
    }

    /// Fitted per-feature parameters in column order
    pub fn params(&self) -> &[ScalerParams] {
        &self.params
    }

    pub fn mean(&self) -> Array1<f64> {
        self.params.iter().map(|p| p.center).collect()
    }

    pub fn scale(&self) -> Array1<f64> {
        self.params.iter().map(|p| p.scale).collect()
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}
