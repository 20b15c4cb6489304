//! Parameter grid definition for exhaustive search

use crate::error::{Result, TrainerError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single candidate value for a hyperparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
}

impl ParameterValue {
    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get as int
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            ParameterValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// Get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

/// Rendered the way a Python literal reads (`0.8`, `100`, `'gbtree'`, `True`)
impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::Float(v) => f.write_str(&python_float(*v)),
            ParameterValue::Bool(true) => write!(f, "True"),
            ParameterValue::Bool(false) => write!(f, "False"),
            ParameterValue::String(s) => write!(f, "'{}'", s),
        }
    }
}

/// Python `repr` of a float: exponents carry a sign and at least two digits (`1e-05`)
fn python_float(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    let debug = format!("{:?}", v);
    match debug.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => debug,
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        ParameterValue::Int(v)
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        ParameterValue::Float(v)
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        ParameterValue::Bool(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        ParameterValue::String(v.to_string())
    }
}

/// One point of the grid, keyed by `<step>__<param>`
pub type TrialParams = BTreeMap<String, ParameterValue>;

/// Render a parameter set as `{'a': 1, 'b': 0.5}` with sorted keys
pub fn format_params(params: &TrialParams) -> String {
    let body: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("'{}': {}", k, v))
        .collect();
    format!("{{{}}}", body.join(", "))
}

/// Mapping from parameter name to its candidate values.
///
/// The search space is the cartesian product of all entries. Keys iterate
/// in sorted order and the last key varies fastest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamGrid {
    params: BTreeMap<String, Vec<ParameterValue>>,
}

impl ParamGrid {
    /// Create a new empty grid
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter with its candidate values
    pub fn add<V: Into<ParameterValue>>(mut self, name: impl Into<String>, values: Vec<V>) -> Self {
        self.params
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Get parameter names in iteration order
    pub fn param_names(&self) -> Vec<String> {
        self.params.keys().cloned().collect()
    }

    /// Candidate values of one parameter
    pub fn values(&self, name: &str) -> Option<&[ParameterValue]> {
        self.params.get(name).map(|v| v.as_slice())
    }

    /// Number of grid points
    pub fn len(&self) -> usize {
        self.params.values().map(|v| v.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reject entries without any candidate value
    pub fn validate(&self) -> Result<()> {
        if let Some((name, _)) = self.params.iter().find(|(_, v)| v.is_empty()) {
            return Err(TrainerError::ConfigError(format!(
                "parameter grid entry '{}' has no candidate values",
                name
            )));
        }
        Ok(())
    }

    /// All grid points in iteration order
    pub fn candidates(&self) -> Vec<TrialParams> {
        let mut out = vec![TrialParams::new()];
        for (name, values) in &self.params {
            let mut next = Vec::with_capacity(out.len() * values.len());
            for partial in &out {
                for value in values {
                    let mut point = partial.clone();
                    point.insert(name.clone(), value.clone());
                    next.push(point);
                }
            }
            out = next;
        }
        out
    }
}
