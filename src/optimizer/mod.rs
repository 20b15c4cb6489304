//! Hyperparameter search
//!
//! Exhaustive grid search over `<stage>__<param>` keys of a [`Pipeline`],
//! scored by k-fold cross-validation with the candidate x fold fits spread
//! over a rayon pool.
//!
//! [`Pipeline`]: crate::training::Pipeline

mod config;
mod grid_search;
mod search_space;

pub use config::{GridSearchConfig, Scoring};
pub use grid_search::{CandidateResult, GridSearchCV, GridSearchResult};
pub use search_space::{format_params, ParamGrid, ParameterValue, TrialParams};
