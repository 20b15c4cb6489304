//! Search configuration

use crate::preprocessing::ClassLabel;
use crate::training::cross_validation::CVStrategy;
use crate::training::metrics::{accuracy_score, balanced_accuracy_score, f1_macro_score};
use serde::{Deserialize, Serialize};

/// Metric maximized on each held-out fold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    #[default]
    Accuracy,
    BalancedAccuracy,
    F1Macro,
}

impl Scoring {
    pub fn score(&self, y_true: &[ClassLabel], y_pred: &[ClassLabel]) -> f64 {
        match self {
            Scoring::Accuracy => accuracy_score(y_true, y_pred),
            Scoring::BalancedAccuracy => balanced_accuracy_score(y_true, y_pred),
            Scoring::F1Macro => f1_macro_score(y_true, y_pred),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scoring::Accuracy => "accuracy",
            Scoring::BalancedAccuracy => "balanced_accuracy",
            Scoring::F1Macro => "f1_macro",
        }
    }
}

/// Configuration for exhaustive grid search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSearchConfig {
    /// Fold generator
    pub cv: CVStrategy,

    /// Metric to maximize
    pub scoring: Scoring,

    /// Worker threads; `None` uses the global rayon pool
    pub n_jobs: Option<usize>,

    /// Seed for shuffled folds
    pub random_state: Option<u64>,

    /// Log per-fold scores
    pub verbose: bool,
}

impl Default for GridSearchConfig {
    fn default() -> Self {
        Self {
            cv: CVStrategy::default(),
            scoring: Scoring::Accuracy,
            n_jobs: None,
            random_state: Some(42),
            verbose: true,
        }
    }
}

impl GridSearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cv(mut self, cv: CVStrategy) -> Self {
        self.cv = cv;
        self
    }

    pub fn with_scoring(mut self, scoring: Scoring) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = Some(n_jobs);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoring_serde_names() {
        let s: Scoring = serde_json::from_str("\"balanced_accuracy\"").unwrap();
        assert_eq!(s, Scoring::BalancedAccuracy);
        assert_eq!(serde_json::to_string(&Scoring::F1Macro).unwrap(), "\"f1_macro\"");
    }

    #[test]
    fn test_default_is_stratified_three_fold() {
        let cfg = GridSearchConfig::default();
        assert_eq!(cfg.cv, CVStrategy::StratifiedKFold { n_splits: 3, shuffle: false });
        assert_eq!(cfg.scoring, Scoring::Accuracy);
        assert!(cfg.n_jobs.is_none());
    }
}
