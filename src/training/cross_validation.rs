//! Cross-validation implementations

use crate::error::{Result, TrainerError};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Cross-validation strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CVStrategy {
    /// K-Fold cross-validation
    KFold { n_splits: usize, shuffle: bool },
    /// Stratified K-Fold (maintains class distribution)
    StratifiedKFold { n_splits: usize, shuffle: bool },
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::StratifiedKFold { n_splits: 3, shuffle: false }
    }
}

impl CVStrategy {
    pub fn n_splits(&self) -> usize {
        match self {
            CVStrategy::KFold { n_splits, .. } | CVStrategy::StratifiedKFold { n_splits, .. } => *n_splits,
        }
    }
}

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: Option<u64>,
}

impl CrossValidator {
    /// Create a new cross-validator
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: None,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Generate train/test splits
    pub fn split(&self, n_samples: usize, y: Option<&Array1<f64>>) -> Result<Vec<CVSplit>> {
        match &self.strategy {
            CVStrategy::KFold { n_splits, shuffle } => {
                self.k_fold_split(n_samples, *n_splits, *shuffle)
            }
            CVStrategy::StratifiedKFold { n_splits, shuffle } => {
                let y = y.ok_or_else(|| TrainerError::ValidationError(
                    "StratifiedKFold requires target array".to_string()
                ))?;
                if y.len() != n_samples {
                    return Err(TrainerError::ShapeError {
                        expected: format!("{} targets", n_samples),
                        actual: format!("{} targets", y.len()),
                    });
                }
                self.stratified_k_fold_split(y, *n_splits, *shuffle)
            }
        }
    }

    fn rng(&self) -> ChaCha8Rng {
        match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    fn k_fold_split(&self, n_samples: usize, n_splits: usize, shuffle: bool) -> Result<Vec<CVSplit>> {
        check_n_splits(n_splits)?;
        if n_samples < n_splits {
            return Err(TrainerError::ValidationError(
                format!("n_samples ({}) must be >= n_splits ({})", n_samples, n_splits)
            ));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();

        if shuffle {
            indices.shuffle(&mut self.rng());
        }

        let fold_sizes: Vec<usize> = (0..n_splits)
            .map(|i| {
                let base = n_samples / n_splits;
                let remainder = n_samples % n_splits;
                if i < remainder { base + 1 } else { base }
            })
            .collect();

        let mut splits = Vec::with_capacity(n_splits);
        let mut current = 0;

        for (fold_idx, &fold_size) in fold_sizes.iter().enumerate() {
            let test_indices: Vec<usize> = indices[current..current + fold_size].to_vec();
            let train_indices: Vec<usize> = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();

            splits.push(CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            });

            current += fold_size;
        }

        Ok(splits)
    }

    /// Each class's samples, in row order, are dealt into contiguous
    /// per-fold blocks. Block sizes come from dealing the class-sorted
    /// sample list round-robin over the folds, so per-fold class counts
    /// differ by at most one. Classes are numbered by first appearance.
    fn stratified_k_fold_split(
        &self,
        y: &Array1<f64>,
        n_splits: usize,
        shuffle: bool,
    ) -> Result<Vec<CVSplit>> {
        check_n_splits(n_splits)?;
        let n_samples = y.len();

        let mut class_of_value: HashMap<u64, usize> = HashMap::new();
        let y_encoded: Vec<usize> = y
            .iter()
            .map(|v| {
                let next = class_of_value.len();
                *class_of_value.entry(v.to_bits()).or_insert(next)
            })
            .collect();
        let n_classes = class_of_value.len();

        let mut counts = vec![0usize; n_classes];
        for &c in &y_encoded {
            counts[c] += 1;
        }
        if counts.iter().all(|&c| c < n_splits) {
            return Err(TrainerError::ValidationError(format!(
                "n_splits={} cannot be greater than the number of members in each class",
                n_splits
            )));
        }
        if let Some(&min) = counts.iter().min() {
            if min < n_splits {
                warn!(min_members = min, n_splits, "least populated class has fewer members than n_splits");
            }
        }

        let mut y_order = y_encoded.clone();
        y_order.sort_unstable();
        // allocation[fold][class]
        let mut allocation = vec![vec![0usize; n_classes]; n_splits];
        for (pos, &c) in y_order.iter().enumerate() {
            allocation[pos % n_splits][c] += 1;
        }

        let mut rng = self.rng();
        let mut test_fold = vec![0usize; n_samples];
        for class in 0..n_classes {
            let mut folds_for_class: Vec<usize> = (0..n_splits)
                .flat_map(|fold| std::iter::repeat(fold).take(allocation[fold][class]))
                .collect();
            if shuffle {
                folds_for_class.shuffle(&mut rng);
            }
            let members = y_encoded.iter().enumerate().filter(|(_, &c)| c == class).map(|(i, _)| i);
            for (sample, fold) in members.zip(folds_for_class) {
                test_fold[sample] = fold;
            }
        }

        let splits = (0..n_splits)
            .map(|fold_idx| {
                let (test_indices, train_indices): (Vec<usize>, Vec<usize>) =
                    (0..n_samples).partition(|&i| test_fold[i] == fold_idx);
                CVSplit {
                    train_indices,
                    test_indices,
                    fold_idx,
                }
            })
            .collect();

        Ok(splits)
    }
}

fn check_n_splits(n_splits: usize) -> Result<()> {
    if n_splits < 2 {
        return Err(TrainerError::ValidationError(
            "n_splits must be at least 2".to_string()
        ));
    }
    Ok(())
}

/// Cross-validation results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CVResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    /// Mean score across folds
    pub mean_score: f64,
    /// Standard deviation of scores
    pub std_score: f64,
    /// Number of folds
    pub n_folds: usize,
}

impl CVResults {
    /// Create CV results from fold scores
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        let mean_score = scores.iter().sum::<f64>() / n_folds as f64;
        let variance = scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n_folds as f64;
        let std_score = variance.sqrt();

        Self {
            scores,
            mean_score,
            std_score,
            n_folds,
        }
    }
}
