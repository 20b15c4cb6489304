//! Exhaustive grid search under k-fold cross-validation

use super::config::GridSearchConfig;
use super::search_space::{format_params, ParamGrid, TrialParams};
use crate::error::{Result, TrainerError};
use crate::preprocessing::{ClassLabel, LabelEncoder};
use crate::training::cross_validation::{CVResults, CVSplit, CrossValidator};
use crate::training::pipeline::Pipeline;
use ndarray::{Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Cross-validated outcome of one grid point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResult {
    pub params: TrialParams,
    pub cv: CVResults,
    /// 1 for the best mean score; equal means share a rank
    pub rank: usize,
}

/// Result of a completed search
#[derive(Debug, Clone)]
pub struct GridSearchResult {
    /// Per-candidate results in grid order
    pub candidates: Vec<CandidateResult>,
    pub best_index: usize,
    pub best_params: TrialParams,
    /// Mean CV score of the best candidate
    pub best_score: f64,
    /// Best candidate refit on the full training data
    pub best_estimator: Pipeline,
    /// Number of fold fits performed, excluding the refit
    pub n_fits: usize,
}

impl GridSearchResult {
    /// Best parameters rendered as `{'xgb__max_depth': 4, ...}`
    pub fn best_params_string(&self) -> String {
        format_params(&self.best_params)
    }
}

pub struct GridSearchCV {
    estimator: Pipeline,
    grid: ParamGrid,
    config: GridSearchConfig,
}

impl GridSearchCV {
    pub fn new(estimator: Pipeline, grid: ParamGrid, config: GridSearchConfig) -> Self {
        Self { estimator, grid, config }
    }

    pub fn grid(&self) -> &ParamGrid {
        &self.grid
    }

    pub fn config(&self) -> &GridSearchConfig {
        &self.config
    }

    /// Evaluate every grid point and refit the winner on all of `x`
    pub fn fit(&self, x: &Array2<f64>, y: &[ClassLabel]) -> Result<GridSearchResult> {
        self.grid.validate()?;
        if x.nrows() != y.len() {
            return Err(TrainerError::ShapeError {
                expected: format!("{} labels", x.nrows()),
                actual: format!("{} labels", y.len()),
            });
        }

        let candidates = self.grid.candidates();
        // reject bad names and values before any fitting starts
        for params in &candidates {
            self.estimator.clone().set_params(params)?;
        }

        let encoded = LabelEncoder::new().fit_transform(y)?;
        let mut cv = CrossValidator::new(self.config.cv.clone());
        if let Some(seed) = self.config.random_state {
            cv = cv.with_random_state(seed);
        }
        let splits = cv.split(x.nrows(), Some(&encoded))?;

        let n_fits = candidates.len() * splits.len();
        info!(
            "Fitting {} folds for each of {} candidates, totalling {} fits",
            splits.len(),
            candidates.len(),
            n_fits
        );

        let jobs: Vec<(usize, usize)> = (0..candidates.len())
            .flat_map(|c| (0..splits.len()).map(move |s| (c, s)))
            .collect();

        let start = Instant::now();
        let run = || -> Result<Vec<f64>> {
            jobs.par_iter()
                .map(|&(c, s)| self.fit_and_score(&candidates[c], &splits[s], x, y))
                .collect()
        };
        let scores = match self.config.n_jobs {
            Some(n) => rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| TrainerError::ThreadPoolError(e.to_string()))?
                .install(run)?,
            None => run()?,
        };
        debug!(elapsed_ms = start.elapsed().as_millis() as u64, "cross-validation finished");

        let cv_results: Vec<CVResults> = scores
            .chunks(splits.len())
            .map(|fold_scores| CVResults::from_scores(fold_scores.to_vec()))
            .collect();

        let means: Vec<f64> = cv_results.iter().map(|r| r.mean_score).collect();
        let results: Vec<CandidateResult> = candidates
            .into_iter()
            .zip(cv_results)
            .map(|(params, cv)| {
                let rank = 1 + means.iter().filter(|&&m| m > cv.mean_score).count();
                CandidateResult { params, cv, rank }
            })
            .collect();

        if self.config.verbose {
            for (i, r) in results.iter().enumerate() {
                debug!(
                    candidate = i,
                    mean = r.cv.mean_score,
                    std = r.cv.std_score,
                    rank = r.rank,
                    "{}",
                    format_params(&r.params)
                );
            }
        }

        let best_index = results
            .iter()
            .position(|r| r.rank == 1)
            .ok_or_else(|| TrainerError::OptimizationError("no candidate was scored".to_string()))?;
        let best_params = results[best_index].params.clone();
        let best_score = results[best_index].cv.mean_score;

        let mut best_estimator = self.estimator.clone();
        best_estimator.set_params(&best_params)?;
        best_estimator.fit(x, y)?;

        info!(best_score, params = %format_params(&best_params), "grid search complete");

        Ok(GridSearchResult {
            candidates: results,
            best_index,
            best_params,
            best_score,
            best_estimator,
            n_fits,
        })
    }

    fn fit_and_score(
        &self,
        params: &TrialParams,
        split: &CVSplit,
        x: &Array2<f64>,
        y: &[ClassLabel],
    ) -> Result<f64> {
        let x_train = x.select(Axis(0), &split.train_indices);
        let y_train: Vec<ClassLabel> = split.train_indices.iter().map(|&i| y[i].clone()).collect();
        let x_test = x.select(Axis(0), &split.test_indices);
        let y_test: Vec<ClassLabel> = split.test_indices.iter().map(|&i| y[i].clone()).collect();

        let mut model = self.estimator.clone();
        model.set_params(params)?;
        model.fit(&x_train, &y_train)?;
        let preds = model.predict(&x_test)?;
        let score = self.config.scoring.score(&y_test, &preds);

        if self.config.verbose {
            debug!(fold = split.fold_idx, score, "{}", format_params(params));
        }
        Ok(score)
    }
}
