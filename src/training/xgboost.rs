//! XGBoost-style gradient boosting with second-order approximation
//!
//! Key differences from standard gradient boosting:
//! - Uses both gradient (first derivative) and hessian (second derivative) of loss
//! - Regularized leaf weights: w* = -G / (H + lambda)
//! - Gain-based split scoring: Gain = 0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - (GL+GR)²/(HL+HR+λ)] - γ
//! - Built-in L1 (alpha) and L2 (lambda) regularization
//! - Minimum child weight constraint
//!
//! Binary targets use the logistic objective with one tree per round.
//! Three or more classes use softmax with one tree per class per round.
//! Leaf weights are stored already multiplied by the learning rate, so a
//! margin is `base_margin + sum(tree outputs)`.

use crate::error::{Result, TrainerError};
use crate::optimizer::ParameterValue;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

const MIN_HESSIAN: f64 = 1e-16;
const PROB_EPS: f64 = 1e-15;

/// Metric reported after every boosting round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvalMetric {
    /// Negative log-likelihood
    LogLoss,
    /// Misclassification rate
    Error,
}

impl EvalMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvalMetric::LogLoss => "logloss",
            EvalMetric::Error => "error",
        }
    }
}

/// Learning objective, chosen from the number of classes at fit time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Objective {
    BinaryLogistic,
    MultiSoftprob { n_classes: usize },
}

impl Objective {
    fn for_classes(n_classes: usize) -> Self {
        if n_classes == 2 {
            Objective::BinaryLogistic
        } else {
            Objective::MultiSoftprob { n_classes }
        }
    }

    /// Number of trees built per round
    pub fn n_groups(&self) -> usize {
        match self {
            Objective::BinaryLogistic => 1,
            Objective::MultiSoftprob { n_classes } => *n_classes,
        }
    }
}

/// XGBoost configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// L1 regularization on leaf weights
    pub reg_alpha: f64,
    /// Minimum loss reduction to make a split (gamma)
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub eval_metric: EvalMetric,
    pub random_state: Option<u64>,
}

impl Default for XGBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            eval_metric: EvalMetric::LogLoss,
            random_state: Some(42),
        }
    }
}

impl XGBoostConfig {
    /// Set a parameter by its estimator-level name (`max_depth`, `subsample`, ...)
    pub fn set_param(&mut self, name: &str, value: &ParameterValue) -> Result<()> {
        match name {
            "n_estimators" => self.n_estimators = expect_count(name, value)?,
            "max_depth" => self.max_depth = expect_count(name, value)?,
            "learning_rate" | "eta" => self.learning_rate = expect_fraction(name, value)?,
            "subsample" => self.subsample = expect_fraction(name, value)?,
            "colsample_bytree" => self.colsample_bytree = expect_fraction(name, value)?,
            "min_child_weight" => self.min_child_weight = expect_non_negative(name, value)?,
            "reg_lambda" => self.reg_lambda = expect_non_negative(name, value)?,
            "reg_alpha" => self.reg_alpha = expect_non_negative(name, value)?,
            "gamma" => self.gamma = expect_non_negative(name, value)?,
            "random_state" => {
                self.random_state = Some(expect_count(name, value)? as u64);
            }
            "eval_metric" => {
                self.eval_metric = match value.as_string() {
                    Some("logloss") => EvalMetric::LogLoss,
                    Some("error") => EvalMetric::Error,
                    _ => return Err(invalid(name, value, "expected \"logloss\" or \"error\"")),
                };
            }
            _ => return Err(invalid(name, value, "unknown classifier parameter")),
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(TrainerError::ConfigError("n_estimators must be at least 1".to_string()));
        }
        if self.max_depth == 0 {
            return Err(TrainerError::ConfigError("max_depth must be at least 1".to_string()));
        }
        for (name, v) in [
            ("learning_rate", self.learning_rate),
            ("subsample", self.subsample),
            ("colsample_bytree", self.colsample_bytree),
        ] {
            if !(v > 0.0 && v <= 1.0) {
                return Err(TrainerError::ConfigError(format!("{} must be in (0, 1], got {}", name, v)));
            }
        }
        Ok(())
    }
}

fn invalid(name: &str, value: &ParameterValue, reason: &str) -> TrainerError {
    TrainerError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn expect_count(name: &str, value: &ParameterValue) -> Result<usize> {
    match value {
        ParameterValue::Int(v) if *v >= 1 => Ok(*v as usize),
        _ => Err(invalid(name, value, "expected a positive integer")),
    }
}

fn expect_fraction(name: &str, value: &ParameterValue) -> Result<f64> {
    match value.as_float() {
        Some(v) if v > 0.0 && v <= 1.0 => Ok(v),
        _ => Err(invalid(name, value, "expected a number in (0, 1]")),
    }
}

fn expect_non_negative(name: &str, value: &ParameterValue) -> Result<f64> {
    match value.as_float() {
        Some(v) if v >= 0.0 => Ok(v),
        _ => Err(invalid(name, value, "expected a non-negative number")),
    }
}

/// A single node in a boosted tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum XGBNode {
    Leaf { weight: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<XGBNode>,
        right: Box<XGBNode>,
    },
}

impl XGBNode {
    pub fn predict(&self, sample: &ArrayView1<f64>) -> f64 {
        match self {
            XGBNode::Leaf { weight } => *weight,
            XGBNode::Split { feature, threshold, left, right } => {
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        match self {
            XGBNode::Leaf { .. } => 1,
            XGBNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            XGBNode::Leaf { .. } => 0,
            XGBNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Build a tree using exact greedy split finding
fn build_xgb_tree(
    x: &Array2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    feature_indices: &[usize],
    depth: usize,
    config: &XGBoostConfig,
) -> XGBNode {
    let n = indices.len();

    let g_sum: f64 = indices.iter().map(|&i| grad[i]).sum();
    let h_sum: f64 = indices.iter().map(|&i| hess[i]).sum();

    let leaf_weight =
        config.learning_rate * compute_leaf_weight(g_sum, h_sum, config.reg_lambda, config.reg_alpha);

    if depth >= config.max_depth || n < 2 || h_sum < config.min_child_weight {
        return XGBNode::Leaf { weight: leaf_weight };
    }

    // Candidates are scored in parallel and reduced in feature order so
    // equal gains always resolve to the lowest feature index.
    let candidates: Vec<Option<(usize, f64, f64)>> = feature_indices
        .par_iter()
        .map(|&f| find_best_split_for_feature(x, grad, hess, indices, f, config))
        .collect();

    let mut best: Option<(usize, f64, f64)> = None;
    for cand in candidates.into_iter().flatten() {
        if best.map_or(true, |(_, _, gain)| cand.2 > gain) {
            best = Some(cand);
        }
    }

    match best {
        Some((feature, threshold, gain)) if gain > config.gamma => {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                indices.iter().partition(|&&i| x[[i, feature]] <= threshold);

            if left_idx.is_empty() || right_idx.is_empty() {
                return XGBNode::Leaf { weight: leaf_weight };
            }

            let left = build_xgb_tree(x, grad, hess, &left_idx, feature_indices, depth + 1, config);
            let right = build_xgb_tree(x, grad, hess, &right_idx, feature_indices, depth + 1, config);

            XGBNode::Split {
                feature,
                threshold,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        _ => XGBNode::Leaf { weight: leaf_weight },
    }
}

/// L1 soft-threshold of a gradient sum
fn threshold_l1(g: f64, alpha: f64) -> f64 {
    if g > alpha {
        g - alpha
    } else if g < -alpha {
        g + alpha
    } else {
        0.0
    }
}

/// Optimal leaf weight with L1 (alpha) and L2 (lambda) regularization
fn compute_leaf_weight(g_sum: f64, h_sum: f64, lambda: f64, alpha: f64) -> f64 {
    let denom = h_sum + lambda;
    if denom <= 0.0 {
        return 0.0;
    }
    -threshold_l1(g_sum, alpha) / denom
}

fn structure_score(g: f64, h: f64, lambda: f64, alpha: f64) -> f64 {
    let t = threshold_l1(g, alpha);
    t * t / (h + lambda)
}

/// Best (feature, threshold, gain) for a single feature
fn find_best_split_for_feature(
    x: &Array2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    feature: usize,
    config: &XGBoostConfig,
) -> Option<(usize, f64, f64)> {
    let mut sorted_indices: Vec<usize> = indices.to_vec();
    sorted_indices.sort_by(|&a, &b| {
        x[[a, feature]].partial_cmp(&x[[b, feature]]).unwrap_or(std::cmp::Ordering::Equal)
    });

    let g_total: f64 = sorted_indices.iter().map(|&i| grad[i]).sum();
    let h_total: f64 = sorted_indices.iter().map(|&i| hess[i]).sum();
    let (lambda, alpha) = (config.reg_lambda, config.reg_alpha);
    let parent = structure_score(g_total, h_total, lambda, alpha);

    let mut g_left = 0.0;
    let mut h_left = 0.0;
    let mut best: Option<(f64, f64)> = None;

    // The last position cannot split, everything would be on the left
    for pos in 0..sorted_indices.len().saturating_sub(1) {
        let idx = sorted_indices[pos];
        let next_idx = sorted_indices[pos + 1];
        g_left += grad[idx];
        h_left += hess[idx];

        let (v, next_v) = (x[[idx, feature]], x[[next_idx, feature]]);
        if v == next_v {
            continue;
        }

        let g_right = g_total - g_left;
        let h_right = h_total - h_left;

        if h_left < config.min_child_weight || h_right < config.min_child_weight {
            continue;
        }

        let gain = 0.5
            * (structure_score(g_left, h_left, lambda, alpha)
                + structure_score(g_right, h_right, lambda, alpha)
                - parent);

        if best.map_or(true, |(b, _)| gain > b) {
            best = Some((gain, v + (next_v - v) / 2.0));
        }
    }

    best.map(|(gain, threshold)| (feature, threshold, gain))
}

// ─── XGBoost Classifier ────────────────────────────────────────────────────

/// XGBoost Classifier
///
/// `y` holds dense class indices (`0.0, 1.0, ...`) as produced by
/// [`crate::preprocessing::LabelEncoder`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostClassifier {
    config: XGBoostConfig,
    objective: Option<Objective>,
    /// Trees per output group, in boosting order
    trees: Vec<Vec<XGBNode>>,
    base_margin: Vec<f64>,
    n_features: usize,
    evals_result: Vec<f64>,
}

impl XGBoostClassifier {
    pub fn new(config: XGBoostConfig) -> Self {
        Self {
            config,
            objective: None,
            trees: Vec::new(),
            base_margin: Vec::new(),
            n_features: 0,
            evals_result: Vec::new(),
        }
    }

    pub fn config(&self) -> &XGBoostConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut XGBoostConfig {
        &mut self.config
    }

    fn sigmoid(x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.config.validate()?;

        let n_samples = x.nrows();
        if n_samples == 0 {
            return Err(TrainerError::TrainingError("empty training data".to_string()));
        }
        if y.len() != n_samples {
            return Err(TrainerError::ShapeError {
                expected: format!("{} labels", n_samples),
                actual: format!("{} labels", y.len()),
            });
        }
        if y.iter().any(|&v| v < 0.0 || v.fract() != 0.0) {
            return Err(TrainerError::TrainingError(
                "labels must be class indices 0..n_classes".to_string(),
            ));
        }

        let n_classes = y.iter().fold(0.0f64, |a, &b| a.max(b)) as usize + 1;
        let mut seen = vec![false; n_classes];
        for &v in y.iter() {
            seen[v as usize] = true;
        }
        if seen.iter().filter(|&&s| s).count() < 2 {
            return Err(TrainerError::TrainingError(
                "training data must contain at least two classes".to_string(),
            ));
        }

        self.n_features = x.ncols();
        self.trees.clear();
        self.evals_result.clear();

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let objective = Objective::for_classes(n_classes);
        match objective {
            Objective::BinaryLogistic => self.fit_binary(x, y, &mut rng),
            Objective::MultiSoftprob { n_classes } => self.fit_multiclass(x, y, n_classes, &mut rng),
        }
        self.objective = Some(objective);

        Ok(())
    }

    fn fit_binary(&mut self, x: &Array2<f64>, y: &Array1<f64>, rng: &mut Xoshiro256PlusPlus) {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        // Base score in log-odds space
        let p = y.mean().unwrap_or(0.5).clamp(1e-7, 1.0 - 1e-7);
        let base = (p / (1.0 - p)).ln();
        self.base_margin = vec![base];
        let mut raw_preds = Array1::from_elem(n_samples, base);
        let mut trees = Vec::with_capacity(self.config.n_estimators);

        for round in 0..self.config.n_estimators {
            // Logistic loss: grad = p - y, hess = p * (1 - p)
            let probs: Array1<f64> = raw_preds.mapv(Self::sigmoid);
            let grad: Array1<f64> = &probs - y;
            let hess: Array1<f64> = probs.mapv(|p| (p * (1.0 - p)).max(MIN_HESSIAN));

            let row_indices = subsample(rng, n_samples, self.config.subsample);
            let col_indices = subsample(rng, n_features, self.config.colsample_bytree);

            let tree = build_xgb_tree(x, &grad, &hess, &row_indices, &col_indices, 0, &self.config);

            for (i, row) in x.axis_iter(Axis(0)).enumerate() {
                raw_preds[i] += tree.predict(&row);
            }
            trees.push(tree);

            let metric = self.binary_metric(&raw_preds, y);
            debug!(round, metric = self.config.eval_metric.as_str(), value = metric, "boosting round");
            self.evals_result.push(metric);
        }

        self.trees = vec![trees];
    }

    fn fit_multiclass(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        n_classes: usize,
        rng: &mut Xoshiro256PlusPlus,
    ) {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        let base = 0.5;
        self.base_margin = vec![base; n_classes];
        let mut raw_preds = Array2::from_elem((n_samples, n_classes), base);
        let mut trees: Vec<Vec<XGBNode>> = vec![Vec::with_capacity(self.config.n_estimators); n_classes];

        for round in 0..self.config.n_estimators {
            let probs = softmax_rows(&raw_preds);
            let row_indices = subsample(rng, n_samples, self.config.subsample);

            let mut round_trees = Vec::with_capacity(n_classes);
            for k in 0..n_classes {
                let grad: Array1<f64> = probs
                    .column(k)
                    .iter()
                    .zip(y.iter())
                    .map(|(&p, &label)| p - if label as usize == k { 1.0 } else { 0.0 })
                    .collect();
                let hess: Array1<f64> = probs
                    .column(k)
                    .mapv(|p| (2.0 * p * (1.0 - p)).max(MIN_HESSIAN));
                let col_indices = subsample(rng, n_features, self.config.colsample_bytree);
                round_trees.push(build_xgb_tree(x, &grad, &hess, &row_indices, &col_indices, 0, &self.config));
            }

            for (k, tree) in round_trees.into_iter().enumerate() {
                for (i, row) in x.axis_iter(Axis(0)).enumerate() {
                    raw_preds[[i, k]] += tree.predict(&row);
                }
                trees[k].push(tree);
            }

            let metric = self.multiclass_metric(&raw_preds, y);
            debug!(round, metric = self.config.eval_metric.as_str(), value = metric, "boosting round");
            self.evals_result.push(metric);
        }

        self.trees = trees;
    }

    fn binary_metric(&self, raw: &Array1<f64>, y: &Array1<f64>) -> f64 {
        let n = y.len() as f64;
        match self.config.eval_metric {
            EvalMetric::LogLoss => {
                raw.iter()
                    .zip(y.iter())
                    .map(|(&r, &t)| {
                        let p = Self::sigmoid(r).clamp(PROB_EPS, 1.0 - PROB_EPS);
                        -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
                    })
                    .sum::<f64>()
                    / n
            }
            EvalMetric::Error => {
                raw.iter()
                    .zip(y.iter())
                    .filter(|(&r, &t)| (Self::sigmoid(r) > 0.5) != (t > 0.5))
                    .count() as f64
                    / n
            }
        }
    }

    fn multiclass_metric(&self, raw: &Array2<f64>, y: &Array1<f64>) -> f64 {
        let n = y.len() as f64;
        let probs = softmax_rows(raw);
        match self.config.eval_metric {
            EvalMetric::LogLoss => {
                probs
                    .axis_iter(Axis(0))
                    .zip(y.iter())
                    .map(|(row, &t)| -row[t as usize].clamp(PROB_EPS, 1.0).ln())
                    .sum::<f64>()
                    / n
            }
            EvalMetric::Error => {
                probs
                    .axis_iter(Axis(0))
                    .zip(y.iter())
                    .filter(|(row, &t)| argmax(row) != t as usize)
                    .count() as f64
                    / n
            }
        }
    }

    fn check_input(&self, x: &Array2<f64>) -> Result<Objective> {
        let objective = self.objective.ok_or(TrainerError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(TrainerError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(objective)
    }

    /// Raw margins, one column per output group
    pub fn predict_margin(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let objective = self.check_input(x)?;
        let n_groups = objective.n_groups();
        let mut out = Array2::zeros((x.nrows(), n_groups));

        for (i, row) in x.axis_iter(Axis(0)).enumerate() {
            for k in 0..n_groups {
                let sum = self.trees[k].iter().fold(0.0, |acc, t| acc + t.predict(&row));
                out[[i, k]] = self.base_margin[k] + sum;
            }
        }
        Ok(out)
    }

    /// Class probabilities, one column per class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let margins = self.predict_margin(x)?;
        match self.check_input(x)? {
            Objective::BinaryLogistic => {
                let mut out = Array2::zeros((x.nrows(), 2));
                for (i, &m) in margins.column(0).iter().enumerate() {
                    let p = Self::sigmoid(m);
                    out[[i, 0]] = 1.0 - p;
                    out[[i, 1]] = p;
                }
                Ok(out)
            }
            Objective::MultiSoftprob { .. } => Ok(softmax_rows(&margins)),
        }
    }

    /// Predicted class indices
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        let probs = self.predict_proba(x)?;
        Ok(match self.check_input(x)? {
            Objective::BinaryLogistic => probs.column(1).mapv(|p| if p > 0.5 { 1 } else { 0 }),
            Objective::MultiSoftprob { .. } => probs.axis_iter(Axis(0)).map(|row| argmax(&row)).collect(),
        })
    }

    /// Accuracy against class indices
    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let preds = self.predict(x)?;
        let correct = preds.iter().zip(y.iter())
            .filter(|(&p, &a)| p as f64 == a)
            .count();
        Ok(correct as f64 / y.len() as f64)
    }

    /// Compute feature importances by counting splits across all trees
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.n_features == 0 { return None; }
        let mut counts = vec![0.0f64; self.n_features];
        for tree in self.trees.iter().flatten() {
            xgb_count_splits(tree, &mut counts);
        }
        let total: f64 = counts.iter().sum();
        if total > 0.0 {
            for c in counts.iter_mut() { *c /= total; }
        }
        Some(Array1::from_vec(counts))
    }

    pub fn is_fitted(&self) -> bool {
        self.objective.is_some()
    }

    pub fn objective(&self) -> Option<Objective> {
        self.objective
    }

    /// Trees per output group (one group for binary, one per class otherwise)
    pub fn trees(&self) -> &[Vec<XGBNode>] {
        &self.trees
    }

    pub fn base_margin(&self) -> &[f64] {
        &self.base_margin
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Training metric after each round
    pub fn evals_result(&self) -> &[f64] {
        &self.evals_result
    }
}

fn xgb_count_splits(node: &XGBNode, counts: &mut [f64]) {
    match node {
        XGBNode::Leaf { .. } => {}
        XGBNode::Split { feature, left, right, .. } => {
            if *feature < counts.len() { counts[*feature] += 1.0; }
            xgb_count_splits(left, counts);
            xgb_count_splits(right, counts);
        }
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

/// Row-wise softmax with max subtraction
pub(crate) fn softmax_rows(margins: &Array2<f64>) -> Array2<f64> {
    let mut out = margins.clone();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        row.mapv_inplace(|m| (m - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|e| e / sum);
    }
    out
}

/// Index of the first maximum
fn argmax(row: &ArrayView1<f64>) -> usize {
    let mut best = 0;
    for (i, &v) in row.iter().enumerate() {
        if v > row[best] {
            best = i;
        }
    }
    best
}

fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = (((n as f64) * ratio).ceil() as usize).clamp(1, n);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k);
    indices.sort();
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn classification_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((50, 2),
            (0..100).map(|i| i as f64 * 0.1).collect()
        ).unwrap();
        let y: Array1<f64> = x.rows().into_iter()
            .map(|r| if r[0] + r[1] > 5.0 { 1.0 } else { 0.0 })
            .collect();
        (x, y)
    }

    fn three_class_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((60, 2), |(i, j)| {
            let base = (i / 20) as f64 * 5.0;
            base + (i % 20) as f64 * 0.1 + j as f64 * 0.01
        });
        let y: Array1<f64> = (0..60).map(|i| (i / 20) as f64).collect();
        (x, y)
    }

    #[test]
    fn test_xgboost_classifier() {
        let (x, y) = classification_data();
        let mut model = XGBoostClassifier::new(XGBoostConfig {
            n_estimators: 50,
            max_depth: 4,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        let acc = model.score(&x, &y).unwrap();
        assert!(acc >= 0.8, "XGBoost classifier accuracy = {}", acc);
    }

    #[test]
    fn test_xgboost_predict_proba() {
        let (x, y) = classification_data();
        let mut model = XGBoostClassifier::new(Default::default());
        model.fit(&x, &y).unwrap();
        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.dim(), (x.nrows(), 2));
        for row in proba.rows() {
            assert!(row.iter().all(|&p| (0.0..=1.0).contains(&p)));
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_xgboost_multiclass() {
        let (x, y) = three_class_data();
        let mut model = XGBoostClassifier::new(XGBoostConfig {
            n_estimators: 20,
            max_depth: 3,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        assert_eq!(model.objective(), Some(Objective::MultiSoftprob { n_classes: 3 }));
        assert_eq!(model.trees().len(), 3);
        assert!(model.trees().iter().all(|g| g.len() == 20));
        assert!(model.score(&x, &y).unwrap() > 0.95);
    }

    #[test]
    fn test_logloss_decreases() {
        let (x, y) = classification_data();
        let mut model = XGBoostClassifier::new(XGBoostConfig {
            n_estimators: 30,
            max_depth: 3,
            learning_rate: 0.1,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        let history = model.evals_result();
        assert_eq!(history.len(), 30);
        assert!(history[29] < history[0]);
    }

    #[test]
    fn test_fixed_seed_is_deterministic() {
        let (x, y) = classification_data();
        let config = XGBoostConfig {
            n_estimators: 20,
            subsample: 0.8,
            colsample_bytree: 0.5,
            ..Default::default()
        };
        let mut a = XGBoostClassifier::new(config.clone());
        let mut b = XGBoostClassifier::new(config);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a.trees(), b.trees());
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_tree_depth_limit() {
        let (x, y) = classification_data();
        let mut model = XGBoostClassifier::new(XGBoostConfig {
            n_estimators: 5,
            max_depth: 2,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        assert!(model.trees()[0].iter().all(|t| t.depth() <= 2 && t.n_leaves() <= 4));
    }

    #[test]
    fn test_single_class_is_rejected() {
        let x = Array2::from_shape_vec((4, 1), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let y = Array1::from_elem(4, 0.0);
        let mut model = XGBoostClassifier::new(Default::default());
        assert!(matches!(model.fit(&x, &y), Err(TrainerError::TrainingError(_))));
    }

    #[test]
    fn test_predict_before_fit() {
        let model = XGBoostClassifier::new(Default::default());
        let x = Array2::zeros((2, 2));
        assert!(matches!(model.predict(&x), Err(TrainerError::ModelNotFitted)));
    }

    #[test]
    fn test_set_param() {
        let mut config = XGBoostConfig::default();
        config.set_param("max_depth", &ParameterValue::Int(4)).unwrap();
        config.set_param("learning_rate", &ParameterValue::Float(0.05)).unwrap();
        config.set_param("subsample", &ParameterValue::Float(0.8)).unwrap();
        assert_eq!(config.max_depth, 4);
        assert_eq!(config.learning_rate, 0.05);

        assert!(config.set_param("max_depth", &ParameterValue::Float(4.5)).is_err());
        assert!(config.set_param("subsample", &ParameterValue::Float(1.5)).is_err());
        assert!(matches!(
            config.set_param("booster", &ParameterValue::String("dart".into())),
            Err(TrainerError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_leaf_weight_regularization() {
        assert_eq!(compute_leaf_weight(2.0, 1.0, 1.0, 0.0), -1.0);
        assert_eq!(compute_leaf_weight(0.5, 1.0, 1.0, 1.0), 0.0);
        assert_eq!(compute_leaf_weight(-3.0, 1.0, 1.0, 1.0), 1.0);
    }

    #[test]
    fn test_feature_importances_sum_to_one() {
        let (x, y) = classification_data();
        let mut model = XGBoostClassifier::new(XGBoostConfig { n_estimators: 10, ..Default::default() });
        model.fit(&x, &y).unwrap();
        let imp = model.feature_importances().unwrap();
        assert!((imp.sum() - 1.0).abs() < 1e-9);
    }
}
