//! Integration test: grid search over the scaler + booster pipeline

use kolosal_xgb_trainer::config::{default_param_grid, RunConfig};
use kolosal_xgb_trainer::optimizer::{GridSearchCV, GridSearchConfig, ParamGrid, ParameterValue, Scoring};
use kolosal_xgb_trainer::preprocessing::ClassLabel;
use kolosal_xgb_trainer::training::{CVStrategy, ClassificationReport, Pipeline};
use kolosal_xgb_trainer::TrainerError;
use ndarray::Array2;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Binary data whose class is the sign of `f0 + 0.5 * f1`
fn binary_data(n_rows: usize, n_features: usize, seed: u64) -> (Array2<f64>, Vec<ClassLabel>) {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen_range(-2.0..2.0));
    let y = x
        .rows()
        .into_iter()
        .map(|row| ClassLabel::Int((row[0] + 0.5 * row[1] > 0.0) as i64))
        .collect();
    (x, y)
}

/// Three classes split on `f0`
fn three_class_data(n_rows: usize, seed: u64) -> (Array2<f64>, Vec<ClassLabel>) {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let x = Array2::from_shape_fn((n_rows, 3), |_| rng.gen_range(-3.0..3.0));
    let y = x
        .rows()
        .into_iter()
        .map(|row| {
            let name = if row[0] < -1.0 {
                "low"
            } else if row[0] < 1.0 {
                "mid"
            } else {
                "high"
            };
            ClassLabel::from(name)
        })
        .collect();
    (x, y)
}

fn small_grid() -> ParamGrid {
    ParamGrid::new()
        .add("xgb__n_estimators", vec![20i64])
        .add("xgb__max_depth", vec![2i64, 3])
}

#[test]
fn test_default_grid_search() {
    let (x, y) = binary_data(120, 5, 7);
    let config = RunConfig::default();

    let search = GridSearchCV::new(config.base_pipeline(), default_param_grid(), config.search_config());
    let result = search.fit(&x, &y).unwrap();

    assert_eq!(result.candidates.len(), 8);
    assert_eq!(result.n_fits, 24);
    assert!(result.candidates.iter().all(|c| c.cv.n_folds == 3));
    assert!(result.candidates.iter().all(|c| c.rank >= 1 && c.rank <= 8));

    let best = &result.candidates[result.best_index];
    assert_eq!(best.rank, 1);
    assert_eq!(best.params, result.best_params);
    assert!((best.cv.mean_score - result.best_score).abs() < 1e-12);
    // the first rank-1 candidate in grid order wins
    assert!(result.candidates[..result.best_index].iter().all(|c| c.rank > 1));

    assert!(result.best_score > 0.7);
    assert!(result.best_estimator.is_fitted());
    assert!(result.best_params_string().starts_with("{'xgb__colsample_bytree': 0.8, "));
}

#[test]
fn test_search_is_deterministic() {
    let (x, y) = binary_data(90, 4, 11);
    let (x_test, _) = binary_data(30, 4, 12);
    let config = RunConfig::default();

    let run = || {
        GridSearchCV::new(config.base_pipeline(), small_grid(), config.search_config())
            .fit(&x, &y)
            .unwrap()
    };
    let first = run();
    let second = run();

    assert_eq!(first.best_params, second.best_params);
    assert_eq!(first.best_score, second.best_score);
    assert_eq!(
        first.best_estimator.predict_proba(&x_test).unwrap(),
        second.best_estimator.predict_proba(&x_test).unwrap()
    );
}

#[test]
fn test_unknown_parameter_rejected() {
    let (x, y) = binary_data(30, 3, 3);
    let grid = ParamGrid::new().add("xgb__num_leaves", vec![31i64]);

    let err = GridSearchCV::new(Pipeline::default(), grid, GridSearchConfig::new())
        .fit(&x, &y)
        .unwrap_err();
    assert!(matches!(err, TrainerError::InvalidParameter { .. }));
}

#[test]
fn test_unknown_stage_rejected() {
    let mut pipeline = Pipeline::default();
    let err = pipeline.set_param("svm__C", &ParameterValue::Float(1.0)).unwrap_err();
    assert!(matches!(err, TrainerError::InvalidParameter { .. }));
}

#[test]
fn test_multiclass_search() {
    let (x, y) = three_class_data(150, 5);
    let config = GridSearchConfig::new()
        .with_cv(CVStrategy::StratifiedKFold { n_splits: 3, shuffle: false })
        .with_scoring(Scoring::F1Macro)
        .with_verbose(false);

    let result = GridSearchCV::new(Pipeline::default(), small_grid(), config)
        .fit(&x, &y)
        .unwrap();
    assert_eq!(result.n_fits, 6);

    let model = &result.best_estimator;
    assert_eq!(
        model.classes(),
        &[ClassLabel::from("high"), ClassLabel::from("low"), ClassLabel::from("mid")]
    );

    let proba = model.predict_proba(&x).unwrap();
    assert_eq!(proba.dim(), (150, 3));
    for row in proba.rows() {
        assert!((row.sum() - 1.0).abs() < 1e-9);
    }

    let report = ClassificationReport::compute(&y, &model.predict(&x).unwrap());
    assert!(report.accuracy > 0.9);
    assert_eq!(report.classes.len(), 3);
}

#[test]
fn test_single_class_training_fails() {
    let (x, _) = binary_data(20, 2, 1);
    let y = vec![ClassLabel::Int(1); 20];
    let mut pipeline = Pipeline::default();
    assert!(pipeline.fit(&x, &y).is_err());
}
