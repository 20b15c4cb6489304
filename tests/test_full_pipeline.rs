//! Integration test: full run from CSV tables to report and PMML file

use kolosal_xgb_trainer::config::RunConfig;
use kolosal_xgb_trainer::export::{Expression, PMMLModel, PMMLScorer, TreeNode, TreePredicate};
use kolosal_xgb_trainer::optimizer::ParamGrid;
use kolosal_xgb_trainer::preprocessing::ClassLabel;
use kolosal_xgb_trainer::training::{RunEvent, TrainEngine};
use kolosal_xgb_trainer::TrainerError;
use polars::prelude::*;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::fs::{self, File};
use std::path::Path;
use tempfile::TempDir;

fn write_csv(path: &Path, mut df: DataFrame) {
    let mut file = File::create(path).unwrap();
    CsvWriter::new(&mut file).include_header(true).finish(&mut df).unwrap();
}

/// Feature and label tables; `label_of` maps (f0, f1) to a class
fn write_tables(
    dir: &Path,
    prefix: &str,
    n_rows: usize,
    first_id: i64,
    seed: u64,
    label_of: impl Fn(f64, f64) -> i64,
) {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let ids: Vec<i64> = (0..n_rows as i64).map(|i| first_id + i).collect();
    let f0: Vec<f64> = (0..n_rows).map(|_| rng.gen_range(-2.0..2.0)).collect();
    let f1: Vec<f64> = (0..n_rows).map(|_| rng.gen_range(-2.0..2.0)).collect();
    let f2: Vec<f64> = (0..n_rows).map(|_| rng.gen_range(0.0..10.0)).collect();
    let labels: Vec<i64> = f0.iter().zip(&f1).map(|(&a, &b)| label_of(a, b)).collect();

    write_csv(
        &dir.join(format!("X_{}.csv", prefix)),
        df!("idx" => &ids, "f0" => &f0, "f1" => &f1, "f2" => &f2).unwrap(),
    );
    // reversed row order in the label table
    let rev_ids: Vec<i64> = ids.iter().rev().copied().collect();
    let rev_labels: Vec<i64> = labels.iter().rev().copied().collect();
    write_csv(
        &dir.join(format!("y_{}.csv", prefix)),
        df!("idx" => &rev_ids, "label" => &rev_labels).unwrap(),
    );
}

fn binary_label(a: f64, b: f64) -> i64 {
    (a + 0.5 * b > 0.0) as i64
}

fn small_grid() -> ParamGrid {
    ParamGrid::new()
        .add("xgb__n_estimators", vec![30i64])
        .add("xgb__max_depth", vec![2i64, 3])
        .add("xgb__learning_rate", vec![0.1])
}

fn workspace() -> (TempDir, RunConfig) {
    let root = TempDir::new().unwrap();
    let data_dir = root.path().join("data");
    let model_dir = root.path().join("model_training");
    fs::create_dir_all(&data_dir).unwrap();
    fs::create_dir_all(&model_dir).unwrap();
    let config = RunConfig {
        data_dir,
        model_dir,
        ..RunConfig::default()
    };
    (root, config)
}

#[test]
fn test_full_run_with_default_grid() {
    let (_root, config) = workspace();
    write_tables(&config.data_dir, "train", 120, 0, 1, binary_label);
    write_tables(&config.data_dir, "test", 40, 1000, 2, binary_label);

    let outcome = TrainEngine::new(config.clone()).run().unwrap();

    assert_eq!(outcome.search.n_fits, 24);
    assert_eq!(outcome.feature_names, vec!["f0", "f1", "f2"]);
    assert_eq!(outcome.test_predictions.len(), 40);
    assert!(outcome.report.accuracy > 0.7);

    let report = fs::read_to_string(config.report_path()).unwrap();
    assert!(report.starts_with("Best params: {'xgb__colsample_bytree': 0.8, "));
    let mut parts = report.splitn(2, "\n\n");
    let first_line = parts.next().unwrap();
    assert!(!first_line.contains('\n'));
    let body = parts.next().unwrap();
    assert!(body.starts_with("              precision    recall  f1-score   support\n"));
    assert!(body.contains("    accuracy"));
    assert!(body.contains("   macro avg"));
    assert!(body.contains("weighted avg"));

    let pmml = fs::read_to_string(config.pmml_path()).unwrap();
    assert!(pmml.starts_with("<?xml"));
    assert!(pmml.contains("version=\"4.4\""));
    assert!(pmml.contains("multipleModelMethod=\"modelChain\""));
    assert!(pmml.contains("name=\"standardScaler(f0)\""));
    assert!(pmml.contains("normalizationMethod=\"logit\""));
    assert_eq!(outcome.pmml_path, config.pmml_path());
}

#[test]
fn test_exported_model_matches_in_process_predictions() {
    let (_root, mut config) = workspace();
    config.param_grid = small_grid();
    write_tables(&config.data_dir, "train", 100, 0, 3, binary_label);
    write_tables(&config.data_dir, "test", 50, 500, 4, binary_label);

    let engine = TrainEngine::new(config);
    let outcome = engine.run().unwrap();
    let data = engine.load_data().unwrap();

    let scorer = PMMLScorer::new(&outcome.pmml).unwrap();
    assert_eq!(scorer.inputs(), outcome.feature_names.as_slice());

    let (pmml_proba, pmml_labels) = scorer.score(&data.test.features).unwrap();
    let proba = outcome.search.best_estimator.predict_proba(&data.test.features).unwrap();
    for (a, b) in pmml_proba.iter().zip(proba.iter()) {
        assert!((a - b).abs() < 1e-9, "{} vs {}", a, b);
    }
    let expected: Vec<String> = outcome.test_predictions.iter().map(|l| l.to_string()).collect();
    assert_eq!(pmml_labels, expected);
}

/// Every number the writer emits, grouped by where it appears, in document order
#[derive(Debug, Default, PartialEq)]
struct Numbers {
    importances: Vec<f64>,
    constants: Vec<f64>,
    intercepts: Vec<f64>,
    coefficients: Vec<f64>,
    scores: Vec<f64>,
    split_values: Vec<f64>,
}

fn collect_expression(expr: &Expression, out: &mut Numbers) {
    match expr {
        Expression::Constant(v) => out.constants.push(*v),
        Expression::Apply { args, .. } => args.iter().for_each(|a| collect_expression(a, out)),
        Expression::FieldRef(_) => {}
    }
}

fn collect_predicate(predicate: &TreePredicate, out: &mut Numbers) {
    match predicate {
        TreePredicate::SimplePredicate { value, .. } => out.split_values.push(value.parse().unwrap()),
        TreePredicate::CompoundPredicate { predicates, .. } => {
            predicates.iter().for_each(|p| collect_predicate(p, out))
        }
        TreePredicate::True => {}
    }
}

fn collect_node(node: &TreeNode, out: &mut Numbers) {
    out.scores.extend(node.score);
    collect_predicate(&node.predicate, out);
    node.children.iter().for_each(|c| collect_node(c, out));
}

fn collect_model(model: &PMMLModel, out: &mut Numbers) {
    match model {
        PMMLModel::Mining(m) => {
            out.importances.extend(m.mining_schema.iter().filter_map(|f| f.importance));
            for field in &m.local_transformations {
                collect_expression(&field.expression, out);
            }
            for segment in &m.segmentation.segments {
                collect_predicate(&segment.predicate, out);
                collect_model(&segment.model, out);
            }
        }
        PMMLModel::Regression(m) => {
            out.importances.extend(m.mining_schema.iter().filter_map(|f| f.importance));
            for table in &m.tables {
                out.intercepts.push(table.intercept);
                out.coefficients.extend(table.predictors.iter().map(|p| p.coefficient));
            }
        }
        PMMLModel::Tree(m) => {
            out.importances.extend(m.mining_schema.iter().filter_map(|f| f.importance));
            collect_node(&m.root, out);
        }
    }
}

fn attribute(line: &str, name: &str) -> Option<f64> {
    let key = format!(" {}=\"", name);
    let start = line.find(&key)? + key.len();
    let end = start + line[start..].find('"')?;
    Some(line[start..end].parse().unwrap())
}

/// Numbers read back from the XML text, one element per line
fn numbers_in_file(text: &str) -> Numbers {
    let mut out = Numbers::default();
    for line in text.lines().map(str::trim_start) {
        if line.starts_with("<MiningField") {
            out.importances.extend(attribute(line, "importance"));
        } else if let Some(rest) = line.strip_prefix("<Constant dataType=\"double\">") {
            let value = rest.strip_suffix("</Constant>").unwrap();
            out.constants.push(value.parse().unwrap());
        } else if line.starts_with("<RegressionTable") {
            out.intercepts.extend(attribute(line, "intercept"));
        } else if line.starts_with("<NumericPredictor") {
            out.coefficients.extend(attribute(line, "coefficient"));
        } else if line.starts_with("<Node") {
            out.scores.extend(attribute(line, "score"));
        } else if line.starts_with("<SimplePredicate") {
            out.split_values.extend(attribute(line, "value"));
        }
    }
    out
}

#[test]
fn test_written_pmml_numbers_match_model() {
    for (seed, three_classes) in [(11u64, false), (12, true)] {
        let (_root, mut config) = workspace();
        config.param_grid = small_grid();
        let label_of = move |a: f64, b: f64| {
            if three_classes {
                if a < -0.7 { 0 } else if a < 0.7 { 1 } else { 2 }
            } else {
                binary_label(a, b)
            }
        };
        write_tables(&config.data_dir, "train", 90, 0, seed, label_of);
        write_tables(&config.data_dir, "test", 20, 500, seed + 100, label_of);

        let outcome = TrainEngine::new(config.clone()).run().unwrap();

        let mut expected = Numbers::default();
        collect_model(&outcome.pmml.model, &mut expected);
        assert_eq!(expected.constants.len(), 2 * outcome.feature_names.len());
        assert!(!expected.scores.is_empty());
        assert!(!expected.split_values.is_empty());

        // exact equality: every value must survive the decimal text unchanged
        let text = fs::read_to_string(config.pmml_path()).unwrap();
        assert_eq!(numbers_in_file(&text), expected);

        let scaler = outcome.search.best_estimator.scaler();
        let from_scaler: Vec<f64> = scaler.params().iter().flat_map(|p| [p.center, p.scale]).collect();
        assert_eq!(expected.constants, from_scaler);
    }
}

#[test]
fn test_run_events_follow_stage_order() {
    let (_root, mut config) = workspace();
    config.param_grid = small_grid();
    write_tables(&config.data_dir, "train", 60, 0, 13, binary_label);
    write_tables(&config.data_dir, "test", 20, 500, 14, binary_label);

    let mut events = Vec::new();
    TrainEngine::new(config)
        .run_with(|event| {
            events.push(match event {
                RunEvent::LoadStarted => "load_started",
                RunEvent::Loaded { .. } => "loaded",
                RunEvent::SearchStarted { n_candidates } => {
                    assert_eq!(n_candidates, 2);
                    "search_started"
                }
                RunEvent::Searched { .. } => "searched",
                RunEvent::EvaluateStarted => "evaluate_started",
                RunEvent::Evaluated { .. } => "evaluated",
                RunEvent::ReportWritten { .. } => "report_written",
                RunEvent::Exported { .. } => "exported",
            })
        })
        .unwrap();

    assert_eq!(
        events,
        vec![
            "load_started",
            "loaded",
            "search_started",
            "searched",
            "evaluate_started",
            "evaluated",
            "report_written",
            "exported",
        ]
    );
}

#[test]
fn test_multiclass_run() {
    let (_root, mut config) = workspace();
    config.param_grid = small_grid();
    let three = |a: f64, _b: f64| if a < -0.7 { 0 } else if a < 0.7 { 1 } else { 2 };
    write_tables(&config.data_dir, "train", 120, 0, 5, three);
    write_tables(&config.data_dir, "test", 30, 500, 6, three);

    let outcome = TrainEngine::new(config.clone()).run().unwrap();
    assert_eq!(outcome.report.classes.len(), 3);

    let pmml = fs::read_to_string(config.pmml_path()).unwrap();
    assert!(pmml.contains("normalizationMethod=\"softmax\""));
    assert!(pmml.contains("xgbValue(2)"));
}

#[test]
fn test_unseen_test_class_scores_zero() {
    let (_root, mut config) = workspace();
    config.param_grid = small_grid();
    write_tables(&config.data_dir, "train", 90, 0, 7, binary_label);
    // class 2 never appears in training
    write_tables(&config.data_dir, "test", 30, 500, 8, |a, b| {
        if a > 1.5 { 2 } else { binary_label(a, b) }
    });

    let engine = TrainEngine::new(config);
    let data = engine.load_data().unwrap();
    let n_unseen = data.test.labels.iter().filter(|l| **l == ClassLabel::Int(2)).count();
    assert!(n_unseen > 0);

    let outcome = engine.run().unwrap();
    let unseen = outcome.report.class(&ClassLabel::Int(2)).unwrap();
    assert_eq!(unseen.precision, 0.0);
    assert_eq!(unseen.recall, 0.0);
    assert_eq!(unseen.f1_score, 0.0);
    assert_eq!(unseen.support, n_unseen);
    assert!(outcome.test_predictions.iter().all(|l| *l != ClassLabel::Int(2)));
}

#[test]
fn test_missing_model_dir_is_fatal() {
    let (root, mut config) = workspace();
    config.param_grid = small_grid();
    config.model_dir = root.path().join("does_not_exist");
    write_tables(&config.data_dir, "train", 60, 0, 9, binary_label);
    write_tables(&config.data_dir, "test", 20, 500, 10, binary_label);

    let err = TrainEngine::new(config).run().unwrap_err();
    assert!(matches!(err, TrainerError::ExportError(_)));
}
