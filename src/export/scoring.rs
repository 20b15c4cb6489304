//! Evaluation of a PMML document on raw feature values
//!
//! Supports the elements [`super::pipeline_to_pmml`] emits: derived fields
//! built from `FieldRef`/`Constant`/`Apply`, tree models, `sum` and
//! `modelChain` segmentation and classification regression models with
//! `logit`, `softmax` or no normalization.

use super::pmml::*;
use crate::error::{Result, TrainerError};
use ndarray::{Array2, Axis};
use std::collections::HashMap;

/// Scored row
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Probabilities in target category order
    pub probabilities: Vec<f64>,
    pub label: String,
}

enum ModelOutput {
    Value(f64),
    Probabilities(Vec<(String, f64)>),
}

type Fields = HashMap<String, f64>;

pub struct PMMLScorer<'a> {
    doc: &'a PMMLDocument,
    inputs: Vec<String>,
    categories: Vec<String>,
}

impl<'a> PMMLScorer<'a> {
    /// Prepare a scorer; inputs are the active fields of the top-level model
    pub fn new(doc: &'a PMMLDocument) -> Result<Self> {
        let schema = match &doc.model {
            PMMLModel::Mining(m) => &m.mining_schema,
            PMMLModel::Regression(m) => &m.mining_schema,
            PMMLModel::Tree(m) => &m.mining_schema,
        };
        let inputs = schema
            .iter()
            .filter(|f| f.usage_type == FieldUsageType::Active)
            .map(|f| f.name.clone())
            .collect();
        let target = schema
            .iter()
            .find(|f| f.usage_type == FieldUsageType::Target)
            .ok_or_else(|| scoring_err("model has no target field"))?;
        let categories = doc
            .data_field(&target.name)
            .and_then(|f| f.values.clone())
            .ok_or_else(|| scoring_err("target field has no categories"))?;

        Ok(Self { doc, inputs, categories })
    }

    /// Active input field names in the order `score_row` expects
    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn score_row(&self, values: &[f64]) -> Result<Prediction> {
        if values.len() != self.inputs.len() {
            return Err(TrainerError::ShapeError {
                expected: format!("{} inputs", self.inputs.len()),
                actual: format!("{} inputs", values.len()),
            });
        }
        let mut fields: Fields = self.inputs.iter().cloned().zip(values.iter().copied()).collect();

        let by_category = match evaluate(&self.doc.model, &mut fields)? {
            ModelOutput::Probabilities(p) => p,
            ModelOutput::Value(_) => return Err(scoring_err("model does not produce probabilities")),
        };

        let probabilities = self
            .categories
            .iter()
            .map(|c| {
                by_category
                    .iter()
                    .find(|(cat, _)| cat == c)
                    .map(|(_, p)| *p)
                    .ok_or_else(|| scoring_err(&format!("no probability for category '{}'", c)))
            })
            .collect::<Result<Vec<f64>>>()?;

        let mut best = 0;
        for (i, &p) in probabilities.iter().enumerate() {
            if p > probabilities[best] {
                best = i;
            }
        }

        Ok(Prediction {
            label: self.categories[best].clone(),
            probabilities,
        })
    }

    /// Score every row; probabilities come back as one column per category
    pub fn score(&self, x: &Array2<f64>) -> Result<(Array2<f64>, Vec<String>)> {
        let mut probs = Array2::zeros((x.nrows(), self.categories.len()));
        let mut labels = Vec::with_capacity(x.nrows());
        for (i, row) in x.axis_iter(Axis(0)).enumerate() {
            let pred = self.score_row(&row.to_vec())?;
            for (j, p) in pred.probabilities.iter().enumerate() {
                probs[[i, j]] = *p;
            }
            labels.push(pred.label);
        }
        Ok((probs, labels))
    }
}

fn scoring_err(msg: &str) -> TrainerError {
    TrainerError::ValidationError(format!("PMML scoring: {}", msg))
}

fn field(fields: &Fields, name: &str) -> Result<f64> {
    fields
        .get(name)
        .copied()
        .ok_or_else(|| scoring_err(&format!("unknown field '{}'", name)))
}

fn evaluate(model: &PMMLModel, fields: &mut Fields) -> Result<ModelOutput> {
    match model {
        PMMLModel::Tree(tree) => evaluate_tree(&tree.root, fields).map(ModelOutput::Value),
        PMMLModel::Regression(reg) => evaluate_regression(reg, fields),
        PMMLModel::Mining(mining) => {
            for derived in &mining.local_transformations {
                let value = evaluate_expression(&derived.expression, fields)?;
                fields.insert(derived.name.clone(), value);
            }
            evaluate_segmentation(&mining.segmentation, fields)
        }
    }
}

fn evaluate_segmentation(segmentation: &Segmentation, fields: &mut Fields) -> Result<ModelOutput> {
    match segmentation.method {
        MultipleModelMethod::Sum => {
            let mut total = 0.0;
            for segment in &segmentation.segments {
                if !evaluate_predicate(&segment.predicate, fields)? {
                    continue;
                }
                match evaluate(&segment.model, fields)? {
                    ModelOutput::Value(v) => total += v,
                    ModelOutput::Probabilities(_) => {
                        return Err(scoring_err("sum segmentation over a classifier"))
                    }
                }
            }
            Ok(ModelOutput::Value(total))
        }
        MultipleModelMethod::ModelChain => {
            let mut last = None;
            for segment in &segmentation.segments {
                if !evaluate_predicate(&segment.predicate, fields)? {
                    continue;
                }
                let out = evaluate(&segment.model, fields)?;
                if let ModelOutput::Value(v) = out {
                    for name in predicted_outputs(&segment.model) {
                        fields.insert(name, v);
                    }
                }
                last = Some(out);
            }
            last.ok_or_else(|| scoring_err("no segment of the model chain was selected"))
        }
    }
}

fn predicted_outputs(model: &PMMLModel) -> Vec<String> {
    let output = match model {
        PMMLModel::Mining(m) => &m.output,
        PMMLModel::Regression(m) => &m.output,
        PMMLModel::Tree(_) => return Vec::new(),
    };
    output
        .iter()
        .filter(|f| f.feature == ResultFeature::PredictedValue)
        .map(|f| f.name.clone())
        .collect()
}

fn evaluate_tree(root: &TreeNode, fields: &Fields) -> Result<f64> {
    if !evaluate_predicate(&root.predicate, fields)? {
        return Err(scoring_err("tree root predicate is false"));
    }
    let mut node = root;
    loop {
        if node.children.is_empty() {
            return node
                .score
                .ok_or_else(|| scoring_err(&format!("leaf node {} has no score", node.id)));
        }
        let mut next = None;
        for child in &node.children {
            if evaluate_predicate(&child.predicate, fields)? {
                next = Some(child);
                break;
            }
        }
        node = next.ok_or_else(|| scoring_err(&format!("no child of node {} matched", node.id)))?;
    }
}

fn evaluate_predicate(predicate: &TreePredicate, fields: &Fields) -> Result<bool> {
    match predicate {
        TreePredicate::True => Ok(true),
        TreePredicate::SimplePredicate { field: name, operator, value } => {
            let x = field(fields, name)?;
            let v: f64 = value
                .parse()
                .map_err(|_| scoring_err(&format!("non-numeric predicate value '{}'", value)))?;
            match operator.as_str() {
                "lessOrEqual" => Ok(x <= v),
                "lessThan" => Ok(x < v),
                "greaterThan" => Ok(x > v),
                "greaterOrEqual" => Ok(x >= v),
                "equal" => Ok(x == v),
                "notEqual" => Ok(x != v),
                other => Err(scoring_err(&format!("unsupported operator '{}'", other))),
            }
        }
        TreePredicate::CompoundPredicate { boolean_operator, predicates } => {
            let results = predicates
                .iter()
                .map(|p| evaluate_predicate(p, fields))
                .collect::<Result<Vec<bool>>>()?;
            match boolean_operator.as_str() {
                "and" => Ok(results.iter().all(|&b| b)),
                "or" => Ok(results.iter().any(|&b| b)),
                other => Err(scoring_err(&format!("unsupported boolean operator '{}'", other))),
            }
        }
    }
}

fn evaluate_expression(expr: &Expression, fields: &Fields) -> Result<f64> {
    match expr {
        Expression::FieldRef(name) => field(fields, name),
        Expression::Constant(v) => Ok(*v),
        Expression::Apply { function, args } => {
            let values = args
                .iter()
                .map(|a| evaluate_expression(a, fields))
                .collect::<Result<Vec<f64>>>()?;
            let &[a, b] = values.as_slice() else {
                return Err(scoring_err(&format!("function '{}' expects two arguments", function)));
            };
            match function.as_str() {
                "+" => Ok(a + b),
                "-" => Ok(a - b),
                "*" => Ok(a * b),
                "/" => Ok(a / b),
                other => Err(scoring_err(&format!("unsupported function '{}'", other))),
            }
        }
    }
}

fn evaluate_regression(model: &RegressionModel, fields: &Fields) -> Result<ModelOutput> {
    let mut raw = Vec::with_capacity(model.tables.len());
    for table in &model.tables {
        let mut y = table.intercept;
        for pred in &table.predictors {
            let x = field(fields, &pred.name)?;
            let term = if pred.exponent == 1 { x } else { x.powi(pred.exponent) };
            y += pred.coefficient * term;
        }
        raw.push((table.target_category.clone().unwrap_or_default(), y));
    }

    if model.function_name != "classification" {
        return match raw.as_slice() {
            [(_, y)] => Ok(ModelOutput::Value(*y)),
            _ => Err(scoring_err("regression function needs exactly one table")),
        };
    }

    let probs: Vec<f64> = match model.normalization_method {
        NormalizationMethod::Logit => {
            // last category takes the remaining mass
            let mut p: Vec<f64> = raw.iter().map(|(_, y)| 1.0 / (1.0 + (-y).exp())).collect();
            if let Some((last, rest)) = p.split_last_mut() {
                *last = 1.0 - rest.iter().sum::<f64>();
            }
            p
        }
        NormalizationMethod::Softmax => {
            let max = raw.iter().map(|(_, y)| *y).fold(f64::NEG_INFINITY, f64::max);
            let exps: Vec<f64> = raw.iter().map(|(_, y)| (y - max).exp()).collect();
            let sum: f64 = exps.iter().sum();
            exps.into_iter().map(|e| e / sum).collect()
        }
        NormalizationMethod::None => raw.iter().map(|(_, y)| *y).collect(),
    };

    Ok(ModelOutput::Probabilities(
        raw.into_iter().map(|(c, _)| c).zip(probs).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::pipeline_to_pmml;
    use crate::preprocessing::{ClassLabel, StandardScaler};
    use crate::training::pipeline::Pipeline;
    use crate::training::xgboost::XGBoostConfig;

    fn fit(labels: &[i64]) -> (Pipeline, Array2<f64>) {
        let x = Array2::from_shape_fn((labels.len(), 3), |(i, j)| {
            labels[i] as f64 * 1.5 + ((i * 5 + j * 2) % 7) as f64 * 0.25 - j as f64
        });
        let y: Vec<ClassLabel> = labels.iter().map(|&v| ClassLabel::Int(v)).collect();
        let config = XGBoostConfig { n_estimators: 10, max_depth: 3, ..XGBoostConfig::default() };
        let mut p = Pipeline::new(StandardScaler::new(), config);
        p.fit(&x, &y).unwrap();
        (p, x)
    }

    fn names() -> Vec<String> {
        vec!["a".into(), "b".into(), "c".into()]
    }

    fn check_round_trip(labels: &[i64]) {
        let (p, x) = fit(labels);
        let doc = pipeline_to_pmml(&p, &names(), "label").unwrap();
        let scorer = PMMLScorer::new(&doc).unwrap();
        assert_eq!(scorer.inputs(), names().as_slice());

        let (probs, predicted) = scorer.score(&x).unwrap();
        let expected = p.predict_proba(&x).unwrap();
        for (a, b) in probs.iter().zip(expected.iter()) {
            assert!((a - b).abs() <= 1e-9, "{} vs {}", a, b);
        }
        let in_process: Vec<String> = p.predict(&x).unwrap().iter().map(|l| l.to_string()).collect();
        assert_eq!(predicted, in_process);
    }

    #[test]
    fn test_binary_round_trip() {
        check_round_trip(&[0, 1, 0, 1, 1, 0, 0, 1, 1, 1, 0, 0]);
    }

    #[test]
    fn test_multiclass_round_trip() {
        check_round_trip(&[0, 1, 2, 0, 1, 2, 2, 1, 0, 0, 2, 1]);
    }

    #[test]
    fn test_wrong_input_width() {
        let (p, _) = fit(&[0, 1, 0, 1, 0, 1]);
        let doc = pipeline_to_pmml(&p, &names(), "label").unwrap();
        let scorer = PMMLScorer::new(&doc).unwrap();
        assert!(scorer.score_row(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_expression_arithmetic() {
        let mut fields = Fields::new();
        fields.insert("x".to_string(), 7.0);
        let expr = Expression::apply(
            "/",
            vec![
                Expression::apply("-", vec![Expression::FieldRef("x".into()), Expression::Constant(1.0)]),
                Expression::Constant(4.0),
            ],
        );
        assert_eq!(evaluate_expression(&expr, &fields).unwrap(), 1.5);
        assert!(evaluate_expression(&Expression::FieldRef("y".into()), &fields).is_err());
    }
}
