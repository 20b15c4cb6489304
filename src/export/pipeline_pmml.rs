//! Conversion of a fitted scaler + boosted tree pipeline into PMML
//!
//! Layout of the generated document:
//!
//! ```text
//! MiningModel (classification)
//!   LocalTransformations: standardScaler(<feature>) = (x - mean) / scale
//!   Segmentation modelChain
//!     Segment: MiningModel (regression, sum of trees) -> xgbValue
//!     ...one per class when there are more than two classes
//!     Segment: RegressionModel (logit | softmax) -> class probabilities
//! ```

use super::pmml::*;
use crate::error::{Result, TrainerError};
use crate::preprocessing::ClassLabel;
use crate::training::pipeline::Pipeline;
use crate::training::xgboost::{Objective, XGBNode};
use std::path::Path;
use tracing::info;

const MODEL_NAME: &str = "XGBoostModel";

fn scaled_name(feature: &str) -> String {
    format!("standardScaler({})", feature)
}

fn group_output_name(objective: Objective, group: usize) -> String {
    match objective {
        Objective::BinaryLogistic => "xgbValue".to_string(),
        Objective::MultiSoftprob { .. } => format!("xgbValue({})", group),
    }
}

/// Build the PMML document of a fitted pipeline.
///
/// `feature_names` must be in training column order.
pub fn pipeline_to_pmml(
    pipeline: &Pipeline,
    feature_names: &[String],
    target_name: &str,
) -> Result<PMMLDocument> {
    if !pipeline.is_fitted() {
        return Err(TrainerError::ModelNotFitted);
    }
    let classifier = pipeline.classifier();
    let objective = classifier.objective().ok_or(TrainerError::ModelNotFitted)?;
    if feature_names.len() != classifier.n_features() {
        return Err(TrainerError::ExportError(format!(
            "{} feature names for a model fitted on {} features",
            feature_names.len(),
            classifier.n_features()
        )));
    }

    let classes: Vec<String> = pipeline.classes().iter().map(|c| c.to_string()).collect();
    let target_type = if pipeline.classes().iter().all(ClassLabel::is_int) {
        PMMLDataType::Integer
    } else {
        PMMLDataType::String
    };

    let mut data_dictionary: Vec<DataField> =
        feature_names.iter().map(DataField::continuous).collect();
    data_dictionary.push(DataField::categorical(target_name, target_type, classes.clone()));

    let importances = classifier.feature_importances().unwrap_or_default();
    let mut mining_schema: Vec<MiningField> = feature_names
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let field = MiningField::active(name);
            match importances.get(j) {
                Some(&imp) => field.with_importance(imp),
                None => field,
            }
        })
        .collect();
    mining_schema.push(MiningField::target(target_name));

    let mut output: Vec<OutputField> = classes
        .iter()
        .map(|c| OutputField::probability(format!("probability_{}", c), c.clone()))
        .collect();
    output.push(OutputField::predicted("predicted_label", OpType::Categorical, target_type));

    let local_transformations: Vec<DerivedField> = feature_names
        .iter()
        .zip(pipeline.scaler().params())
        .map(|(name, p)| DerivedField {
            name: scaled_name(name),
            op_type: OpType::Continuous,
            data_type: PMMLDataType::Double,
            expression: Expression::apply(
                "/",
                vec![
                    Expression::apply(
                        "-",
                        vec![Expression::FieldRef(name.clone()), Expression::Constant(p.center)],
                    ),
                    Expression::Constant(p.scale),
                ],
            ),
        })
        .collect();

    let active: Vec<MiningField> = feature_names.iter().map(MiningField::active).collect();
    let mut segments: Vec<Segment> = classifier
        .trees()
        .iter()
        .enumerate()
        .map(|(k, trees)| Segment {
            id: (k + 1).to_string(),
            predicate: TreePredicate::True,
            model: PMMLModel::Mining(Box::new(tree_sum_model(
                trees,
                feature_names,
                &active,
                group_output_name(objective, k),
            ))),
        })
        .collect();

    segments.push(Segment {
        id: (segments.len() + 1).to_string(),
        predicate: TreePredicate::True,
        model: PMMLModel::Regression(link_model(
            objective,
            classifier.base_margin(),
            &classes,
            target_name,
        )),
    });

    Ok(PMMLDocument {
        version: PMML_VERSION.to_string(),
        header: PMMLHeader {
            description: Some("Standard scaler and gradient boosted trees".to_string()),
            ..PMMLHeader::default()
        },
        data_dictionary,
        model: PMMLModel::Mining(Box::new(MiningModel {
            model_name: Some(MODEL_NAME.to_string()),
            function_name: "classification".to_string(),
            mining_schema,
            output,
            local_transformations,
            segmentation: Segmentation {
                method: MultipleModelMethod::ModelChain,
                segments,
            },
        })),
    })
}

/// Build and write the PMML document of a fitted pipeline
pub fn export_pipeline(
    pipeline: &Pipeline,
    feature_names: &[String],
    target_name: &str,
    path: impl AsRef<Path>,
) -> Result<PMMLDocument> {
    let doc = pipeline_to_pmml(pipeline, feature_names, target_name)?;
    PMMLExporter::new().export(&doc, path.as_ref())?;
    info!(path = %path.as_ref().display(), "wrote PMML model");
    Ok(doc)
}

fn tree_sum_model(
    trees: &[XGBNode],
    feature_names: &[String],
    active: &[MiningField],
    output_name: String,
) -> MiningModel {
    let segments = trees
        .iter()
        .enumerate()
        .map(|(i, tree)| Segment {
            id: (i + 1).to_string(),
            predicate: TreePredicate::True,
            model: PMMLModel::Tree(TreeModel {
                model_name: None,
                function_name: "regression".to_string(),
                split_characteristic: "binarySplit".to_string(),
                mining_schema: active.to_vec(),
                root: tree_root(tree, feature_names),
            }),
        })
        .collect();

    MiningModel {
        model_name: None,
        function_name: "regression".to_string(),
        mining_schema: active.to_vec(),
        output: vec![
            OutputField::predicted(output_name, OpType::Continuous, PMMLDataType::Double).intermediate(),
        ],
        local_transformations: Vec::new(),
        segmentation: Segmentation {
            method: MultipleModelMethod::Sum,
            segments,
        },
    }
}

fn tree_root(tree: &XGBNode, feature_names: &[String]) -> TreeNode {
    let mut next_id = 0usize;
    convert_node(tree, TreePredicate::True, feature_names, &mut next_id)
}

fn convert_node(
    node: &XGBNode,
    predicate: TreePredicate,
    feature_names: &[String],
    next_id: &mut usize,
) -> TreeNode {
    let id = next_id.to_string();
    *next_id += 1;

    match node {
        XGBNode::Leaf { weight } => TreeNode {
            id,
            score: Some(*weight),
            predicate,
            children: Vec::new(),
        },
        XGBNode::Split { feature, threshold, left, right } => {
            let field = scaled_name(&feature_names[*feature]);
            let condition = |op: &str| TreePredicate::SimplePredicate {
                field: field.clone(),
                operator: op.to_string(),
                value: threshold.to_string(),
            };
            let left = convert_node(left, condition("lessOrEqual"), feature_names, next_id);
            let right = convert_node(right, condition("greaterThan"), feature_names, next_id);
            TreeNode {
                id,
                score: None,
                predicate,
                children: vec![left, right],
            }
        }
    }
}

fn link_model(
    objective: Objective,
    base_margin: &[f64],
    classes: &[String],
    target_name: &str,
) -> RegressionModel {
    let n_groups = objective.n_groups();
    let mut mining_schema: Vec<MiningField> = (0..n_groups)
        .map(|k| MiningField::active(group_output_name(objective, k)))
        .collect();
    mining_schema.push(MiningField::target(target_name));

    let output = classes
        .iter()
        .map(|c| OutputField::probability(format!("probability_{}", c), c.clone()))
        .collect();

    let (normalization_method, tables) = match objective {
        Objective::BinaryLogistic => (
            NormalizationMethod::Logit,
            vec![
                RegressionTable {
                    intercept: base_margin[0],
                    target_category: Some(classes[1].clone()),
                    predictors: vec![NumericPredictor::new(group_output_name(objective, 0), 1.0)],
                },
                RegressionTable {
                    intercept: 0.0,
                    target_category: Some(classes[0].clone()),
                    predictors: Vec::new(),
                },
            ],
        ),
        Objective::MultiSoftprob { .. } => (
            NormalizationMethod::Softmax,
            (0..n_groups)
                .map(|k| RegressionTable {
                    intercept: base_margin[k],
                    target_category: Some(classes[k].clone()),
                    predictors: vec![NumericPredictor::new(group_output_name(objective, k), 1.0)],
                })
                .collect(),
        ),
    };

    RegressionModel {
        model_name: None,
        function_name: "classification".to_string(),
        normalization_method,
        mining_schema,
        output,
        tables,
    }
}
