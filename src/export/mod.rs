//! Model export
//!
//! Writes a fitted pipeline as a PMML 4.4 document and scores PMML
//! documents in memory to check that an export reproduces the pipeline.

mod pipeline_pmml;
mod pmml;
mod scoring;

pub use pipeline_pmml::{export_pipeline, pipeline_to_pmml};
pub use pmml::{
    DataField, DerivedField, Expression, FieldUsageType, MiningField, MiningModel,
    MultipleModelMethod, NormalizationMethod, NumericPredictor, OpType, OutputField,
    PMMLDataType, PMMLDocument, PMMLExporter, PMMLHeader, PMMLModel, RegressionModel,
    RegressionTable, ResultFeature, Segment, Segmentation, TreeModel, TreeNode, TreePredicate,
    PMML_VERSION,
};
pub use scoring::{PMMLScorer, Prediction};
