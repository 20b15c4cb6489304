//! PMML (Predictive Model Markup Language) document model and writer
//!
//! Covers the subset of PMML 4.4 needed for boosted tree ensembles:
//! nested `MiningModel` segmentation, `TreeModel`, classification
//! `RegressionModel`, `Output` fields and `LocalTransformations`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Result, TrainerError};

pub const PMML_VERSION: &str = "4.4";
const PMML_NAMESPACE: &str = "http://www.dmg.org/PMML-4_4";

/// PMML data type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PMMLDataType {
    Double,
    Float,
    Integer,
    String,
    Boolean,
}

impl PMMLDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PMMLDataType::Double => "double",
            PMMLDataType::Float => "float",
            PMMLDataType::Integer => "integer",
            PMMLDataType::String => "string",
            PMMLDataType::Boolean => "boolean",
        }
    }
}

/// PMML operational type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpType {
    Continuous,
    Categorical,
}

impl OpType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpType::Continuous => "continuous",
            OpType::Categorical => "categorical",
        }
    }
}

/// PMML field usage type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldUsageType {
    Active,
    Target,
}

impl FieldUsageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldUsageType::Active => "active",
            FieldUsageType::Target => "target",
        }
    }
}

/// PMML data field definition
#[derive(Debug, Clone, PartialEq)]
pub struct DataField {
    pub name: String,
    pub data_type: PMMLDataType,
    pub op_type: OpType,
    pub values: Option<Vec<String>>,
}

impl DataField {
    /// Create continuous numeric field
    pub fn continuous(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: PMMLDataType::Double,
            op_type: OpType::Continuous,
            values: None,
        }
    }

    /// Create categorical field
    pub fn categorical(name: impl Into<String>, data_type: PMMLDataType, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            data_type,
            op_type: OpType::Categorical,
            values: Some(values),
        }
    }
}

/// PMML mining field
#[derive(Debug, Clone, PartialEq)]
pub struct MiningField {
    pub name: String,
    pub usage_type: FieldUsageType,
    pub importance: Option<f64>,
}

impl MiningField {
    pub fn active(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            usage_type: FieldUsageType::Active,
            importance: None,
        }
    }

    pub fn target(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            usage_type: FieldUsageType::Target,
            importance: None,
        }
    }

    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = Some(importance);
        self
    }
}

/// What an output field reports
#[derive(Debug, Clone, PartialEq)]
pub enum ResultFeature {
    PredictedValue,
    /// Probability of one target category
    Probability(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputField {
    pub name: String,
    pub op_type: OpType,
    pub data_type: PMMLDataType,
    pub feature: ResultFeature,
    pub is_final_result: bool,
}

impl OutputField {
    pub fn probability(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op_type: OpType::Continuous,
            data_type: PMMLDataType::Double,
            feature: ResultFeature::Probability(category.into()),
            is_final_result: true,
        }
    }

    pub fn predicted(name: impl Into<String>, op_type: OpType, data_type: PMMLDataType) -> Self {
        Self {
            name: name.into(),
            op_type,
            data_type,
            feature: ResultFeature::PredictedValue,
            is_final_result: true,
        }
    }

    /// Intermediate value consumed by a later chain segment
    pub fn intermediate(mut self) -> Self {
        self.is_final_result = false;
        self
    }
}

/// Transformation expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    FieldRef(String),
    Constant(f64),
    Apply { function: String, args: Vec<Expression> },
}

impl Expression {
    pub fn apply(function: impl Into<String>, args: Vec<Expression>) -> Self {
        Expression::Apply { function: function.into(), args }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DerivedField {
    pub name: String,
    pub op_type: OpType,
    pub data_type: PMMLDataType,
    pub expression: Expression,
}

/// Linear regression coefficient
#[derive(Debug, Clone, PartialEq)]
pub struct NumericPredictor {
    pub name: String,
    pub coefficient: f64,
    pub exponent: i32,
}

impl NumericPredictor {
    pub fn new(name: impl Into<String>, coefficient: f64) -> Self {
        Self {
            name: name.into(),
            coefficient,
            exponent: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTable {
    pub intercept: f64,
    pub target_category: Option<String>,
    pub predictors: Vec<NumericPredictor>,
}

/// Normalization applied to regression table outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizationMethod {
    None,
    Logit,
    Softmax,
}

impl NormalizationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            NormalizationMethod::None => "none",
            NormalizationMethod::Logit => "logit",
            NormalizationMethod::Softmax => "softmax",
        }
    }
}

/// PMML regression model
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionModel {
    pub model_name: Option<String>,
    pub function_name: String,
    pub normalization_method: NormalizationMethod,
    pub mining_schema: Vec<MiningField>,
    pub output: Vec<OutputField>,
    pub tables: Vec<RegressionTable>,
}

/// Decision tree node
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub id: String,
    pub score: Option<f64>,
    pub predicate: TreePredicate,
    pub children: Vec<TreeNode>,
}

/// Tree predicate for splits
#[derive(Debug, Clone, PartialEq)]
pub enum TreePredicate {
    True,
    SimplePredicate {
        field: String,
        operator: String,
        value: String,
    },
    CompoundPredicate {
        boolean_operator: String,
        predicates: Vec<TreePredicate>,
    },
}

/// PMML tree model
#[derive(Debug, Clone, PartialEq)]
pub struct TreeModel {
    pub model_name: Option<String>,
    pub function_name: String,
    pub split_characteristic: String,
    pub mining_schema: Vec<MiningField>,
    pub root: TreeNode,
}

/// How segment results are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultipleModelMethod {
    Sum,
    ModelChain,
}

impl MultipleModelMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MultipleModelMethod::Sum => "sum",
            MultipleModelMethod::ModelChain => "modelChain",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub id: String,
    pub predicate: TreePredicate,
    pub model: PMMLModel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segmentation {
    pub method: MultipleModelMethod,
    pub segments: Vec<Segment>,
}

/// Ensemble model built from segments
#[derive(Debug, Clone, PartialEq)]
pub struct MiningModel {
    pub model_name: Option<String>,
    pub function_name: String,
    pub mining_schema: Vec<MiningField>,
    pub output: Vec<OutputField>,
    pub local_transformations: Vec<DerivedField>,
    pub segmentation: Segmentation,
}

/// PMML model types
#[derive(Debug, Clone, PartialEq)]
pub enum PMMLModel {
    Regression(RegressionModel),
    Tree(TreeModel),
    Mining(Box<MiningModel>),
}

/// Complete PMML document
#[derive(Debug, Clone, PartialEq)]
pub struct PMMLDocument {
    pub version: String,
    pub header: PMMLHeader,
    pub data_dictionary: Vec<DataField>,
    pub model: PMMLModel,
}

impl PMMLDocument {
    pub fn data_field(&self, name: &str) -> Option<&DataField> {
        self.data_dictionary.iter().find(|f| f.name == name)
    }
}

/// PMML header
#[derive(Debug, Clone, PartialEq)]
pub struct PMMLHeader {
    pub copyright: Option<String>,
    pub description: Option<String>,
    pub application_name: String,
    pub application_version: String,
    pub timestamp: Option<String>,
}

impl Default for PMMLHeader {
    fn default() -> Self {
        Self {
            copyright: None,
            description: None,
            application_name: env!("CARGO_PKG_NAME").to_string(),
            application_version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Some(chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }
}

/// PMML writer
pub struct PMMLExporter;

impl PMMLExporter {
    /// Create new exporter
    pub fn new() -> Self {
        Self
    }

    /// Export PMML document to file
    pub fn export(&self, doc: &PMMLDocument, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| {
            TrainerError::ExportError(format!("Failed to create {}: {}", path.display(), e))
        })?;
        let mut writer = BufWriter::new(file);

        self.write_pmml(&mut writer, doc)?;
        writer.flush().map_err(Self::io_err)
    }

    /// Export to string
    pub fn export_to_string(&self, doc: &PMMLDocument) -> Result<String> {
        let mut buffer = Vec::new();
        self.write_pmml(&mut buffer, doc)?;
        String::from_utf8(buffer).map_err(|e| {
            TrainerError::SerializationError(format!("Invalid UTF-8: {}", e))
        })
    }

    fn write_pmml<W: Write>(&self, writer: &mut W, doc: &PMMLDocument) -> Result<()> {
        writeln!(writer, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>").map_err(Self::io_err)?;
        writeln!(
            writer,
            "<PMML xmlns=\"{}\" version=\"{}\">",
            PMML_NAMESPACE,
            Self::escape_xml(&doc.version)
        ).map_err(Self::io_err)?;

        self.write_header(writer, &doc.header)?;
        self.write_data_dictionary(writer, &doc.data_dictionary)?;
        self.write_model(writer, &doc.model, 2)?;

        writeln!(writer, "</PMML>").map_err(Self::io_err)?;
        Ok(())
    }

    fn write_header<W: Write>(&self, writer: &mut W, header: &PMMLHeader) -> Result<()> {
        writeln!(writer, "  <Header>").map_err(Self::io_err)?;

        if let Some(ref copyright) = header.copyright {
            writeln!(writer, "    <Copyright>{}</Copyright>", Self::escape_xml(copyright))
                .map_err(Self::io_err)?;
        }

        if let Some(ref desc) = header.description {
            writeln!(writer, "    <Description>{}</Description>", Self::escape_xml(desc))
                .map_err(Self::io_err)?;
        }

        writeln!(
            writer,
            "    <Application name=\"{}\" version=\"{}\"/>",
            Self::escape_xml(&header.application_name),
            Self::escape_xml(&header.application_version)
        ).map_err(Self::io_err)?;

        if let Some(ref ts) = header.timestamp {
            writeln!(writer, "    <Timestamp>{}</Timestamp>", Self::escape_xml(ts))
                .map_err(Self::io_err)?;
        }

        writeln!(writer, "  </Header>").map_err(Self::io_err)?;
        Ok(())
    }

    fn write_data_dictionary<W: Write>(&self, writer: &mut W, fields: &[DataField]) -> Result<()> {
        writeln!(writer, "  <DataDictionary numberOfFields=\"{}\">", fields.len())
            .map_err(Self::io_err)?;

        for field in fields {
            write!(
                writer,
                "    <DataField name=\"{}\" optype=\"{}\" dataType=\"{}\"",
                Self::escape_xml(&field.name),
                field.op_type.as_str(),
                field.data_type.as_str()
            ).map_err(Self::io_err)?;

            if let Some(ref values) = field.values {
                writeln!(writer, ">").map_err(Self::io_err)?;
                for val in values {
                    writeln!(writer, "      <Value value=\"{}\"/>", Self::escape_xml(val))
                        .map_err(Self::io_err)?;
                }
                writeln!(writer, "    </DataField>").map_err(Self::io_err)?;
            } else {
                writeln!(writer, "/>").map_err(Self::io_err)?;
            }
        }

        writeln!(writer, "  </DataDictionary>").map_err(Self::io_err)?;
        Ok(())
    }

    fn write_model<W: Write>(&self, writer: &mut W, model: &PMMLModel, indent: usize) -> Result<()> {
        match model {
            PMMLModel::Mining(m) => self.write_mining_model(writer, m, indent),
            PMMLModel::Regression(m) => self.write_regression_model(writer, m, indent),
            PMMLModel::Tree(m) => self.write_tree_model(writer, m, indent),
        }
    }

    fn write_model_open<W: Write>(
        &self,
        writer: &mut W,
        tag: &str,
        model_name: &Option<String>,
        function_name: &str,
        extra: &[(&str, &str)],
        indent: usize,
    ) -> Result<()> {
        let pad = " ".repeat(indent);
        write!(writer, "{}<{}", pad, tag).map_err(Self::io_err)?;
        if let Some(name) = model_name {
            write!(writer, " modelName=\"{}\"", Self::escape_xml(name)).map_err(Self::io_err)?;
        }
        write!(writer, " functionName=\"{}\"", Self::escape_xml(function_name))
            .map_err(Self::io_err)?;
        for (key, value) in extra {
            write!(writer, " {}=\"{}\"", key, Self::escape_xml(value)).map_err(Self::io_err)?;
        }
        writeln!(writer, ">").map_err(Self::io_err)?;
        Ok(())
    }

    fn write_mining_model<W: Write>(&self, writer: &mut W, model: &MiningModel, indent: usize) -> Result<()> {
        let pad = " ".repeat(indent);
        self.write_model_open(writer, "MiningModel", &model.model_name, &model.function_name, &[], indent)?;
        self.write_mining_schema(writer, &model.mining_schema, indent + 2)?;
        self.write_output(writer, &model.output, indent + 2)?;
        self.write_local_transformations(writer, &model.local_transformations, indent + 2)?;

        let inner = " ".repeat(indent + 2);
        writeln!(
            writer,
            "{}<Segmentation multipleModelMethod=\"{}\">",
            inner,
            model.segmentation.method.as_str()
        ).map_err(Self::io_err)?;
        for segment in &model.segmentation.segments {
            writeln!(writer, "{}  <Segment id=\"{}\">", inner, Self::escape_xml(&segment.id))
                .map_err(Self::io_err)?;
            self.write_predicate(writer, &segment.predicate, indent + 6)?;
            self.write_model(writer, &segment.model, indent + 6)?;
            writeln!(writer, "{}  </Segment>", inner).map_err(Self::io_err)?;
        }
        writeln!(writer, "{}</Segmentation>", inner).map_err(Self::io_err)?;

        writeln!(writer, "{}</MiningModel>", pad).map_err(Self::io_err)?;
        Ok(())
    }

    fn write_mining_schema<W: Write>(&self, writer: &mut W, fields: &[MiningField], indent: usize) -> Result<()> {
        let pad = " ".repeat(indent);
        if fields.is_empty() {
            writeln!(writer, "{}<MiningSchema/>", pad).map_err(Self::io_err)?;
            return Ok(());
        }
        writeln!(writer, "{}<MiningSchema>", pad).map_err(Self::io_err)?;

        for field in fields {
            write!(
                writer,
                "{}  <MiningField name=\"{}\" usageType=\"{}\"",
                pad,
                Self::escape_xml(&field.name),
                field.usage_type.as_str()
            ).map_err(Self::io_err)?;

            if let Some(imp) = field.importance {
                write!(writer, " importance=\"{}\"", imp).map_err(Self::io_err)?;
            }

            writeln!(writer, "/>").map_err(Self::io_err)?;
        }

        writeln!(writer, "{}</MiningSchema>", pad).map_err(Self::io_err)?;
        Ok(())
    }

    fn write_output<W: Write>(&self, writer: &mut W, fields: &[OutputField], indent: usize) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let pad = " ".repeat(indent);
        writeln!(writer, "{}<Output>", pad).map_err(Self::io_err)?;
        for field in fields {
            write!(
                writer,
                "{}  <OutputField name=\"{}\" optype=\"{}\" dataType=\"{}\"",
                pad,
                Self::escape_xml(&field.name),
                field.op_type.as_str(),
                field.data_type.as_str()
            ).map_err(Self::io_err)?;
            match &field.feature {
                ResultFeature::PredictedValue => {
                    write!(writer, " feature=\"predictedValue\"").map_err(Self::io_err)?;
                }
                ResultFeature::Probability(value) => {
                    write!(writer, " feature=\"probability\" value=\"{}\"", Self::escape_xml(value))
                        .map_err(Self::io_err)?;
                }
            }
            if !field.is_final_result {
                write!(writer, " isFinalResult=\"false\"").map_err(Self::io_err)?;
            }
            writeln!(writer, "/>").map_err(Self::io_err)?;
        }
        writeln!(writer, "{}</Output>", pad).map_err(Self::io_err)?;
        Ok(())
    }

    fn write_local_transformations<W: Write>(
        &self,
        writer: &mut W,
        fields: &[DerivedField],
        indent: usize,
    ) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let pad = " ".repeat(indent);
        writeln!(writer, "{}<LocalTransformations>", pad).map_err(Self::io_err)?;
        for field in fields {
            writeln!(
                writer,
                "{}  <DerivedField name=\"{}\" optype=\"{}\" dataType=\"{}\">",
                pad,
                Self::escape_xml(&field.name),
                field.op_type.as_str(),
                field.data_type.as_str()
            ).map_err(Self::io_err)?;
            self.write_expression(writer, &field.expression, indent + 4)?;
            writeln!(writer, "{}  </DerivedField>", pad).map_err(Self::io_err)?;
        }
        writeln!(writer, "{}</LocalTransformations>", pad).map_err(Self::io_err)?;
        Ok(())
    }

    fn write_expression<W: Write>(&self, writer: &mut W, expr: &Expression, indent: usize) -> Result<()> {
        let pad = " ".repeat(indent);
        match expr {
            Expression::FieldRef(field) => {
                writeln!(writer, "{}<FieldRef field=\"{}\"/>", pad, Self::escape_xml(field))
                    .map_err(Self::io_err)?;
            }
            Expression::Constant(value) => {
                writeln!(writer, "{}<Constant dataType=\"double\">{}</Constant>", pad, value)
                    .map_err(Self::io_err)?;
            }
            Expression::Apply { function, args } => {
                writeln!(writer, "{}<Apply function=\"{}\">", pad, Self::escape_xml(function))
                    .map_err(Self::io_err)?;
                for arg in args {
                    self.write_expression(writer, arg, indent + 2)?;
                }
                writeln!(writer, "{}</Apply>", pad).map_err(Self::io_err)?;
            }
        }
        Ok(())
    }

    fn write_regression_model<W: Write>(
        &self,
        writer: &mut W,
        model: &RegressionModel,
        indent: usize,
    ) -> Result<()> {
        let pad = " ".repeat(indent);
        self.write_model_open(
            writer,
            "RegressionModel",
            &model.model_name,
            &model.function_name,
            &[("normalizationMethod", model.normalization_method.as_str())],
            indent,
        )?;

        self.write_mining_schema(writer, &model.mining_schema, indent + 2)?;
        self.write_output(writer, &model.output, indent + 2)?;

        for table in &model.tables {
            write!(writer, "{}  <RegressionTable intercept=\"{}\"", pad, table.intercept)
                .map_err(Self::io_err)?;
            if let Some(ref category) = table.target_category {
                write!(writer, " targetCategory=\"{}\"", Self::escape_xml(category))
                    .map_err(Self::io_err)?;
            }
            if table.predictors.is_empty() {
                writeln!(writer, "/>").map_err(Self::io_err)?;
                continue;
            }
            writeln!(writer, ">").map_err(Self::io_err)?;

            for pred in &table.predictors {
                writeln!(
                    writer,
                    "{}    <NumericPredictor name=\"{}\" exponent=\"{}\" coefficient=\"{}\"/>",
                    pad,
                    Self::escape_xml(&pred.name),
                    pred.exponent,
                    pred.coefficient
                ).map_err(Self::io_err)?;
            }

            writeln!(writer, "{}  </RegressionTable>", pad).map_err(Self::io_err)?;
        }

        writeln!(writer, "{}</RegressionModel>", pad).map_err(Self::io_err)?;
        Ok(())
    }

    fn write_tree_model<W: Write>(
        &self,
        writer: &mut W,
        model: &TreeModel,
        indent: usize,
    ) -> Result<()> {
        let pad = " ".repeat(indent);
        self.write_model_open(
            writer,
            "TreeModel",
            &model.model_name,
            &model.function_name,
            &[("splitCharacteristic", model.split_characteristic.as_str())],
            indent,
        )?;

        self.write_mining_schema(writer, &model.mining_schema, indent + 2)?;
        self.write_tree_node(writer, &model.root, indent + 2)?;

        writeln!(writer, "{}</TreeModel>", pad).map_err(Self::io_err)?;
        Ok(())
    }

    fn write_tree_node<W: Write>(
        &self,
        writer: &mut W,
        node: &TreeNode,
        indent: usize,
    ) -> Result<()> {
        let pad = " ".repeat(indent);

        write!(writer, "{}<Node id=\"{}\"", pad, Self::escape_xml(&node.id))
            .map_err(Self::io_err)?;

        if let Some(score) = node.score {
            write!(writer, " score=\"{}\"", score).map_err(Self::io_err)?;
        }

        writeln!(writer, ">").map_err(Self::io_err)?;

        self.write_predicate(writer, &node.predicate, indent + 2)?;

        for child in &node.children {
            self.write_tree_node(writer, child, indent + 2)?;
        }

        writeln!(writer, "{}</Node>", pad).map_err(Self::io_err)?;
        Ok(())
    }

    fn write_predicate<W: Write>(
        &self,
        writer: &mut W,
        predicate: &TreePredicate,
        indent: usize,
    ) -> Result<()> {
        let pad = " ".repeat(indent);

        match predicate {
            TreePredicate::True => {
                writeln!(writer, "{}<True/>", pad).map_err(Self::io_err)?;
            }
            TreePredicate::SimplePredicate { field, operator, value } => {
                writeln!(
                    writer,
                    "{}<SimplePredicate field=\"{}\" operator=\"{}\" value=\"{}\"/>",
                    pad,
                    Self::escape_xml(field),
                    Self::escape_xml(operator),
                    Self::escape_xml(value)
                ).map_err(Self::io_err)?;
            }
            TreePredicate::CompoundPredicate { boolean_operator, predicates } => {
                writeln!(
                    writer,
                    "{}<CompoundPredicate booleanOperator=\"{}\">",
                    pad,
                    Self::escape_xml(boolean_operator)
                ).map_err(Self::io_err)?;

                for pred in predicates {
                    self.write_predicate(writer, pred, indent + 2)?;
                }

                writeln!(writer, "{}</CompoundPredicate>", pad).map_err(Self::io_err)?;
            }
        }

        Ok(())
    }

    pub(crate) fn escape_xml(s: &str) -> String {
        s.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&apos;")
    }

    fn io_err(e: std::io::Error) -> TrainerError {
        TrainerError::ExportError(format!("Failed to write PMML: {}", e))
    }
}

impl Default for PMMLExporter {
    fn default() -> Self {
        Self::new()
    }
}
