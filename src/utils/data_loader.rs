//! Labeled table loading

use crate::config::RunConfig;
use crate::error::{Result, TrainerError};
use crate::preprocessing::ClassLabel;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Feature matrix and labels aligned by sample identifier
#[derive(Debug, Clone)]
pub struct LabeledTable {
    /// Sample identifiers in row order
    pub ids: Vec<String>,
    pub feature_names: Vec<String>,
    pub features: Array2<f64>,
    /// `labels[i]` belongs to `ids[i]`
    pub labels: Vec<ClassLabel>,
}

impl LabeledTable {
    pub fn n_samples(&self) -> usize {
        self.ids.len()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }
}

/// Training and evaluation tables with the same feature columns
#[derive(Debug, Clone)]
pub struct TrainTestData {
    pub train: LabeledTable,
    pub test: LabeledTable,
}

/// CSV loader for `<idx>, features...` and `<idx>, <label>` tables
pub struct DataLoader {
    index_column: String,
    label_column: String,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new("idx", "label")
    }
}

impl DataLoader {
    pub fn new(index_column: impl Into<String>, label_column: impl Into<String>) -> Self {
        Self {
            index_column: index_column.into(),
            label_column: label_column.into(),
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(config.index_column.clone(), config.label_column.clone())
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path)
            .map_err(|e| TrainerError::DataError(format!("{}: {}", path.display(), e)))?;

        let reader = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(None)
            .into_reader_with_file_handle(file);

        reader
            .finish()
            .map_err(|e| TrainerError::DataError(format!("{}: {}", path.display(), e)))
    }

    /// Identifiers and the remaining columns as a dense matrix.
    ///
    /// With `columns` given, exactly those columns are selected in that order.
    pub fn load_features(
        &self,
        path: &Path,
        columns: Option<&[String]>,
    ) -> Result<(Vec<String>, Vec<String>, Array2<f64>)> {
        let start = Instant::now();
        let df = self.load_csv(path)?;
        let ids = self.read_ids(&df, path)?;

        let names: Vec<String> = match columns {
            Some(cols) => cols.to_vec(),
            None => df
                .get_column_names()
                .into_iter()
                .map(|n| n.to_string())
                .filter(|n| n != &self.index_column)
                .collect(),
        };
        if names.is_empty() {
            return Err(TrainerError::DataError(format!(
                "{}: no feature columns",
                path.display()
            )));
        }

        let mut features = Array2::zeros((df.height(), names.len()));
        for (j, name) in names.iter().enumerate() {
            let column = df
                .column(name)
                .map_err(|_| TrainerError::FeatureNotFound(format!("{} in {}", name, path.display())))?;
            let values = numeric_values(column.as_materialized_series(), name, path)?;
            features.column_mut(j).assign(&values);
        }

        info!(
            path = %path.display(),
            rows = features.nrows(),
            features = features.ncols(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "loaded feature table"
        );
        Ok((ids, names, features))
    }

    /// Identifier to label mapping
    pub fn load_labels(&self, path: &Path) -> Result<Vec<(String, ClassLabel)>> {
        let df = self.load_csv(path)?;
        let ids = self.read_ids(&df, path)?;
        let series = df
            .column(&self.label_column)
            .map_err(|_| {
                TrainerError::DataError(format!(
                    "{}: missing label column '{}'",
                    path.display(),
                    self.label_column
                ))
            })?
            .as_materialized_series();

        if series.null_count() > 0 {
            return Err(TrainerError::DataError(format!(
                "{}: label column has missing values",
                path.display()
            )));
        }

        let labels: Vec<ClassLabel> = if series.dtype().is_integer() {
            series
                .cast(&DataType::Int64)?
                .i64()?
                .into_no_null_iter()
                .map(ClassLabel::Int)
                .collect()
        } else {
            series
                .cast(&DataType::String)?
                .str()?
                .into_no_null_iter()
                .map(ClassLabel::from)
                .collect()
        };

        debug!(path = %path.display(), rows = labels.len(), "loaded label table");
        Ok(ids.into_iter().zip(labels).collect())
    }

    /// Load a feature table and its label table, reordering labels to feature row order
    pub fn load_labeled(
        &self,
        x_path: &Path,
        y_path: &Path,
        columns: Option<&[String]>,
    ) -> Result<LabeledTable> {
        let (ids, feature_names, features) = self.load_features(x_path, columns)?;
        let pairs = self.load_labels(y_path)?;

        check_unique(&ids, x_path)?;
        let n_labels = pairs.len();
        let by_id: HashMap<String, ClassLabel> = pairs.into_iter().collect();
        if by_id.len() != n_labels {
            return Err(TrainerError::DataError(format!(
                "{}: duplicate identifiers",
                y_path.display()
            )));
        }
        if by_id.len() != ids.len() {
            return Err(TrainerError::DataError(format!(
                "{} has {} rows but {} has {}",
                x_path.display(),
                ids.len(),
                y_path.display(),
                by_id.len()
            )));
        }

        let labels = ids
            .iter()
            .map(|id| {
                by_id.get(id).cloned().ok_or_else(|| {
                    TrainerError::DataError(format!(
                        "identifier '{}' has no label in {}",
                        id,
                        y_path.display()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(LabeledTable { ids, feature_names, features, labels })
    }

    /// Training and evaluation tables; the test features follow the training column order
    pub fn load_train_test(&self, config: &RunConfig) -> Result<TrainTestData> {
        let train = self.load_labeled(&config.x_train_path(), &config.y_train_path(), None)?;
        let mut test = self.load_labeled(
            &config.x_test_path(),
            &config.y_test_path(),
            Some(&train.feature_names),
        )?;
        test.labels = align_label_kind(&train.labels, test.labels, &config.y_test_path())?;
        Ok(TrainTestData { train, test })
    }

    fn read_ids(&self, df: &DataFrame, path: &Path) -> Result<Vec<String>> {
        let series = df
            .column(&self.index_column)
            .map_err(|_| {
                TrainerError::DataError(format!(
                    "{}: missing identifier column '{}'",
                    path.display(),
                    self.index_column
                ))
            })?
            .as_materialized_series();
        if series.null_count() > 0 {
            return Err(TrainerError::DataError(format!(
                "{}: identifier column has missing values",
                path.display()
            )));
        }
        Ok(series
            .cast(&DataType::String)?
            .str()?
            .into_no_null_iter()
            .map(|s| s.to_string())
            .collect())
    }
}

/// Read evaluation labels with the training label kind.
///
/// Integer training labels require every evaluation label to be an integer;
/// text training labels take evaluation integers as their text form.
fn align_label_kind(
    train: &[ClassLabel],
    test: Vec<ClassLabel>,
    path: &Path,
) -> Result<Vec<ClassLabel>> {
    let integer_kind = train.iter().all(ClassLabel::is_int);
    test.into_iter()
        .map(|label| match label {
            ClassLabel::Text(s) if integer_kind => match s.trim().parse::<i64>() {
                Ok(v) => Ok(ClassLabel::Int(v)),
                Err(_) => Err(TrainerError::DataError(format!(
                    "{}: mix of label types, '{}' is not an integer like the training labels",
                    path.display(),
                    s
                ))),
            },
            ClassLabel::Int(v) if !integer_kind => Ok(ClassLabel::Text(v.to_string())),
            other => Ok(other),
        })
        .collect()
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

fn numeric_values(series: &Series, name: &str, path: &Path) -> Result<Array1<f64>> {
    if !is_numeric(series.dtype()) {
        return Err(TrainerError::DataError(format!(
            "{}: column '{}' is not numeric ({})",
            path.display(),
            name,
            series.dtype()
        )));
    }
    if series.null_count() > 0 {
        return Err(TrainerError::DataError(format!(
            "{}: column '{}' has {} missing values",
            path.display(),
            name,
            series.null_count()
        )));
    }
    let values: Vec<f64> = series.cast(&DataType::Float64)?.f64()?.into_no_null_iter().collect();
    Ok(Array1::from_vec(values))
}

fn check_unique(ids: &[String], path: &Path) -> Result<()> {
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(id.as_str()) {
            return Err(TrainerError::DataError(format!(
                "{}: duplicate identifier '{}'",
                path.display(),
                id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_labels_realigned_to_feature_order() {
        let dir = TempDir::new().unwrap();
        let x = write(&dir, "X.csv", "idx,a,b\n3,1.0,2.0\n1,3.0,4.0\n2,5.0,6\n");
        let y = write(&dir, "y.csv", "idx,label\n1,0\n2,1\n3,1\n");

        let table = DataLoader::default().load_labeled(&x, &y, None).unwrap();
        assert_eq!(table.ids, vec!["3", "1", "2"]);
        assert_eq!(table.feature_names, vec!["a", "b"]);
        assert_eq!(table.labels, vec![ClassLabel::Int(1), ClassLabel::Int(0), ClassLabel::Int(1)]);
        assert_eq!(table.features[[2, 1]], 6.0);
    }

    #[test]
    fn test_evaluation_labels_follow_training_kind() {
        let path = Path::new("y_test.csv");
        let train = vec![ClassLabel::Int(0), ClassLabel::Int(1)];

        let parsed = align_label_kind(&train, vec![ClassLabel::from("0"), ClassLabel::from(" 1")], path).unwrap();
        assert_eq!(parsed, train);
        assert!(align_label_kind(&train, vec![ClassLabel::from("other")], path).is_err());

        let text_train = vec![ClassLabel::from("a")];
        let as_text = align_label_kind(&text_train, vec![ClassLabel::Int(3)], path).unwrap();
        assert_eq!(as_text, vec![ClassLabel::from("3")]);
    }

    #[test]
    fn test_text_labels() {
        let dir = TempDir::new().unwrap();
        let x = write(&dir, "X.csv", "idx,a\na1,1\na2,2\n");
        let y = write(&dir, "y.csv", "idx,label\na1,cat\na2,dog\n");
        let table = DataLoader::default().load_labeled(&x, &y, None).unwrap();
        assert_eq!(table.labels, vec![ClassLabel::from("cat"), ClassLabel::from("dog")]);
    }

    #[test]
    fn test_duplicate_identifier() {
        let dir = TempDir::new().unwrap();
        let x = write(&dir, "X.csv", "idx,a\n1,1\n1,2\n");
        let y = write(&dir, "y.csv", "idx,label\n1,0\n2,1\n");
        assert!(DataLoader::default().load_labeled(&x, &y, None).is_err());
    }

    #[test]
    fn test_mismatched_identifiers() {
        let dir = TempDir::new().unwrap();
        let x = write(&dir, "X.csv", "idx,a\n1,1\n2,2\n");
        let y = write(&dir, "y.csv", "idx,label\n1,0\n5,1\n");
        let err = DataLoader::default().load_labeled(&x, &y, None).unwrap_err();
        assert!(err.to_string().contains("no label"));
    }

    #[test]
    fn test_missing_column_and_file() {
        let dir = TempDir::new().unwrap();
        let x = write(&dir, "X.csv", "id,a\n1,1\n");
        let y = write(&dir, "y.csv", "idx,label\n1,0\n");
        assert!(DataLoader::default().load_labeled(&x, &y, None).is_err());
        assert!(DataLoader::default()
            .load_labeled(&dir.path().join("nope.csv"), &y, None)
            .is_err());
    }

    #[test]
    fn test_non_numeric_and_null_features() {
        let dir = TempDir::new().unwrap();
        let y = write(&dir, "y.csv", "idx,label\n1,0\n2,1\n");
        let text = write(&dir, "X1.csv", "idx,a\n1,x\n2,y\n");
        let nulls = write(&dir, "X2.csv", "idx,a\n1,\n2,3.0\n");
        assert!(DataLoader::default().load_labeled(&text, &y, None).is_err());
        assert!(DataLoader::default().load_labeled(&nulls, &y, None).is_err());
    }

    #[test]
    fn test_selected_columns_order() {
        let dir = TempDir::new().unwrap();
        let x = write(&dir, "X.csv", "idx,b,a,extra\n1,2.0,1.0,9\n");
        let y = write(&dir, "y.csv", "idx,label\n1,0\n");
        let cols = vec!["a".to_string(), "b".to_string()];
        let table = DataLoader::default().load_labeled(&x, &y, Some(&cols)).unwrap();
        assert_eq!(table.features.row(0).to_vec(), vec![1.0, 2.0]);

        let missing = vec!["a".to_string(), "c".to_string()];
        let err = DataLoader::default().load_labeled(&x, &y, Some(&missing)).unwrap_err();
        assert!(matches!(err, TrainerError::FeatureNotFound(_)));
    }
}
