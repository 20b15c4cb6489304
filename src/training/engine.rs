//! Training run: load, search, evaluate, report, export

use crate::config::RunConfig;
use crate::error::{Result, TrainerError};
use crate::export::{export_pipeline, PMMLDocument};
use crate::optimizer::{format_params, GridSearchCV, GridSearchResult, TrialParams};
use crate::preprocessing::ClassLabel;
use crate::utils::{DataLoader, LabeledTable, TrainTestData};
use super::metrics::ClassificationReport;
use super::pipeline::Pipeline;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;

/// Everything a completed run produced
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub search: GridSearchResult,
    pub feature_names: Vec<String>,
    pub test_predictions: Vec<ClassLabel>,
    pub report: ClassificationReport,
    pub report_path: PathBuf,
    pub pmml: PMMLDocument,
    pub pmml_path: PathBuf,
    pub training_time_secs: f64,
}

/// `Best params: {...}` followed by a blank line and the report text
pub fn render_report(best_params: &TrialParams, report: &ClassificationReport) -> String {
    format!("Best params: {}\n\n{}", format_params(best_params), report)
}

/// Progress of [`TrainEngine::run_with`], in stage order
#[derive(Debug)]
pub enum RunEvent<'a> {
    LoadStarted,
    Loaded { data: &'a TrainTestData, elapsed: Duration },
    SearchStarted { n_candidates: usize },
    Searched { search: &'a GridSearchResult, elapsed: Duration },
    EvaluateStarted,
    Evaluated { report: &'a ClassificationReport },
    ReportWritten { path: &'a Path },
    Exported { path: &'a Path },
}

/// Sequential training run driven by a [`RunConfig`]
pub struct TrainEngine {
    config: RunConfig,
}

impl TrainEngine {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn load_data(&self) -> Result<TrainTestData> {
        self.config.validate()?;
        let data = DataLoader::from_config(&self.config).load_train_test(&self.config)?;
        info!(
            train_rows = data.train.n_samples(),
            test_rows = data.test.n_samples(),
            features = data.train.n_features(),
            "data loaded"
        );
        Ok(data)
    }

    /// Grid search on the training table
    pub fn search(&self, train: &LabeledTable) -> Result<GridSearchResult> {
        let search = GridSearchCV::new(
            self.config.base_pipeline(),
            self.config.param_grid.clone(),
            self.config.search_config(),
        );
        search.fit(&train.features, &train.labels)
    }

    /// Predict the evaluation table and build its report
    pub fn evaluate(
        &self,
        model: &Pipeline,
        test: &LabeledTable,
    ) -> Result<(Vec<ClassLabel>, ClassificationReport)> {
        let predictions = model.predict(&test.features)?;
        let report = ClassificationReport::compute(&test.labels, &predictions);
        info!(accuracy = report.accuracy, "evaluated on held-out data");
        Ok((predictions, report))
    }

    pub fn write_report(
        &self,
        best_params: &TrialParams,
        report: &ClassificationReport,
    ) -> Result<PathBuf> {
        let path = self.config.report_path();
        fs::write(&path, render_report(best_params, report)).map_err(|e| {
            TrainerError::ExportError(format!("cannot write {}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), "wrote classification report");
        Ok(path)
    }

    pub fn export(
        &self,
        model: &Pipeline,
        feature_names: &[String],
    ) -> Result<(PMMLDocument, PathBuf)> {
        let path = self.config.pmml_path();
        let doc = export_pipeline(model, feature_names, &self.config.target_name, &path)?;
        Ok((doc, path))
    }

    pub fn run(&self) -> Result<TrainingOutcome> {
        self.run_with(|_| {})
    }

    /// Run every stage, reporting each one to `on_event`
    pub fn run_with<F>(&self, mut on_event: F) -> Result<TrainingOutcome>
    where
        F: FnMut(RunEvent<'_>),
    {
        let start = Instant::now();

        on_event(RunEvent::LoadStarted);
        let stage = Instant::now();
        let data = self.load_data()?;
        on_event(RunEvent::Loaded { data: &data, elapsed: stage.elapsed() });
        let TrainTestData { train, test } = data;

        on_event(RunEvent::SearchStarted { n_candidates: self.config.param_grid.len() });
        let stage = Instant::now();
        let search = self.search(&train)?;
        on_event(RunEvent::Searched { search: &search, elapsed: stage.elapsed() });

        on_event(RunEvent::EvaluateStarted);
        let (test_predictions, report) = self.evaluate(&search.best_estimator, &test)?;
        on_event(RunEvent::Evaluated { report: &report });

        let report_path = self.write_report(&search.best_params, &report)?;
        on_event(RunEvent::ReportWritten { path: &report_path });

        let (pmml, pmml_path) = self.export(&search.best_estimator, &train.feature_names)?;
        on_event(RunEvent::Exported { path: &pmml_path });

        let training_time_secs = start.elapsed().as_secs_f64();
        info!(seconds = training_time_secs, "training run finished");

        Ok(TrainingOutcome {
            search,
            feature_names: train.feature_names,
            test_predictions,
            report,
            report_path,
            pmml,
            pmml_path,
            training_time_secs,
        })
    }
}
