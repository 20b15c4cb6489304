//! Command-line interface
//!
//! Running without arguments trains on `./data` and writes to `./model_training`.

use anyhow::Context;
use clap::Parser;
use colored::*;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::config::RunConfig;
use crate::optimizer::format_params;
use crate::training::{RunEvent, TrainEngine, TrainingOutcome};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) -> String {
    format!("{:<14} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    // a failed console write is not worth aborting the run for
    let _ = step_run_to(&mut io::stdout(), msg);
}

/// The partial line is flushed so it shows before the stage starts
fn step_run_to<W: Write>(out: &mut W, msg: &str) -> io::Result<()> {
    write!(out, "  {} {}... ", accent("›"), msg)?;
    out.flush()
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug, Default)]
#[command(name = "kolosal-xgb-trainer")]
#[command(author = "KolosalAI")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Grid-searched gradient boosted tree training with PMML export")]
#[command(long_about = None)]
pub struct Cli {
    /// JSON run configuration; flags below override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory holding X_train.csv, y_train.csv, X_test.csv, y_test.csv
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Directory receiving the report and the PMML file
    #[arg(long)]
    pub model_dir: Option<PathBuf>,

    /// Worker threads for the grid search
    #[arg(long)]
    pub n_jobs: Option<usize>,
}

impl Cli {
    /// Defaults, then the config file, then explicit flags
    pub fn run_config(&self) -> anyhow::Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_json_file(path)
                .with_context(|| format!("loading run configuration {}", path.display()))?,
            None => RunConfig::default(),
        };
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(dir) = &self.model_dir {
            config.model_dir = dir.clone();
        }
        if let Some(n) = self.n_jobs {
            config.n_jobs = Some(n);
        }
        config.validate()?;
        Ok(config)
    }
}

pub fn cmd_train(config: RunConfig) -> anyhow::Result<TrainingOutcome> {
    section("Train");
    let engine = TrainEngine::new(config);

    let mut stage = "loading training data";
    let outcome = engine
        .run_with(|event| {
            if let Some(next) = next_stage(&event) {
                stage = next;
            }
            print_event(event);
        })
        .with_context(|| stage.to_string())?;

    println!();
    println!("  {}", kv("Best params", &format_params(&outcome.search.best_params)));
    println!("  {}", kv("CV score", &format!("{:.4}", outcome.search.best_score)));
    println!("  {}", kv("Time", &format!("{:.3}s", outcome.training_time_secs)));
    println!();
    for line in outcome.report.to_string().lines() {
        println!("  {}", line);
    }
    println!();

    Ok(outcome)
}

/// Context for an error raised after `event`
fn next_stage(event: &RunEvent<'_>) -> Option<&'static str> {
    match event {
        RunEvent::LoadStarted => Some("loading training data"),
        RunEvent::SearchStarted { .. } => Some("grid search"),
        RunEvent::EvaluateStarted => Some("evaluating best model"),
        RunEvent::Evaluated { .. } => Some("writing classification report"),
        RunEvent::ReportWritten { .. } => Some("exporting PMML"),
        _ => None,
    }
}

fn print_event(event: RunEvent<'_>) {
    match event {
        RunEvent::LoadStarted => step_run("Loading data"),
        RunEvent::Loaded { data, elapsed } => step_done(&format!(
            "{} train / {} test rows × {} features in {:?}",
            data.train.n_samples(),
            data.test.n_samples(),
            data.train.n_features(),
            elapsed
        )),
        RunEvent::SearchStarted { n_candidates } => {
            step_run(&format!("Searching {} candidates", n_candidates.to_string().cyan()))
        }
        RunEvent::Searched { search, elapsed } => {
            step_done(&format!("{} fits in {:?}", search.n_fits, elapsed))
        }
        RunEvent::EvaluateStarted => step_run("Evaluating"),
        RunEvent::Evaluated { report } => step_done(&format!("accuracy {:.4}", report.accuracy)),
        RunEvent::ReportWritten { path } => step_ok(&format!("Report  {}", path.display())),
        RunEvent::Exported { path } => step_ok(&format!("PMML    {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_arguments_uses_defaults() {
        let cli = Cli::parse_from(["kolosal-xgb-trainer"]);
        assert_eq!(cli.run_config().unwrap(), RunConfig::default());
    }

    #[test]
    fn test_flags_override() {
        let cli = Cli::parse_from([
            "kolosal-xgb-trainer",
            "--data-dir",
            "/tmp/in",
            "--model-dir",
            "/tmp/out",
            "--n-jobs",
            "2",
        ]);
        let config = cli.run_config().unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/in"));
        assert_eq!(config.model_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.n_jobs, Some(2));
    }

    /// Buffer that records whether it was flushed after the last write
    #[derive(Default)]
    struct RecordingWriter {
        buf: Vec<u8>,
        flushed: bool,
    }

    impl Write for RecordingWriter {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.flushed = false;
            self.buf.extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flushed = true;
            Ok(())
        }
    }

    #[test]
    fn test_step_run_flushes_partial_line() {
        let mut out = RecordingWriter::default();
        step_run_to(&mut out, "Loading data").unwrap();
        let text = String::from_utf8(out.buf.clone()).unwrap();
        assert!(text.contains("Loading data... "));
        assert!(!text.ends_with('\n'));
        assert!(out.flushed);
    }

    fn workspace() -> (tempfile::TempDir, RunConfig) {
        let root = tempfile::TempDir::new().unwrap();
        let data_dir = root.path().join("data");
        let model_dir = root.path().join("model_training");
        std::fs::create_dir_all(&data_dir).unwrap();
        std::fs::create_dir_all(&model_dir).unwrap();

        for (split, offset) in [("train", 0), ("test", 100)] {
            let mut x = String::from("idx,f0,f1\n");
            let mut y = String::from("idx,label\n");
            for i in 0..30 {
                x.push_str(&format!("{},{},{}\n", offset + i, i, (i * 7) % 5));
                y.push_str(&format!("{},{}\n", offset + i, (i >= 15) as i64));
            }
            std::fs::write(data_dir.join(format!("X_{}.csv", split)), x).unwrap();
            std::fs::write(data_dir.join(format!("y_{}.csv", split)), y).unwrap();
        }

        let config = RunConfig {
            data_dir,
            model_dir,
            param_grid: crate::optimizer::ParamGrid::new()
                .add("xgb__n_estimators", vec![5i64])
                .add("xgb__max_depth", vec![2i64]),
            ..RunConfig::default()
        };
        (root, config)
    }

    #[test]
    fn test_cmd_train_writes_outputs() {
        let (_root, config) = workspace();
        let outcome = cmd_train(config.clone()).unwrap();

        assert_eq!(outcome.search.n_fits, 3);
        assert_eq!(outcome.report_path, config.report_path());
        assert_eq!(outcome.pmml_path, config.pmml_path());
        let report = std::fs::read_to_string(config.report_path()).unwrap();
        assert!(report.starts_with("Best params: {'xgb__max_depth': 2, 'xgb__n_estimators': 5}\n\n"));
        assert!(config.pmml_path().exists());
    }

    #[test]
    fn test_cmd_train_error_names_failed_stage() {
        let (root, mut config) = workspace();
        config.model_dir = root.path().join("missing");
        let err = cmd_train(config).unwrap_err();
        assert_eq!(err.to_string(), "writing classification report");

        let (_root, mut config) = workspace();
        config.data_dir = PathBuf::from("/nonexistent/data");
        let err = cmd_train(config).unwrap_err();
        assert_eq!(err.to_string(), "loading training data");
    }

    #[test]
    fn test_zero_jobs_rejected() {
        let cli = Cli { n_jobs: Some(0), ..Cli::default() };
        assert!(cli.run_config().is_err());
    }
}
