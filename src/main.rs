//! Kolosal XGBoost trainer - Main Entry Point
//!
//! Loads the pre-split tables, grid-searches the pipeline, writes the
//! classification report and exports the best model to PMML.

use clap::Parser;
use kolosal_xgb_trainer::cli::{cmd_train, Cli};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kolosal_xgb_trainer=info".into()),
        )
        // stdout carries the step lines
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.run_config()?;
    cmd_train(config)?;

    Ok(())
}
