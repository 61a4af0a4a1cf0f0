use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{DrugFailurePolicy, Orientation, PipelineConfig};
use crate::pipeline::run_from_config;

mod analysis;
mod config;
mod data_handling;
mod elastic_net_cv;
mod error;
mod helper_functions;
mod models;
mod pipeline;
mod standardize;

/// Single-task drug response predictor: one elastic net per drug, trained on
/// cell lines and evaluated on patients with a responder/non-responder t-test.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// JSON configuration file; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Where the prediction and results tables go (defaults to the data dir).
    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[arg(long, value_enum)]
    orientation: Option<Orientation>,

    #[arg(long)]
    folds: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    /// Standardize the test expression with the training expression statistics.
    #[arg(long)]
    reuse_train_stats: bool,

    #[arg(long, value_enum)]
    on_drug_failure: Option<DrugFailurePolicy>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        if self.output_dir.is_some() {
            config.output_dir = self.output_dir;
        }
        if let Some(orientation) = self.orientation {
            config.orientation = orientation;
        }
        if let Some(folds) = self.folds {
            config.cv_folds = folds;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if self.reuse_train_stats {
            config.reuse_train_stats = true;
        }
        if let Some(policy) = self.on_drug_failure {
            config.on_drug_failure = policy;
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting the single-task drug response predictor");

    let config = Cli::parse().into_config()?;
    config.log_summary();

    let report = run_from_config(&config).map_err(|e| {
        error!("Pipeline failed: {}", e);
        e
    })?;

    let significant = report
        .results
        .iter()
        .filter(|r| r.t_test.p_value < 0.05)
        .count();
    info!(
        "Done: {} drugs fitted, {} with p < 0.05, predictions in {}",
        report.models.len(),
        significant,
        config.output_path(&config.predictions_file).display()
    );
    Ok(())
}
