use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PipelineError, PipelineResult};

/// How sample and feature identifiers are laid out in an input CSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Header row holds sample ids, first column holds gene/drug ids.
    SamplesAsColumns,
    /// Header row holds gene/drug ids, first column holds sample ids.
    SamplesAsRows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ZeroVariancePolicy {
    /// Centre the column and keep a unit scale.
    Center,
    /// Replace the whole column with NaN.
    Nan,
    /// Refuse to standardize.
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DegenerateTestPolicy {
    Nan,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DrugFailurePolicy {
    /// Log the failure, leave the drug's outputs NaN and continue.
    Skip,
    /// Stop the whole run at the first failing drug.
    Abort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub train_expression: String,
    pub train_response: String,
    pub test_expression: String,
    pub test_response: String,
    pub orientation: Orientation,

    /// Defaults to `data_dir` when unset.
    pub output_dir: Option<PathBuf>,
    pub predictions_file: String,
    pub results_file: String,
    pub model_summary_file: String,
    pub write_model_summary: bool,

    pub cv_folds: usize,
    pub seed: u64,
    /// Each drug costs `l1_ratios.len() * n_alphas * cv_folds` cold-start
    /// coordinate-descent fits plus one refit (3,501 with the defaults);
    /// linfa-elasticnet has no warm start along the alpha path. Shrink these
    /// two on genome-wide inputs.
    pub l1_ratios: Vec<f64>,
    pub n_alphas: usize,
    pub eps: f64,
    pub max_iterations: u32,
    pub tolerance: f64,

    pub reuse_train_stats: bool,
    pub zero_variance: ZeroVariancePolicy,
    pub degenerate_test: DegenerateTestPolicy,
    pub on_drug_failure: DrugFailurePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("../Data/"),
            train_expression: "gdsc_expr_postCB.csv".to_string(),
            train_response: "gdsc_dr_lnIC50.csv".to_string(),
            test_expression: "tcga_expr_postCB.csv".to_string(),
            test_response: "tcga_dr.csv".to_string(),
            orientation: Orientation::SamplesAsColumns,
            output_dir: None,
            predictions_file: "tcga_dr_prediction(normalized).csv".to_string(),
            results_file: "results.csv".to_string(),
            model_summary_file: "model_summary.json".to_string(),
            write_model_summary: true,
            cv_folds: 5,
            seed: 0,
            l1_ratios: vec![0.1, 0.5, 0.7, 0.9, 0.95, 0.99, 1.0],
            n_alphas: 100,
            eps: 1e-3,
            max_iterations: 1000,
            tolerance: 1e-4,
            reuse_train_stats: false,
            zero_variance: ZeroVariancePolicy::Center,
            degenerate_test: DegenerateTestPolicy::Nan,
            on_drug_failure: DrugFailurePolicy::Skip,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_file(path: &Path) -> PipelineResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: PipelineConfig = serde_json::from_reader(reader)?;
        Ok(config)
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.cv_folds < 2 {
            return Err(PipelineError::Config(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if self.l1_ratios.is_empty() {
            return Err(PipelineError::Config("l1_ratios must not be empty".into()));
        }
        if let Some(bad) = self.l1_ratios.iter().find(|&&r| !(r > 0.0 && r <= 1.0)) {
            return Err(PipelineError::Config(format!(
                "l1_ratio {} outside (0, 1]",
                bad
            )));
        }
        if self.n_alphas == 0 {
            return Err(PipelineError::Config("n_alphas must be at least 1".into()));
        }
        if !(self.eps > 0.0 && self.eps < 1.0) {
            return Err(PipelineError::Config(format!("eps {} outside (0, 1)", self.eps)));
        }
        if self.tolerance <= 0.0 || self.max_iterations == 0 {
            return Err(PipelineError::Config(
                "tolerance and max_iterations must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn input_path(&self, file_name: &str) -> PathBuf {
        self.data_dir.join(file_name)
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir
            .as_deref()
            .unwrap_or(&self.data_dir)
            .join(file_name)
    }

    pub fn log_summary(&self) {
        info!("=== Pipeline configuration ===");
        info!("data dir            {}", self.data_dir.display());
        info!("orientation         {:?}", self.orientation);
        info!("cv folds / seed     {} / {}", self.cv_folds, self.seed);
        info!("l1 ratios           {:?}", self.l1_ratios);
        info!("alphas / eps        {} / {}", self.n_alphas, self.eps);
        info!("reuse train stats   {}", self.reuse_train_stats);
        info!("zero variance       {:?}", self.zero_variance);
        info!("degenerate t-test   {:?}", self.degenerate_test);
        info!("on drug failure     {:?}", self.on_drug_failure);
        info!("==============================");
    }
}
