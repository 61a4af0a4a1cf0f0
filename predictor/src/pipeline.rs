use std::fs::{self, File};
use std::io::BufWriter;

use ndarray::Array1;
use polars::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::analysis::describe::LabelSummary;
use crate::analysis::t_test::{evaluate, TTestResult};
use crate::config::{DrugFailurePolicy, PipelineConfig};
use crate::data_handling::clinical_response::{binarize, ClinicalResponseDataset, ResponseLabel};
use crate::data_handling::drug_response::{DrugColumn, DrugResponseDataset};
use crate::data_handling::expression::{align_genes, ExpressionDataset};
use crate::elastic_net_cv::{fit_predict, ElasticNetCvParams, ModelSummary};
use crate::error::PipelineResult;
use crate::helper_functions::{dataframe_to_csv, table_to_dataframe};
use crate::models::{Dataset, Table};
use crate::standardize::{standardize, ColumnStats};

const PATIENT_ID_COLUMN: &str = "patient id";

/// The four input tables, samples on the rows.
pub struct PipelineInputs {
    pub train_expression: Table<f64>,
    pub train_response: Table<f64>,
    pub test_expression: Table<f64>,
    pub test_categories: Table<Option<String>>,
}

impl PipelineInputs {
    pub fn load(config: &PipelineConfig) -> PipelineResult<Self> {
        let orientation = config.orientation;
        Ok(Self {
            train_expression: ExpressionDataset {
                path: config.input_path(&config.train_expression),
                orientation,
            }
            .load()?,
            train_response: DrugResponseDataset {
                path: config.input_path(&config.train_response),
                orientation,
            }
            .load()?,
            test_expression: ExpressionDataset {
                path: config.input_path(&config.test_expression),
                orientation,
            }
            .load()?,
            test_categories: ClinicalResponseDataset {
                path: config.input_path(&config.test_response),
                orientation,
            }
            .load()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrugFailure {
    pub drug: String,
    pub error: String,
}

/// One row of the results table.
#[derive(Debug, Clone)]
pub struct DrugResult {
    pub drug: String,
    pub labels: LabelSummary,
    pub t_test: TTestResult,
}

pub struct PipelineReport {
    /// Patients × test drugs; NaN where no model was fitted.
    pub predictions: Table<f64>,
    /// One entry per test drug, in test column order.
    pub results: Vec<DrugResult>,
    pub models: Vec<ModelSummary>,
    pub failures: Vec<DrugFailure>,
}

#[derive(Serialize)]
struct ModelSummaryFile<'a> {
    models: &'a [ModelSummary],
    failures: &'a [DrugFailure],
}

/// The test matrix standardized either on its own or with the training statistics.
fn standardize_test(
    config: &PipelineConfig,
    train_stats: &ColumnStats,
    test_expression: &Table<f64>,
) -> PipelineResult<Table<f64>> {
    if config.reuse_train_stats {
        info!("Standardizing test expression with training statistics");
        train_stats.transform(test_expression)
    } else {
        standardize("test expression", test_expression, config.zero_variance).map(|(t, _)| t)
    }
}

/// Fit, predict and evaluate a single drug.
fn run_drug(
    x_train: &Table<f64>,
    y_train: DrugColumn<'_>,
    x_test: &Table<f64>,
    actual: &[ResponseLabel],
    params: &ElasticNetCvParams,
    config: &PipelineConfig,
) -> PipelineResult<(Array1<f64>, ModelSummary, TTestResult)> {
    let fit = fit_predict(x_train, y_train, x_test, params)?;

    info!("Performing t-test...");
    let t_test = evaluate(y_train.drug, actual, &fit.predictions.to_vec(), config.degenerate_test)?;
    info!(
        "{:<20} t = {:>9.4}, p = {:.4e}",
        y_train.drug, t_test.statistic, t_test.p_value
    );
    Ok((fit.predictions, fit.summary, t_test))
}

pub fn run(inputs: &PipelineInputs, config: &PipelineConfig) -> PipelineResult<PipelineReport> {
    let labels = binarize(&inputs.test_categories);

    let (x_train, train_stats) =
        standardize("train expression", &inputs.train_expression, config.zero_variance)?;
    let (y_train, _) = standardize("train response", &inputs.train_response, config.zero_variance)?;
    let test_expression = align_genes(&inputs.train_expression, &inputs.test_expression)?;
    let x_test = standardize_test(config, &train_stats, &test_expression)?;

    // labels follow the prediction rows, matched by patient id
    let label_rows: Vec<Option<usize>> = x_test
        .row_ids()
        .iter()
        .map(|id| labels.row_position(id))
        .collect();
    let unlabelled = label_rows.iter().filter(|r| r.is_none()).count();
    if unlabelled > 0 {
        warn!("{} test patients have no clinical response row", unlabelled);
    }
    let no_profile = labels.nrows().saturating_sub(x_test.nrows() - unlabelled);
    if no_profile > 0 {
        warn!("{} patients with a clinical response have no expression profile", no_profile);
    }

    let mut predictions = Table::filled(
        x_test.row_ids().to_vec(),
        labels.col_ids().to_vec(),
        f64::NAN,
    )?;
    let mut results: Vec<DrugResult> = labels
        .col_ids()
        .iter()
        .enumerate()
        .map(|(j, drug)| DrugResult {
            drug: drug.clone(),
            labels: LabelSummary::from_labels(
                inputs.test_categories.column_at(j),
                labels.column_at(j),
            ),
            t_test: TTestResult::undefined(),
        })
        .collect();
    let mut models = Vec::new();
    let mut failures = Vec::new();

    let params = ElasticNetCvParams::from(config);
    for j in 0..y_train.ncols() {
        let y_single = DrugColumn::from_table(&y_train, j);
        let drug = y_single.drug;
        let Some(test_col) = labels.col_position(drug) else {
            warn!("Drug '{}' has no clinical responses in the test set, skipping", drug);
            continue;
        };

        let label_col = labels.column_at(test_col);
        let actual: Vec<ResponseLabel> = label_rows
            .iter()
            .map(|row| row.map_or(ResponseLabel::Missing, |i| label_col[i].clone()))
            .collect();

        match run_drug(&x_train, y_single, &x_test, &actual, &params, config) {
            Ok((predicted, summary, t_test)) => {
                predictions.column_at_mut(test_col).assign(&predicted);
                results[test_col].t_test = t_test;
                models.push(summary);
            }
            Err(e) if e.is_per_drug() && config.on_drug_failure == DrugFailurePolicy::Skip => {
                warn!("Skipping drug '{}': {}", drug, e);
                failures.push(DrugFailure { drug: drug.to_string(), error: e.to_string() });
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        "Finished {} drugs: {} fitted, {} failed",
        y_train.ncols(),
        models.len(),
        failures.len()
    );
    Ok(PipelineReport { predictions, results, models, failures })
}

fn results_frame(results: &[DrugResult]) -> PolarsResult<DataFrame> {
    let f64_col = |name: &str, get: fn(&DrugResult) -> f64| {
        Column::new(name.into(), results.iter().map(get).collect::<Vec<f64>>())
    };
    let u64_col = |name: &str, get: fn(&DrugResult) -> usize| {
        Column::new(name.into(), results.iter().map(|r| get(r) as u64).collect::<Vec<u64>>())
    };
    DataFrame::new(vec![
        Column::new("drug".into(), results.iter().map(|r| r.drug.clone()).collect::<Vec<_>>()),
        u64_col("count", |r| r.labels.count),
        u64_col("unique", |r| r.labels.unique),
        Column::new("top".into(), results.iter().map(|r| r.labels.top.clone()).collect::<Vec<_>>()),
        u64_col("freq", |r| r.labels.freq),
        f64_col("mean", |r| r.labels.mean),
        f64_col("std", |r| r.labels.std),
        f64_col("min", |r| r.labels.min),
        f64_col("25%", |r| r.labels.q25),
        f64_col("50%", |r| r.labels.median),
        f64_col("75%", |r| r.labels.q75),
        f64_col("max", |r| r.labels.max),
        f64_col("T-statistic", |r| r.t_test.statistic),
        f64_col("P-value", |r| r.t_test.p_value),
    ])
}

pub fn write_outputs(report: &PipelineReport, config: &PipelineConfig) -> PipelineResult<()> {
    let mut predictions = table_to_dataframe(&report.predictions, PATIENT_ID_COLUMN)?;
    dataframe_to_csv(&mut predictions, &config.output_path(&config.predictions_file))?;

    let mut results = results_frame(&report.results)?;
    dataframe_to_csv(&mut results, &config.output_path(&config.results_file))?;

    if config.write_model_summary {
        let path = config.output_path(&config.model_summary_file);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let summary = ModelSummaryFile { models: &report.models, failures: &report.failures };
        serde_json::to_writer_pretty(BufWriter::new(File::create(&path)?), &summary)?;
        info!("Saved model summary to {}", path.display());
    }
    Ok(())
}

/// Load, run and persist in one go.
pub fn run_from_config(config: &PipelineConfig) -> PipelineResult<PipelineReport> {
    config.validate()?;
    let inputs = PipelineInputs::load(config)?;
    let report = run(&inputs, config)?;
    write_outputs(&report, config)?;
    if !report.failures.is_empty() {
        warn!(
            "{} drugs produced no predictions: {}",
            report.failures.len(),
            report
                .failures
                .iter()
                .map(|f| f.drug.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    Ok(report)
}
