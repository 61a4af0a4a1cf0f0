//! elastic_net_cv.rs – one elastic net per drug, (l1_ratio, alpha) picked by seeded k-fold CV

use linfa::prelude::*;
use linfa_elasticnet::ElasticNet;
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::data_handling::drug_response::DrugColumn;
use crate::error::{PipelineError, PipelineResult};
use crate::models::Table;

#[derive(Debug, Clone, PartialEq)]
pub struct ElasticNetCvParams {
    pub folds: usize,
    pub l1_ratios: Vec<f64>,
    pub n_alphas: usize,
    pub eps: f64,
    pub max_iterations: u32,
    pub tolerance: f64,
    pub seed: u64,
}

impl From<&PipelineConfig> for ElasticNetCvParams {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            folds: config.cv_folds,
            l1_ratios: config.l1_ratios.clone(),
            n_alphas: config.n_alphas,
            eps: config.eps,
            max_iterations: config.max_iterations,
            tolerance: config.tolerance,
            seed: config.seed,
        }
    }
}

/// What was learned for one drug; written to the model summary JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub drug: String,
    pub l1_ratio: f64,
    pub alpha: f64,
    pub cv_mse: f64,
    pub n_train: usize,
    pub n_nonzero: usize,
    pub intercept: f64,
}

#[derive(Debug, Clone)]
pub struct DrugFit {
    /// One value per test row, in test row order.
    pub predictions: Array1<f64>,
    pub summary: ModelSummary,
}

// ───────── helpers ─────────

/// Log-spaced penalties from the smallest alpha that zeroes every
/// coefficient down to `alpha_max * eps`, largest first.
pub fn alpha_grid(
    x: &Array2<f64>,
    y: &Array1<f64>,
    l1_ratio: f64,
    n_alphas: usize,
    eps: f64,
) -> Vec<f64> {
    let n = x.nrows() as f64;
    let y_mean = y.mean().unwrap_or(0.0);
    let x_means = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));

    let alpha_max = x
        .columns()
        .into_iter()
        .zip(x_means.iter())
        .map(|(col, &m)| {
            col.iter()
                .zip(y.iter())
                .map(|(&xv, &yv)| (xv - m) * (yv - y_mean))
                .sum::<f64>()
                .abs()
        })
        .fold(0.0_f64, f64::max)
        / (n * l1_ratio);

    if alpha_max <= 0.0 || !alpha_max.is_finite() {
        return vec![0.0];
    }
    if n_alphas == 1 {
        return vec![alpha_max];
    }
    let log_span = eps.ln();
    (0..n_alphas)
        .map(|k| alpha_max * (log_span * k as f64 / (n_alphas - 1) as f64).exp())
        .collect()
}

/// Held-out row positions of each fold: rows shuffled with a fixed seed,
/// then dealt round-robin.
pub fn kfold_test_indices(n: usize, folds: usize, seed: u64) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    (0..folds)
        .map(|f| {
            order
                .iter()
                .enumerate()
                .filter(|(i, _)| i % folds == f)
                .map(|(_, &row)| row)
                .collect()
        })
        .collect()
}

/// Elastic net fitted on column-centred features. linfa only centres the
/// target, so the feature means are kept here and subtracted at predict time.
pub struct FittedNet {
    model: ElasticNet<f64>,
    x_means: Array1<f64>,
}

impl FittedNet {
    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        let centred = x - &self.x_means;
        self.model.predict(&centred)
    }

    pub fn coefficients(&self) -> &Array1<f64> {
        self.model.hyperplane()
    }

    /// Intercept on the original (uncentred) feature scale.
    pub fn intercept(&self) -> f64 {
        self.model.intercept() - self.x_means.dot(self.model.hyperplane())
    }
}

fn fit_model(
    drug: &str,
    x: &Array2<f64>,
    y: Array1<f64>,
    l1_ratio: f64,
    alpha: f64,
    params: &ElasticNetCvParams,
) -> PipelineResult<FittedNet> {
    let x_means = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
    let dataset = Dataset::new(x - &x_means, y);
    let model = ElasticNet::<f64>::params()
        .penalty(alpha)
        .l1_ratio(l1_ratio)
        .max_iterations(params.max_iterations)
        .tolerance(params.tolerance)
        .fit(&dataset)
        .map_err(|e| PipelineError::Fitting {
            drug: drug.to_string(),
            reason: format!("{}", e),
        })?;
    Ok(FittedNet { model, x_means })
}

fn mse(predicted: &Array1<f64>, actual: &Array1<f64>) -> f64 {
    predicted
        .iter()
        .zip(actual)
        .map(|(p, a)| (p - a).powi(2))
        .sum::<f64>()
        / actual.len() as f64
}

// ───────── public API ─────────

/// Cross-validates the (l1_ratio, alpha) grid and refits the winner on all rows.
pub fn fit_elastic_net_cv(
    drug: &str,
    x: &Array2<f64>,
    y: &Array1<f64>,
    params: &ElasticNetCvParams,
) -> PipelineResult<(FittedNet, ModelSummary)> {
    let n = x.nrows();
    if n < params.folds {
        return Err(PipelineError::Fitting {
            drug: drug.to_string(),
            reason: format!("{} training samples for {}-fold cross-validation", n, params.folds),
        });
    }

    let test_folds = kfold_test_indices(n, params.folds, params.seed);
    let train_folds: Vec<Vec<usize>> = test_folds
        .iter()
        .map(|held_out| (0..n).filter(|i| !held_out.contains(i)).collect())
        .collect();

    // (l1_ratio, alpha, mean held-out MSE)
    let mut best: Option<(f64, f64, f64)> = None;

    for &l1_ratio in &params.l1_ratios {
        let alphas = alpha_grid(x, y, l1_ratio, params.n_alphas, params.eps);
        let mut fold_mse = vec![0.0; alphas.len()];

        for (train_idx, test_idx) in train_folds.iter().zip(&test_folds) {
            let x_fit = x.select(Axis(0), train_idx);
            let y_fit = y.select(Axis(0), train_idx);
            let x_held = x.select(Axis(0), test_idx);
            let y_held = y.select(Axis(0), test_idx);

            for (a, &alpha) in alphas.iter().enumerate() {
                let model = fit_model(drug, &x_fit, y_fit.clone(), l1_ratio, alpha, params)?;
                let predicted = model.predict(&x_held);
                fold_mse[a] += mse(&predicted, &y_held) / params.folds as f64;
            }
        }

        for (&alpha, &score) in alphas.iter().zip(&fold_mse) {
            if best.map_or(true, |(_, _, best_score)| score < best_score) {
                best = Some((l1_ratio, alpha, score));
            }
        }
        debug!(
            "{}: l1_ratio {:.2} → best CV MSE {:.5} over {} alphas",
            drug,
            l1_ratio,
            fold_mse.iter().copied().fold(f64::INFINITY, f64::min),
            alphas.len()
        );
    }

    let Some((l1_ratio, alpha, cv_mse)) = best.filter(|(_, _, score)| score.is_finite()) else {
        return Err(PipelineError::Fitting {
            drug: drug.to_string(),
            reason: "cross-validation produced no finite error".to_string(),
        });
    };

    let model = fit_model(drug, x, y.clone(), l1_ratio, alpha, params)?;
    let summary = ModelSummary {
        drug: drug.to_string(),
        l1_ratio,
        alpha,
        cv_mse,
        n_train: n,
        n_nonzero: model.coefficients().iter().filter(|w| **w != 0.0).count(),
        intercept: model.intercept(),
    };
    info!(
        "{:<20} l1_ratio = {:>4.2}, α = {:>10.6}, CV MSE = {:>8.5}, non-zero = {}",
        drug, summary.l1_ratio, summary.alpha, summary.cv_mse, summary.n_nonzero
    );
    Ok((model, summary))
}

/// Trains one drug's model on the cell lines with a measured response and
/// predicts every row of `x_test`.
pub fn fit_predict(
    x_train: &Table<f64>,
    y_train: DrugColumn<'_>,
    x_test: &Table<f64>,
    params: &ElasticNetCvParams,
) -> PipelineResult<DrugFit> {
    let drug = y_train.drug;
    if x_train.col_ids() != x_test.col_ids() {
        return Err(PipelineError::shape_mismatch(
            "train/test gene columns",
            x_train.ncols(),
            x_test.ncols(),
        ));
    }

    // inner join on cell-line id
    let mut rows = Vec::new();
    let mut targets = Vec::new();
    let mut observed = 0usize;
    for (id, value) in y_train.observed() {
        observed += 1;
        if let Some(i) = x_train.row_position(id) {
            rows.push(i);
            targets.push(value);
        }
    }
    if observed == 0 {
        return Err(PipelineError::MissingData { drug: drug.to_string() });
    }
    if rows.len() < observed {
        warn!(
            "{}: {} cell lines with a response have no expression profile",
            drug,
            observed - rows.len()
        );
    }

    let x = x_train.values().select(Axis(0), &rows);
    let y = Array1::from(targets);
    if x.iter().any(|v| !v.is_finite()) {
        return Err(PipelineError::Fitting {
            drug: drug.to_string(),
            reason: "training expression contains non-finite values".to_string(),
        });
    }

    info!("Fitting ElasticNetCV for drug: {} ({} cell lines)", drug, rows.len());
    let (model, summary) = fit_elastic_net_cv(drug, &x, &y, params)?;

    info!("Predicting y test...");
    let predictions = model.predict(x_test.values());
    Ok(DrugFit { predictions, summary })
}
