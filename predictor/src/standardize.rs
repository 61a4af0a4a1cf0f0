//! Per-column z-scoring with the statistics kept for reuse and inversion.

use tracing::{info, warn};

use crate::config::ZeroVariancePolicy;
use crate::error::{PipelineError, PipelineResult};
use crate::models::Table;

/// Mean and scale of every column of the table they were fitted on.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnStats {
    pub columns: Vec<String>,
    pub means: Vec<f64>,
    /// Divisor applied by `transform`; NaN blanks the column.
    pub scales: Vec<f64>,
}

/// NaN-skipping mean and population standard deviation (ddof = 0).
fn mean_std(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let observed: Vec<f64> = values.filter(|v| !v.is_nan()).collect();
    if observed.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = observed.len() as f64;
    let mean = observed.iter().sum::<f64>() / n;
    let var = observed.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

impl ColumnStats {
    pub fn fit(table: &Table<f64>, policy: ZeroVariancePolicy) -> PipelineResult<Self> {
        let mut means = Vec::with_capacity(table.ncols());
        let mut scales = Vec::with_capacity(table.ncols());
        let mut constant = 0usize;

        for (j, name) in table.col_ids().iter().enumerate() {
            let (mean, std) = mean_std(table.column_at(j).iter().copied());
            // relative cut-off so that float noise on a constant column still counts as constant
            let is_constant = std.is_finite() && std <= f64::EPSILON * mean.abs().max(1.0);
            let scale = if !is_constant {
                std
            } else {
                constant += 1;
                match policy {
                    ZeroVariancePolicy::Center => 1.0,
                    ZeroVariancePolicy::Nan => f64::NAN,
                    ZeroVariancePolicy::Error => {
                        return Err(PipelineError::ZeroVariance { column: name.clone() })
                    }
                }
            };
            means.push(mean);
            scales.push(scale);
        }

        if constant > 0 {
            warn!(
                "{} zero-variance columns out of {} ({:?} policy)",
                constant,
                table.ncols(),
                policy
            );
        }
        Ok(Self { columns: table.col_ids().to_vec(), means, scales })
    }

    fn check_columns(&self, table: &Table<f64>) -> PipelineResult<()> {
        if table.col_ids() != self.columns.as_slice() {
            return Err(PipelineError::shape_mismatch(
                "standardization columns",
                format!("{} fitted columns", self.columns.len()),
                format!("{} columns in a different layout", table.ncols()),
            ));
        }
        Ok(())
    }

    pub fn transform(&self, table: &Table<f64>) -> PipelineResult<Table<f64>> {
        self.check_columns(table)?;
        let mut out = table.clone();
        for j in 0..out.ncols() {
            let (mean, scale) = (self.means[j], self.scales[j]);
            out.column_at_mut(j).mapv_inplace(|v| (v - mean) / scale);
        }
        Ok(out)
    }

    #[cfg(test)]
    pub fn inverse_transform(&self, table: &Table<f64>) -> PipelineResult<Table<f64>> {
        self.check_columns(table)?;
        let mut out = table.clone();
        for j in 0..out.ncols() {
            let (mean, scale) = (self.means[j], self.scales[j]);
            out.column_at_mut(j).mapv_inplace(|v| v * scale + mean);
        }
        Ok(out)
    }
}

/// Fits the statistics on `table` and applies them to it.
pub fn standardize(
    name: &str,
    table: &Table<f64>,
    policy: ZeroVariancePolicy,
) -> PipelineResult<(Table<f64>, ColumnStats)> {
    let stats = ColumnStats::fit(table, policy)?;
    let scaled = stats.transform(table)?;
    info!("Standardized {} ({} x {})", name, table.nrows(), table.ncols());
    Ok((scaled, stats))
}
