use std::path::PathBuf;

use ndarray::ArrayView1;
use tracing::{error, info, warn};

use crate::config::Orientation;
use crate::error::PipelineResult;
use crate::helper_functions::{parse_numeric_table, read_string_table};
use crate::models::{Dataset, Table};

/// Cell-line log-IC50 matrix: cell lines × drugs, NaN where untested.
pub struct DrugResponseDataset {
    pub path: PathBuf,
    pub orientation: Orientation,
}

impl Dataset for DrugResponseDataset {
    type Output = Table<f64>;

    fn load(&self) -> PipelineResult<Table<f64>> {
        info!("Reading drug response data from {}", self.path.display());
        let raw = match read_string_table(&self.path, self.orientation) {
            Ok(raw) => raw,
            Err(e) => {
                error!("Failed to read drug response CSV: {}", e);
                return Err(e);
            }
        };
        let table = parse_numeric_table(&raw, &self.path)?;

        for (j, drug) in table.col_ids().iter().enumerate() {
            if table.column_at(j).iter().all(|v| v.is_nan()) {
                warn!("Drug '{}' has no measured response in the training set", drug);
            }
        }
        info!("Loaded {} cell lines x {} drugs", table.nrows(), table.ncols());
        Ok(table)
    }
}

/// One drug's training responses, keyed by cell-line id.
#[derive(Debug, Clone, Copy)]
pub struct DrugColumn<'a> {
    pub drug: &'a str,
    pub sample_ids: &'a [String],
    pub values: ArrayView1<'a, f64>,
}

impl<'a> DrugColumn<'a> {
    pub fn from_table(table: &'a Table<f64>, j: usize) -> Self {
        Self {
            drug: &table.col_ids()[j],
            sample_ids: table.row_ids(),
            values: table.column_at(j),
        }
    }

    /// (sample id, response) pairs with the missing responses dropped.
    pub fn observed(&self) -> impl Iterator<Item = (&'a str, f64)> + '_ {
        self.sample_ids
            .iter()
            .zip(self.values.iter())
            .filter(|(_, v)| !v.is_nan())
            .map(|(id, &v)| (id.as_str(), v))
    }
}
