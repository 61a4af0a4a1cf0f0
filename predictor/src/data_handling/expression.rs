use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::config::Orientation;
use crate::error::PipelineResult;
use crate::helper_functions::{parse_numeric_table, read_string_table};
use crate::models::{Dataset, Table};

/// Gene-expression matrix: samples × genes.
pub struct ExpressionDataset {
    pub path: PathBuf,
    pub orientation: Orientation,
}

impl Dataset for ExpressionDataset {
    type Output = Table<f64>;

    fn load(&self) -> PipelineResult<Table<f64>> {
        info!("Reading expression data from {}", self.path.display());
        let raw = match read_string_table(&self.path, self.orientation) {
            Ok(raw) => raw,
            Err(e) => {
                error!("Failed to read expression CSV: {}", e);
                return Err(e);
            }
        };
        let table = parse_numeric_table(&raw, &self.path)?;

        let missing = table.values().iter().filter(|v| v.is_nan()).count();
        if missing > 0 {
            warn!("{} missing expression values in {}", missing, self.path.display());
        }
        info!("Loaded {} samples x {} genes", table.nrows(), table.ncols());
        Ok(table)
    }
}

/// Puts the test matrix's genes in the training order; a training gene
/// absent from the test matrix is a shape mismatch.
pub fn align_genes(train: &Table<f64>, test: &Table<f64>) -> PipelineResult<Table<f64>> {
    if train.col_ids() == test.col_ids() {
        return Ok(test.clone());
    }
    let extra = test.ncols().saturating_sub(train.ncols());
    if extra > 0 {
        warn!("Ignoring {} test genes not present in the training expression", extra);
    }
    info!("Re-ordering test expression columns to the training gene order");
    test.select_columns(train.col_ids())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use ndarray::array;
    use std::io::Write;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn loads_gene_rows_as_columns() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "cell line id,c1,c2\nTP53,0.5,1.5\nEGFR,2.0,NA\n").unwrap();
        let table = ExpressionDataset {
            path: file.path().to_path_buf(),
            orientation: Orientation::SamplesAsColumns,
        }
        .load()
        .unwrap();
        assert_eq!(table.row_ids(), &["c1", "c2"]);
        assert_eq!(table.col_ids(), &["TP53", "EGFR"]);
        assert!(table.values()[[1, 1]].is_nan());
    }

    #[test]
    fn aligns_test_genes_by_name() {
        let train = Table::new(ids(&["c1"]), ids(&["g1", "g2"]), array![[1.0, 2.0]]).unwrap();
        let test =
            Table::new(ids(&["p1"]), ids(&["g2", "g3", "g1"]), array![[20.0, 30.0, 10.0]]).unwrap();
        let aligned = align_genes(&train, &test).unwrap();
        assert_eq!(aligned.col_ids(), train.col_ids());
        assert_eq!(aligned.values(), &array![[10.0, 20.0]]);

        let short = Table::new(ids(&["p1"]), ids(&["g1"]), array![[1.0]]).unwrap();
        assert!(matches!(
            align_genes(&train, &short),
            Err(PipelineError::InputShapeMismatch { .. })
        ));
    }
}
