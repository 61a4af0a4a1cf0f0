use std::fs::{self, File};
use std::path::{Path, PathBuf};

use ndarray::Array2;
use polars::prelude::*;
use tracing::{debug, info};

use crate::config::Orientation;
use crate::error::{PipelineError, PipelineResult};
use crate::models::Table;

/// Tokens treated as a missing numeric cell.
const MISSING_TOKENS: [&str; 6] = ["", "NA", "NaN", "nan", "N/A", "null"];

/// Reads a CSV with every column kept as a string; typing is left to the caller.
pub fn read_csv(file_path: &Path) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(PathBuf::from(file_path)))?
        .finish()
}

/// Loads a labelled table whose first column holds identifiers, returning it
/// with samples on the rows regardless of the file's orientation.
pub fn read_string_table(
    path: &Path,
    orientation: Orientation,
) -> PipelineResult<Table<Option<String>>> {
    let df = read_csv(path)?;
    let columns = df.get_columns();
    let Some((id_col, value_cols)) = columns.split_first() else {
        return Err(PipelineError::shape_mismatch(
            format!("{}", path.display()),
            "an identifier column",
            "no columns",
        ));
    };

    let id_col = id_col.cast(&DataType::String)?;
    let row_ids: Vec<String> = id_col
        .str()?
        .into_iter()
        .enumerate()
        .map(|(i, id)| id.map(str::to_string).unwrap_or_else(|| format!("row_{}", i + 1)))
        .collect();
    let col_ids: Vec<String> = value_cols.iter().map(|c| c.name().to_string()).collect();

    let mut values = Array2::<Option<String>>::from_elem((row_ids.len(), col_ids.len()), None);
    for (j, column) in value_cols.iter().enumerate() {
        let column = column.cast(&DataType::String)?;
        for (i, cell) in column.str()?.into_iter().enumerate() {
            values[[i, j]] = cell.map(str::to_string);
        }
    }

    debug!("{}: {} rows x {} columns", path.display(), row_ids.len(), col_ids.len());
    let table = Table::new(row_ids, col_ids, values)?;
    Ok(match orientation {
        Orientation::SamplesAsRows => table,
        Orientation::SamplesAsColumns => table.transpose(),
    })
}

/// Parses one numeric cell; missing tokens become NaN and infinities are rejected.
pub fn parse_numeric_cell(cell: Option<&str>) -> Option<f64> {
    match cell.map(str::trim) {
        None => Some(f64::NAN),
        Some(s) if MISSING_TOKENS.contains(&s) => Some(f64::NAN),
        Some(s) => s.parse::<f64>().ok().filter(|v| !v.is_infinite()),
    }
}

/// Converts a string table into numbers, naming the first offending cell.
pub fn parse_numeric_table(
    table: &Table<Option<String>>,
    path: &Path,
) -> PipelineResult<Table<f64>> {
    for ((i, j), cell) in table.values().indexed_iter() {
        if parse_numeric_cell(cell.as_deref()).is_none() {
            return Err(PipelineError::Parse {
                path: path.to_path_buf(),
                row: table.row_ids()[i].clone(),
                column: table.col_ids()[j].clone(),
                value: cell.clone().unwrap_or_default(),
            });
        }
    }
    Ok(table.map(|cell| parse_numeric_cell(cell.as_deref()).unwrap_or(f64::NAN)))
}

pub fn dataframe_to_csv(df: &mut DataFrame, path: &Path) -> PipelineResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .finish(df)?;
    info!("Wrote {} rows to {}", df.height(), path.display());
    Ok(())
}

/// Frame with the row ids as a leading string column and one f64 column per table column.
pub fn table_to_dataframe(table: &Table<f64>, id_column: &str) -> PolarsResult<DataFrame> {
    let mut columns = Vec::with_capacity(table.ncols() + 1);
    columns.push(Column::new(id_column.into(), table.row_ids().to_vec()));
    for (j, name) in table.col_ids().iter().enumerate() {
        let values: Vec<f64> = table.column_at(j).to_vec();
        columns.push(Column::new(name.as_str().into(), values));
    }
    DataFrame::new(columns)
}
