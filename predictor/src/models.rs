use std::collections::HashMap;

use ndarray::{Array2, ArrayView1, ArrayViewMut1, Axis};

use crate::error::{PipelineError, PipelineResult};

/// Anything the pipeline can read from disk.
pub trait Dataset {
    type Output;

    fn load(&self) -> PipelineResult<Self::Output>;
}

/// A labelled 2-D table: rows are samples (cell lines or patients),
/// columns are genes or drugs.
///
/// Row and column ids are unique and their position maps are built once, so
/// lookups by id are O(1) for the whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct Table<T> {
    row_ids: Vec<String>,
    col_ids: Vec<String>,
    row_index: HashMap<String, usize>,
    col_index: HashMap<String, usize>,
    values: Array2<T>,
}

fn index_ids(ids: &[String], axis: &str) -> PipelineResult<HashMap<String, usize>> {
    let mut index = HashMap::with_capacity(ids.len());
    for (pos, id) in ids.iter().enumerate() {
        if index.insert(id.clone(), pos).is_some() {
            return Err(PipelineError::shape_mismatch(
                format!("{axis} ids"),
                "unique ids",
                format!("duplicate '{id}'"),
            ));
        }
    }
    Ok(index)
}

impl<T> Table<T> {
    pub fn new(
        row_ids: Vec<String>,
        col_ids: Vec<String>,
        values: Array2<T>,
    ) -> PipelineResult<Self> {
        if values.dim() != (row_ids.len(), col_ids.len()) {
            return Err(PipelineError::shape_mismatch(
                "table construction",
                format!("{}x{}", row_ids.len(), col_ids.len()),
                format!("{}x{}", values.nrows(), values.ncols()),
            ));
        }
        let row_index = index_ids(&row_ids, "row")?;
        let col_index = index_ids(&col_ids, "column")?;
        Ok(Self { row_ids, col_ids, row_index, col_index, values })
    }

    pub fn row_ids(&self) -> &[String] {
        &self.row_ids
    }

    pub fn col_ids(&self) -> &[String] {
        &self.col_ids
    }

    pub fn values(&self) -> &Array2<T> {
        &self.values
    }

    pub fn nrows(&self) -> usize {
        self.row_ids.len()
    }

    pub fn ncols(&self) -> usize {
        self.col_ids.len()
    }

    pub fn row_position(&self, id: &str) -> Option<usize> {
        self.row_index.get(id).copied()
    }

    pub fn col_position(&self, id: &str) -> Option<usize> {
        self.col_index.get(id).copied()
    }

    pub fn column_at(&self, j: usize) -> ArrayView1<'_, T> {
        self.values.column(j)
    }

    pub fn column_at_mut(&mut self, j: usize) -> ArrayViewMut1<'_, T> {
        self.values.column_mut(j)
    }

    /// Cell-wise conversion keeping both axes.
    pub fn map<U, F>(&self, f: F) -> Table<U>
    where
        F: FnMut(&T) -> U,
    {
        Table {
            row_ids: self.row_ids.clone(),
            col_ids: self.col_ids.clone(),
            row_index: self.row_index.clone(),
            col_index: self.col_index.clone(),
            values: self.values.map(f),
        }
    }
}

impl<T: Clone> Table<T> {
    pub fn filled(row_ids: Vec<String>, col_ids: Vec<String>, fill: T) -> PipelineResult<Self> {
        let values = Array2::from_elem((row_ids.len(), col_ids.len()), fill);
        Self::new(row_ids, col_ids, values)
    }

    pub fn transpose(&self) -> Table<T> {
        Table {
            row_ids: self.col_ids.clone(),
            col_ids: self.row_ids.clone(),
            row_index: self.col_index.clone(),
            col_index: self.row_index.clone(),
            values: self.values.t().as_standard_layout().into_owned(),
        }
    }

    /// Re-orders columns to `ids`; every requested id must exist.
    pub fn select_columns(&self, ids: &[String]) -> PipelineResult<Table<T>> {
        let mut positions = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        for id in ids {
            match self.col_position(id) {
                Some(j) => positions.push(j),
                None => missing.push(id.as_str()),
            }
        }
        if !missing.is_empty() {
            let preview: Vec<&str> = missing.iter().take(5).copied().collect();
            return Err(PipelineError::shape_mismatch(
                "column alignment",
                format!("{} columns", ids.len()),
                format!("{} missing (e.g. {})", missing.len(), preview.join(", ")),
            ));
        }
        Table::new(
            self.row_ids.clone(),
            ids.to_vec(),
            self.values.select(Axis(1), &positions),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn lookup_by_id() {
        let values = array![[1., 2., 3.], [4., 5., 6.]];
        let t = Table::new(ids(&["a", "b"]), ids(&["x", "y", "z"]), values).unwrap();
        assert_eq!(t.row_position("b"), Some(1));
        assert_eq!(t.col_position("q"), None);
        assert_eq!(t.column_at(t.col_position("y").unwrap()).to_vec(), vec![2., 5.]);
    }

    #[test]
    fn rejects_wrong_shape_and_duplicates() {
        let err = Table::new(ids(&["a"]), ids(&["x", "y"]), array![[1.0]]).unwrap_err();
        assert!(matches!(err, PipelineError::InputShapeMismatch { .. }));

        let err = Table::new(ids(&["a", "a"]), ids(&["x"]), array![[1.0], [2.0]]).unwrap_err();
        assert!(matches!(err, PipelineError::InputShapeMismatch { .. }));
    }

    #[test]
    fn select_and_transpose() {
        let values = array![[1., 2., 3.], [4., 5., 6.]];
        let t = Table::new(ids(&["a", "b"]), ids(&["x", "y", "z"]), values).unwrap();
        let s = t.select_columns(&ids(&["z", "x"])).unwrap();
        assert_eq!(s.values(), &array![[3., 1.], [6., 4.]]);
        assert!(t.select_columns(&ids(&["x", "w"])).is_err());

        let tt = t.transpose();
        assert_eq!(tt.row_ids(), &ids(&["x", "y", "z"])[..]);
        assert_eq!(tt.col_position("b"), Some(1));
        assert_eq!(tt.values()[[2, 1]], 6.0);
    }
}
