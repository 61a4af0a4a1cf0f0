use std::fmt;
use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::config::Orientation;
use crate::error::PipelineResult;
use crate::helper_functions::read_string_table;
use crate::models::{Dataset, Table};

pub const COMPLETE_RESPONSE: &str = "Complete Response";
pub const PARTIAL_RESPONSE: &str = "Partial Response";
pub const STABLE_DISEASE: &str = "Stable Disease";
pub const PROGRESSIVE_DISEASE: &str = "Clinical Progressive Disease";

/// Patient clinical response categories: patients × drugs.
pub struct ClinicalResponseDataset {
    pub path: PathBuf,
    pub orientation: Orientation,
}

impl Dataset for ClinicalResponseDataset {
    type Output = Table<Option<String>>;

    fn load(&self) -> PipelineResult<Table<Option<String>>> {
        info!("Reading clinical response data from {}", self.path.display());
        let table = match read_string_table(&self.path, self.orientation) {
            Ok(table) => table,
            Err(e) => {
                error!("Failed to read clinical response CSV: {}", e);
                return Err(e);
            }
        };
        info!("Loaded {} patients x {} drugs", table.nrows(), table.ncols());
        Ok(table)
    }
}

/// Binary clinical outcome of one patient for one drug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseLabel {
    /// Stable or progressive disease (0).
    NonResponder,
    /// Complete or partial response (1).
    Responder,
    /// A category outside the four known ones, kept verbatim.
    Unmapped(String),
    Missing,
}

impl ResponseLabel {
    pub fn from_category(category: Option<&str>) -> Self {
        match category {
            None => ResponseLabel::Missing,
            Some(COMPLETE_RESPONSE) | Some(PARTIAL_RESPONSE) => ResponseLabel::Responder,
            Some(STABLE_DISEASE) | Some(PROGRESSIVE_DISEASE) => ResponseLabel::NonResponder,
            Some(other) => ResponseLabel::Unmapped(other.to_string()),
        }
    }

    pub fn as_binary(&self) -> Option<u8> {
        match self {
            ResponseLabel::NonResponder => Some(0),
            ResponseLabel::Responder => Some(1),
            ResponseLabel::Unmapped(_) | ResponseLabel::Missing => None,
        }
    }
}

impl fmt::Display for ResponseLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseLabel::NonResponder => write!(f, "0"),
            ResponseLabel::Responder => write!(f, "1"),
            ResponseLabel::Unmapped(raw) => write!(f, "{raw}"),
            ResponseLabel::Missing => Ok(()),
        }
    }
}

/// Collapses the four clinical categories to responder / non-responder,
/// the same way for every drug column.
pub fn binarize(categories: &Table<Option<String>>) -> Table<ResponseLabel> {
    let labels = categories.map(|cell| ResponseLabel::from_category(cell.as_deref()));

    let unmapped = labels
        .values()
        .iter()
        .filter(|l| matches!(l, ResponseLabel::Unmapped(_)))
        .count();
    if unmapped > 0 {
        warn!("{} response labels outside the known categories were left unmapped", unmapped);
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn known_categories_map_to_binary() {
        assert_eq!(ResponseLabel::from_category(Some("Complete Response")).as_binary(), Some(1));
        assert_eq!(ResponseLabel::from_category(Some("Partial Response")).as_binary(), Some(1));
        assert_eq!(ResponseLabel::from_category(Some("Stable Disease")).as_binary(), Some(0));
        assert_eq!(
            ResponseLabel::from_category(Some("Clinical Progressive Disease")).as_binary(),
            Some(0)
        );
    }

    #[test]
    fn other_strings_pass_through() {
        for raw in ["complete response", "Unknown", "Stable Disease "] {
            let label = ResponseLabel::from_category(Some(raw));
            assert_eq!(label, ResponseLabel::Unmapped(raw.to_string()));
            assert_eq!(label.to_string(), raw);
            assert_eq!(label.as_binary(), None);
        }
        assert_eq!(ResponseLabel::from_category(None), ResponseLabel::Missing);
    }

    #[test]
    fn binarize_keeps_shape_and_is_column_independent() {
        let categories = Table::new(
            vec!["p1".into(), "p2".into()],
            vec!["d1".into(), "d2".into()],
            array![
                [Some("Complete Response".to_string()), Some("Stable Disease".to_string())],
                [None, Some("Not Evaluable".to_string())]
            ],
        )
        .unwrap();
        let labels = binarize(&categories);
        assert_eq!(labels.row_ids(), categories.row_ids());
        assert_eq!(labels.col_ids(), categories.col_ids());
        assert_eq!(labels.values()[[0, 0]], ResponseLabel::Responder);
        assert_eq!(labels.values()[[0, 1]], ResponseLabel::NonResponder);
        assert_eq!(labels.values()[[1, 0]], ResponseLabel::Missing);
        assert_eq!(labels.values()[[1, 1]], ResponseLabel::Unmapped("Not Evaluable".into()));
        // input untouched
        assert_eq!(categories.values()[[0, 0]].as_deref(), Some("Complete Response"));
    }
}
