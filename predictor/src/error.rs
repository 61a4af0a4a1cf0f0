use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Two sequences or tables that must line up do not.
    #[error("shape mismatch in {context}: expected {expected}, found {found}")]
    InputShapeMismatch {
        context: String,
        expected: String,
        found: String,
    },

    /// Every training response for the drug is missing.
    #[error("no training responses available for drug '{drug}'")]
    MissingData { drug: String },

    #[error("failed to fit elastic net for drug '{drug}': {reason}")]
    Fitting { drug: String, reason: String },

    #[error("t-test undefined for drug '{drug}': {reason}")]
    Evaluation { drug: String, reason: String },

    #[error("column '{column}' has zero variance")]
    ZeroVariance { column: String },

    #[error("{}: cannot parse '{value}' at row '{row}', column '{column}'", .path.display())]
    Parse {
        path: PathBuf,
        row: String,
        column: String,
        value: String,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Errors confined to a single drug, which the skip policy may absorb.
    pub fn is_per_drug(&self) -> bool {
        matches!(
            self,
            PipelineError::MissingData { .. }
                | PipelineError::Fitting { .. }
                | PipelineError::Evaluation { .. }
        )
    }

    pub fn shape_mismatch(
        context: impl Into<String>,
        expected: impl ToString,
        found: impl ToString,
    ) -> Self {
        PipelineError::InputShapeMismatch {
            context: context.into(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_drug_level_errors_are_skippable() {
        assert!(PipelineError::MissingData { drug: "d".into() }.is_per_drug());
        assert!(PipelineError::Fitting { drug: "d".into(), reason: "r".into() }.is_per_drug());
        assert!(PipelineError::Evaluation { drug: "d".into(), reason: "r".into() }.is_per_drug());
        assert!(!PipelineError::shape_mismatch("groups", 3, 4).is_per_drug());
        assert!(!PipelineError::ZeroVariance { column: "g".into() }.is_per_drug());
    }

    #[test]
    fn shape_mismatch_message_names_both_sizes() {
        let msg = PipelineError::shape_mismatch("labels vs predictions", 10, 9).to_string();
        assert!(msg.contains("labels vs predictions"));
        assert!(msg.contains("10"));
        assert!(msg.contains("9"));
    }
}
