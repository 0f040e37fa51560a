//! Report error taxonomy.

use thiserror::Error;

/// Result type for report operations.
pub type ReportResult<T> = std::result::Result<T, ReportError>;

/// "Run aborted" errors raised by the writer, rule engine and action driver.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Caller-supplied parameters reference nonexistent datasets, sheets or values.
    #[error("validation error: {0}")]
    Validation(String),

    /// Implicit "last table" reference could not be resolved.
    #[error("reference error: {0}")]
    Reference(String),

    /// Output-format limit exceeded before the offending table was written.
    #[error("cell limit exceeded: {constraint} (column {column:?}, row {row}, length {length})")]
    CellLimit {
        /// Violated constraint.
        constraint: String,
        /// Column key of the offending cell.
        column: String,
        /// 0-based data row index of the offending cell.
        row: usize,
        /// Offending text length in characters.
        length: usize,
    },

    /// Style rule expression failed to parse or evaluate.
    #[error("invalid expression in rule #{rule_index} `{expression}`: {reason}")]
    InvalidExpression {
        /// 0-based rule position.
        rule_index: usize,
        /// Raw expression text.
        expression: String,
        /// Failure description.
        reason: String,
    },

    /// Mutation attempted after the workbook was finalized.
    #[error("cannot write after close()")]
    Closed,

    /// Workbook serialization error.
    #[error("xlsx write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// Dataset access error.
    #[error("dataset error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// Action parameter or config decoding error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
