//! Blueprint error types.

use thiserror::Error;

use reportkit_xlsx::ReportError;

/// Result type for workbook reading and decompiling.
pub type BlueprintResult<T> = std::result::Result<T, BlueprintError>;

/// Errors that abort a workbook scan.
#[derive(Debug, Error)]
pub enum BlueprintError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP error
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// XML error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// The archive is not an XLSX package.
    #[error("invalid XLSX format: {0}")]
    InvalidFormat(String),

    /// A required package part is missing.
    #[error("missing required part: {0}")]
    MissingPart(String),

    /// Hints or script (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error raised by the report crate while assembling the script.
    #[error("report error: {0}")]
    Report(#[from] ReportError),
}
