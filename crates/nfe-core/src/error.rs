//! Error types for the nfe-core library.

use thiserror::Error;

/// Main error type for the nfe library.
#[derive(Error, Debug)]
pub enum NfeError {
    /// Note extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Tabular input error.
    #[error("input error: {0}")]
    Input(#[from] InputError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised while extracting a note identifier from a single row.
///
/// These are recorded against the row that produced them and never abort a
/// batch. A row that simply has no note is not an error, see
/// [`UnresolvedReason`](crate::classifier::UnresolvedReason).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// The normalizer received something other than ASCII digits.
    #[error("invalid note digits: {0:?}")]
    InvalidDigits(String),

    /// A per-row pattern could not be compiled.
    #[error("failed to build pattern for product {product_code:?}: {reason}")]
    Pattern { product_code: String, reason: String },
}

/// Errors related to reading line items from tabular data.
#[derive(Error, Debug)]
pub enum InputError {
    /// A configured column is not present in the header.
    #[error("missing column: {0}")]
    MissingColumn(String),

    /// A numeric cell could not be parsed.
    #[error("row {row}: invalid number in {column}: {value:?}")]
    InvalidNumber {
        row: usize,
        column: String,
        value: String,
    },

    /// Underlying CSV failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for the nfe library.
pub type Result<T> = std::result::Result<T, NfeError>;
