//! Core library for locating the originating fiscal note (NFE) of invoice
//! line items.
//!
//! This crate provides:
//! - line item models and pipeline configuration
//! - a cascade of note recognizers cross-checked against each line's
//!   quantity and value, with unvalidated fallbacks
//! - batch classification into resolved and unresolved rows
//! - CSV ingestion of line items

pub mod classifier;
pub mod error;
pub mod extraction;
pub mod input;
pub mod models;

pub use classifier::{
    classify, ClassificationResult, ClassifiedRow, RowClassifier, RowOutcome, UnresolvedReason,
};
pub use error::{ExtractionError, InputError, NfeError, Result};
pub use extraction::{normalize, Candidate, MatchStage, NoteExtractor, Resolution};
pub use input::{read_line_items, read_line_items_from_path, LoadedRows};
pub use models::config::NfeConfig;
pub use models::line_item::{LineItem, ResolvedIdentifier};

/// Re-export of the decimal type used for quantities and values.
pub use rust_decimal::Decimal;
