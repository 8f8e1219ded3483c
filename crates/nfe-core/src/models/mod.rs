//! Data models shared by the extraction pipeline and its callers.

pub mod config;
pub mod line_item;

pub use config::{ExtractionConfig, InputConfig, NfeConfig, ProcessingConfig};
pub use line_item::{LineItem, ResolvedIdentifier};
