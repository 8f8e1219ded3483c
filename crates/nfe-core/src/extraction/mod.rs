//! Note number extraction from annotation text.
//!
//! Extraction runs as a fixed cascade:
//! 1. product-anchored patterns carrying value and quantity ([`cascade`]),
//! 2. numeric cross-check against the line ([`validator`]),
//! 3. weaker unvalidated patterns when nothing validated ([`fallback`]),
//! 4. zero-padding of the winning digits ([`normalizer`]).

pub mod cascade;
pub mod fallback;
pub mod normalizer;
pub mod patterns;
pub mod validator;

pub use cascade::match_candidates;
pub use fallback::resolve_fallback;
pub use normalizer::{normalize, normalize_to_width, IDENTIFIER_WIDTH};
pub use patterns::{CascadePatterns, PatternCache, UnitToken};
pub use validator::{find_validated, Tolerance};

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ExtractionError;
use crate::models::config::ExtractionConfig;
use crate::models::line_item::ResolvedIdentifier;

/// Which recognizer produced a note number, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStage {
    /// Product code, note, value and quantity in `UN`, validated.
    ValidatedUnits,
    /// Product code, note, value and quantity in `MT`, validated.
    ValidatedMeters,
    /// `NOTA<n>DIA`, unvalidated.
    NotaDia,
    /// Product code and note only, unvalidated.
    Truncated,
}

impl MatchStage {
    /// Priority rank, 1 is tried first.
    pub fn rank(self) -> u8 {
        match self {
            Self::ValidatedUnits => 1,
            Self::ValidatedMeters => 2,
            Self::NotaDia => 3,
            Self::Truncated => 4,
        }
    }

    /// Whether the stage cross-checks the line's value and quantity.
    pub fn is_validated(self) -> bool {
        matches!(self, Self::ValidatedUnits | Self::ValidatedMeters)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ValidatedUnits => "validated_units",
            Self::ValidatedMeters => "validated_meters",
            Self::NotaDia => "nota_dia",
            Self::Truncated => "truncated",
        }
    }
}

impl fmt::Display for MatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A note number found in the text, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Captured note number, unpadded.
    pub raw_digits: String,
    /// Quantity carried by the match, if the pattern has one.
    pub matched_quantity: Option<Decimal>,
    /// Value carried by the match, if the pattern has one.
    pub matched_value: Option<Decimal>,
    /// Recognizer that produced the match.
    pub stage: MatchStage,
    /// Byte range of the whole match in the annotation.
    pub span: (usize, usize),
}

impl Candidate {
    /// Candidate from a pattern without numeric fields.
    pub fn bare(raw_digits: impl Into<String>, stage: MatchStage, start: usize, end: usize) -> Self {
        Self {
            raw_digits: raw_digits.into(),
            matched_quantity: None,
            matched_value: None,
            stage,
            span: (start, end),
        }
    }

    pub fn source_pattern_rank(&self) -> u8 {
        self.stage.rank()
    }
}

/// The identifier chosen for a line, with the recognizer that found it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub identifier: ResolvedIdentifier,
    pub stage: MatchStage,
}

/// Runs the full cascade for one line.
#[derive(Debug, Clone)]
pub struct NoteExtractor {
    config: ExtractionConfig,
}

impl NoteExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Find the note for a line.
    ///
    /// `Ok(None)` means every recognizer was exhausted without a winner.
    /// A missing quantity or value fails validation, so only the fallbacks
    /// can resolve such a line.
    pub fn extract(
        &self,
        product_code: &str,
        text: &str,
        quantity: Option<Decimal>,
        value: Option<Decimal>,
    ) -> Result<Option<Resolution>, ExtractionError> {
        let patterns = CascadePatterns::for_product(product_code)?;
        self.extract_with(&patterns, product_code, text, quantity, value)
    }

    /// Like [`extract`](Self::extract), with patterns already compiled for
    /// `product_code`.
    pub fn extract_with(
        &self,
        patterns: &CascadePatterns,
        product_code: &str,
        text: &str,
        quantity: Option<Decimal>,
        value: Option<Decimal>,
    ) -> Result<Option<Resolution>, ExtractionError> {
        let candidates = match_candidates(patterns, text);
        let tolerance = Tolerance {
            value: self.config.value_tolerance,
            quantity: self.config.quantity_tolerance,
        };

        let winner = match find_validated(&candidates, quantity, value, &tolerance) {
            Some(candidate) => Some(candidate.clone()),
            None => {
                debug!(
                    product_code,
                    candidates = candidates.len(),
                    "no validated candidate, trying fallbacks"
                );
                resolve_fallback(patterns, text, &self.config)
            }
        };

        let Some(winner) = winner else {
            return Ok(None);
        };

        let digits = normalize_to_width(&winner.raw_digits, self.config.identifier_width)?;
        debug!(product_code, note = %digits, stage = %winner.stage, "resolved note");

        Ok(Some(Resolution {
            identifier: ResolvedIdentifier::from_normalized(digits),
            stage: winner.stage,
        }))
    }
}

impl Default for NoteExtractor {
    fn default() -> Self {
        Self::new(ExtractionConfig::default())
    }
}
