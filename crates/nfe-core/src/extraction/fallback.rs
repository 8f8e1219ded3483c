//! Unvalidated recognizers tried after the validated cascade came up empty.

use tracing::debug;

use crate::models::config::ExtractionConfig;

use super::patterns::{CascadePatterns, NOTA_DIA};
use super::{Candidate, MatchStage};

/// Try `NOTA<n>DIA` anywhere in the text, then `<code> NFE <n>`.
///
/// The first match of the first enabled recognizer wins. Neither looks at
/// the line's value or quantity, and `NOTA<n>DIA` ignores the product code
/// entirely, so in a block describing several items it can attribute a
/// note belonging to another line.
pub fn resolve_fallback(
    patterns: &CascadePatterns,
    text: &str,
    config: &ExtractionConfig,
) -> Option<Candidate> {
    if config.enable_nota_dia_fallback {
        if let Some(caps) = NOTA_DIA.captures(text) {
            let full_match = caps.get(0).unwrap();
            debug!(note = &caps[1], "matched NOTA/DIA fallback");
            return Some(Candidate::bare(
                &caps[1],
                MatchStage::NotaDia,
                full_match.start(),
                full_match.end(),
            ));
        }
    }

    if config.enable_truncated_fallback {
        if let Some(caps) = patterns.truncated.captures(text) {
            let full_match = caps.get(0).unwrap();
            debug!(note = &caps[1], "matched truncated fallback");
            return Some(Candidate::bare(
                &caps[1],
                MatchStage::Truncated,
                full_match.start(),
                full_match.end(),
            ));
        }
    }

    None
}
