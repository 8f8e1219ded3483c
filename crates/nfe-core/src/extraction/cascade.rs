//! Product-anchored matching of validated note clauses.

use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::debug;

use super::patterns::{CascadePatterns, UnitToken};
use super::{Candidate, MatchStage};

/// Collect every `UN` candidate in text order, then every `MT` candidate in
/// text order.
pub fn match_candidates(patterns: &CascadePatterns, text: &str) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for (unit, stage) in [
        (UnitToken::Un, MatchStage::ValidatedUnits),
        (UnitToken::Mt, MatchStage::ValidatedMeters),
    ] {
        for caps in patterns.validated(unit).captures_iter(text) {
            let full_match = caps.get(0).unwrap();
            let (Some(value), Some(quantity)) = (parse_amount(&caps[2]), parse_amount(&caps[3]))
            else {
                debug!(
                    clause = full_match.as_str(),
                    "skipping clause with unparseable amounts"
                );
                continue;
            };

            candidates.push(Candidate {
                raw_digits: caps[1].to_string(),
                matched_quantity: Some(quantity),
                matched_value: Some(value),
                stage,
                span: (full_match.start(), full_match.end()),
            });
        }
    }

    candidates
}

// `[\d.]+` also admits strings like "1.2.3"; those are rejected here.
fn parse_amount(s: &str) -> Option<Decimal> {
    Decimal::from_str(s).ok()
}
