//! Numeric cross-check of candidates against the line.

use rust_decimal::Decimal;
use tracing::trace;

use super::Candidate;

/// Exclusive absolute tolerances for the value and quantity comparison.
///
/// Differences are taken on the exact decimals as written, not on values
/// rounded to cents first. The two only disagree when a number sits exactly
/// on a half cent: `55.305` against `55.30` differs by `0.005` and is
/// accepted here, while rounding to cents can carry it to `55.31` and
/// reject it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub value: Decimal,
    pub quantity: Decimal,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            value: Decimal::new(1, 2),
            quantity: Decimal::new(1, 2),
        }
    }
}

impl Tolerance {
    /// Whether `candidate` carries both numbers and both agree with the line.
    ///
    /// A line without a quantity or value never agrees.
    pub fn accepts(
        &self,
        candidate: &Candidate,
        quantity: Option<Decimal>,
        value: Option<Decimal>,
    ) -> bool {
        match (candidate.matched_value, candidate.matched_quantity, value, quantity) {
            (Some(matched_value), Some(matched_quantity), Some(value), Some(quantity)) => {
                (matched_value - value).abs() < self.value
                    && (matched_quantity - quantity).abs() < self.quantity
            }
            _ => false,
        }
    }
}

/// First candidate, in the given order, that agrees with the line.
///
/// `None` is the ordinary "unvalidated" outcome and hands over to the
/// fallbacks.
pub fn find_validated<'a>(
    candidates: &'a [Candidate],
    quantity: Option<Decimal>,
    value: Option<Decimal>,
    tolerance: &Tolerance,
) -> Option<&'a Candidate> {
    candidates.iter().find(|candidate| {
        let accepted = tolerance.accepts(candidate, quantity, value);
        trace!(
            note = %candidate.raw_digits,
            stage = %candidate.stage,
            accepted,
            "checked candidate"
        );
        accepted
    })
}
