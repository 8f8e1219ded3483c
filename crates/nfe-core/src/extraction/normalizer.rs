//! Canonical form of note identifiers.

use crate::error::ExtractionError;

/// Width of a canonical note identifier.
pub const IDENTIFIER_WIDTH: usize = 6;

/// Left-pad `digits` with zeros to [`IDENTIFIER_WIDTH`].
///
/// Longer inputs are returned unchanged. Anything but ASCII digits (including
/// an empty string) is rejected.
pub fn normalize(digits: &str) -> Result<String, ExtractionError> {
    normalize_to_width(digits, IDENTIFIER_WIDTH)
}

/// Left-pad `digits` with zeros to `width`.
pub fn normalize_to_width(digits: &str, width: usize) -> Result<String, ExtractionError> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ExtractionError::InvalidDigits(digits.to_string()));
    }
    Ok(format!("{digits:0>width$}"))
}
