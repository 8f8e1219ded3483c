//! Invoice line items and the identifiers resolved for them.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single invoice line as supplied by the tabular source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Product code (cProd).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_code: Option<String>,

    /// Commercial quantity (qCom). `None` when the cell was blank.
    pub quantity: Option<Decimal>,

    /// Line value (vProd). `None` when the cell was blank.
    pub value: Option<Decimal>,

    /// Complementary information text (infCpl).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation_text: Option<String>,
}

impl LineItem {
    /// Create a line item with no annotation.
    pub fn new(product_code: impl Into<String>, quantity: Decimal, value: Decimal) -> Self {
        Self {
            product_code: Some(product_code.into()),
            quantity: Some(quantity),
            value: Some(value),
            annotation_text: None,
        }
    }

    /// Attach annotation text.
    pub fn with_annotation(mut self, text: impl Into<String>) -> Self {
        self.annotation_text = Some(text.into());
        self
    }

    /// Product code with surrounding whitespace removed, `None` if blank.
    pub fn trimmed_product_code(&self) -> Option<&str> {
        self.product_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }

    /// Annotation text, `None` if absent or blank.
    pub fn annotation(&self) -> Option<&str> {
        self.annotation_text
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }
}

/// A normalized, fixed-width note identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedIdentifier {
    digits: String,
}

impl ResolvedIdentifier {
    /// Wrap an already normalized digit string.
    pub(crate) fn from_normalized(digits: String) -> Self {
        Self { digits }
    }

    /// The zero-padded digits.
    pub fn as_str(&self) -> &str {
        &self.digits
    }

    pub fn into_string(self) -> String {
        self.digits
    }
}

impl fmt::Display for ResolvedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.digits)
    }
}

impl AsRef<str> for ResolvedIdentifier {
    fn as_ref(&self) -> &str {
        &self.digits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_trimmed_product_code() {
        let item = LineItem::new("  123 ", dec("1"), dec("2"));
        assert_eq!(item.trimmed_product_code(), Some("123"));

        let blank = LineItem::new("   ", dec("1"), dec("2"));
        assert_eq!(blank.trimmed_product_code(), None);
    }

    #[test]
    fn test_blank_annotation_is_absent() {
        let item = LineItem::new("123", dec("1"), dec("2")).with_annotation("  \n ");
        assert_eq!(item.annotation(), None);

        let item = item.with_annotation("123 NFE 5");
        assert_eq!(item.annotation(), Some("123 NFE 5"));
    }
}
