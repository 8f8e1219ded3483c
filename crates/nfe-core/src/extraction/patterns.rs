//! Regex patterns for locating note numbers in annotation text.
//!
//! The product-anchored shapes embed the row's product code, so they are
//! compiled per product code by [`CascadePatterns::for_product`] and kept in
//! a [`PatternCache`] for a batch. The product-independent fallback is
//! compiled once.

use std::collections::HashMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ExtractionError;

lazy_static! {
    // NOTA189DIA - alternate numbering, no spaces, any case
    pub static ref NOTA_DIA: Regex = Regex::new(r"(?i)NOTA(\d+)DIA").unwrap();
}

/// Unit token closing a validated clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitToken {
    /// Counted units.
    Un,
    /// Meters.
    Mt,
}

impl UnitToken {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Un => "UN",
            Self::Mt => "MT",
        }
    }
}

/// Patterns anchored on one product code.
#[derive(Debug, Clone)]
pub struct CascadePatterns {
    /// `<code> NFE <n> ... VR R$ <value> - <qty> UN`
    pub units: Regex,
    /// `<code> NFE <n> ... VR R$ <value> - <qty> MT`
    pub meters: Regex,
    /// `<code> NFE <n>` with the value clause truncated away.
    pub truncated: Regex,
}

impl CascadePatterns {
    /// Compile the product-anchored patterns for `product_code`.
    ///
    /// The code is matched literally; regex metacharacters in it carry no
    /// special meaning.
    pub fn for_product(product_code: &str) -> Result<Self, ExtractionError> {
        let code = regex::escape(product_code);
        let build = |pattern: String| {
            Regex::new(&pattern).map_err(|e| ExtractionError::Pattern {
                product_code: product_code.to_string(),
                reason: e.to_string(),
            })
        };

        Ok(Self {
            units: build(validated_clause(&code, UnitToken::Un))?,
            meters: build(validated_clause(&code, UnitToken::Mt))?,
            truncated: build(format!(r"{code}\s+NFE\s+(\d+)"))?,
        })
    }

    /// The validated pattern for a unit token.
    pub fn validated(&self, unit: UnitToken) -> &Regex {
        match unit {
            UnitToken::Un => &self.units,
            UnitToken::Mt => &self.meters,
        }
    }
}

/// Compiled patterns per product code, built before a batch is dispatched
/// and only read afterwards.
#[derive(Debug, Clone, Default)]
pub struct PatternCache {
    by_code: HashMap<String, Result<Arc<CascadePatterns>, ExtractionError>>,
}

impl PatternCache {
    /// Compile the patterns of every distinct code once.
    pub fn for_codes<'a>(codes: impl IntoIterator<Item = &'a str>) -> Self {
        let mut by_code = HashMap::new();
        for code in codes {
            if !by_code.contains_key(code) {
                let compiled = CascadePatterns::for_product(code).map(Arc::new);
                by_code.insert(code.to_string(), compiled);
            }
        }
        Self { by_code }
    }

    /// Patterns for `product_code`; codes outside the cache are compiled on
    /// the spot and not stored.
    pub fn get(&self, product_code: &str) -> Result<Arc<CascadePatterns>, ExtractionError> {
        match self.by_code.get(product_code) {
            Some(compiled) => compiled.clone(),
            None => CascadePatterns::for_product(product_code).map(Arc::new),
        }
    }

    /// Number of distinct codes compiled.
    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

// Groups: 1 = note number, 2 = value, 3 = quantity.
// The gap after the note number may not cross a comma.
fn validated_clause(escaped_code: &str, unit: UnitToken) -> String {
    format!(
        r"{escaped_code}\s+NFE\s+(\d+)[^,]*?VR\s+R\$\s+([\d.]+)\s*-\s*([\d.]+)\s*{}",
        unit.as_str()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nota_dia_case_insensitive() {
        let caps = NOTA_DIA.captures("ref nota189dia 12/03").unwrap();
        assert_eq!(&caps[1], "189");
        assert!(NOTA_DIA.is_match("NOTA42DIA"));
        assert!(!NOTA_DIA.is_match("NOTA 42 DIA"));
    }

    #[test]
    fn test_product_code_is_literal() {
        let patterns = CascadePatterns::for_product("A.1+").unwrap();
        assert!(patterns.truncated.is_match("A.1+ NFE 7"));
        assert!(!patterns.truncated.is_match("AX11 NFE 7"));
    }

    #[test]
    fn test_cache_compiles_each_code_once() {
        let cache = PatternCache::for_codes(["123", "456", "123"]);
        assert_eq!(cache.len(), 2);

        let first = cache.get("123").unwrap();
        let second = cache.get("123").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.truncated.is_match("123 NFE 5"));

        // not cached: compiled fresh each time
        let a = cache.get("789").unwrap();
        let b = cache.get("789").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(a.truncated.is_match("789 NFE 1"));
    }

    #[test]
    fn test_validated_clause_stops_at_comma() {
        let patterns = CascadePatterns::for_product("123").unwrap();
        assert!(patterns.units.is_match("123 NFE 42 blah VR R$ 55.30 - 10.00 UN"));
        assert!(!patterns.units.is_match("123 NFE 42 blah, VR R$ 55.30 - 10.00 UN"));
        assert!(patterns.meters.is_match("123 NFE 42 VR R$ 1.50-3.0MT"));
    }
}
