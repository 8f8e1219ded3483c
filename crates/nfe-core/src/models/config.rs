//! Configuration structures for the note extraction pipeline.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{NfeError, Result};

/// Main configuration for the nfe pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NfeConfig {
    /// Note extraction configuration.
    pub extraction: ExtractionConfig,

    /// Tabular input configuration.
    pub input: InputConfig,

    /// Batch processing configuration.
    pub processing: ProcessingConfig,
}

/// Note extraction configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Maximum absolute difference (exclusive) between the line value and
    /// the value embedded in the annotation.
    pub value_tolerance: Decimal,

    /// Maximum absolute difference (exclusive) between the line quantity and
    /// the quantity embedded in the annotation.
    pub quantity_tolerance: Decimal,

    /// Width the note number is zero-padded to.
    pub identifier_width: usize,

    /// Accept `NOTA<digits>DIA` when no validated match exists.
    pub enable_nota_dia_fallback: bool,

    /// Accept `<code> NFE <digits>` without a value clause when no
    /// validated match exists.
    pub enable_truncated_fallback: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            value_tolerance: Decimal::new(1, 2),
            quantity_tolerance: Decimal::new(1, 2),
            identifier_width: crate::extraction::IDENTIFIER_WIDTH,
            enable_nota_dia_fallback: true,
            enable_truncated_fallback: true,
        }
    }
}

/// Column mapping for the tabular source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Product code column.
    pub product_code_column: String,

    /// Quantity column.
    pub quantity_column: String,

    /// Line value column.
    pub value_column: String,

    /// Annotation text column.
    pub annotation_column: String,

    /// Rows with a blank cell in this column are dropped before
    /// classification.
    pub required_column: Option<String>,

    /// Field delimiter.
    pub delimiter: char,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            product_code_column: "ns1:cProd".to_string(),
            quantity_column: "ns1:qCom".to_string(),
            value_column: "ns1:vProd".to_string(),
            annotation_column: "ns1:infCpl".to_string(),
            required_column: Some("TECSCI".to_string()),
            delimiter: ',',
        }
    }
}

/// Batch processing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Classify rows on a worker pool.
    pub parallel: bool,

    /// Number of worker threads (0 = one per CPU).
    pub num_threads: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            num_threads: 0,
        }
    }
}

impl NfeConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            serde_json::from_str(&content).map_err(|e| NfeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| NfeError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the pipeline cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.extraction.value_tolerance.is_sign_negative()
            || self.extraction.quantity_tolerance.is_sign_negative()
        {
            return Err(NfeError::Config("tolerances must not be negative".to_string()));
        }
        if self.extraction.identifier_width == 0 {
            return Err(NfeError::Config("identifier_width must be positive".to_string()));
        }
        if !self.input.delimiter.is_ascii() {
            return Err(NfeError::Config(format!(
                "delimiter must be a single ASCII character, got {:?}",
                self.input.delimiter
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = NfeConfig::default();
        assert_eq!(config.extraction.value_tolerance, Decimal::new(1, 2));
        assert_eq!(config.extraction.identifier_width, 6);
        assert_eq!(config.input.required_column.as_deref(), Some("TECSCI"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: NfeConfig =
            serde_json::from_str(r#"{"input": {"delimiter": ";"}}"#).unwrap();
        assert_eq!(config.input.delimiter, ';');
        assert_eq!(config.input.annotation_column, "ns1:infCpl");
        assert_eq!(config.extraction, ExtractionConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = NfeConfig::default();
        config.processing.parallel = false;
        config.save(&path).unwrap();

        assert_eq!(NfeConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_validate_rejects_zero_width() {
        let mut config = NfeConfig::default();
        config.extraction.identifier_width = 0;
        assert!(matches!(config.validate(), Err(NfeError::Config(_))));
    }
}
