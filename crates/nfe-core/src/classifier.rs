//! Batch classification of line items into resolved and unresolved.

use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ExtractionError, NfeError, Result};
use crate::extraction::{MatchStage, NoteExtractor, PatternCache, Resolution};
use crate::models::config::{ExtractionConfig, ProcessingConfig};
use crate::models::line_item::{LineItem, ResolvedIdentifier};

/// Why a row has no identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// Product code or annotation text absent; nothing was attempted.
    MissingInput,
    /// Every recognizer was exhausted.
    NoMatch,
}

/// Outcome of classifying one row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowOutcome {
    Resolved(Resolution),
    Unresolved { reason: UnresolvedReason },
    /// Extraction hit a defect; the row is treated as unresolved.
    Failed {
        #[serde(serialize_with = "serialize_error")]
        error: ExtractionError,
    },
}

fn serialize_error<S: serde::Serializer>(
    error: &ExtractionError,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

impl RowOutcome {
    pub fn identifier(&self) -> Option<&ResolvedIdentifier> {
        match self {
            Self::Resolved(resolution) => Some(&resolution.identifier),
            _ => None,
        }
    }

    pub fn stage(&self) -> Option<MatchStage> {
        match self {
            Self::Resolved(resolution) => Some(resolution.stage),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

/// A row paired with its outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedRow {
    /// Position of the row in the input.
    pub index: usize,
    pub item: LineItem,
    pub outcome: RowOutcome,
}

impl ClassifiedRow {
    pub fn identifier(&self) -> Option<&ResolvedIdentifier> {
        self.outcome.identifier()
    }
}

/// Classified rows in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    rows: Vec<ClassifiedRow>,
    resolved_count: usize,
    failed_count: usize,
}

impl ClassificationResult {
    fn from_rows(rows: Vec<ClassifiedRow>) -> Self {
        let resolved_count = rows.iter().filter(|r| r.outcome.is_resolved()).count();
        let failed_count = rows
            .iter()
            .filter(|r| matches!(r.outcome, RowOutcome::Failed { .. }))
            .count();
        Self {
            rows,
            resolved_count,
            failed_count,
        }
    }

    pub fn rows(&self) -> &[ClassifiedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn resolved_count(&self) -> usize {
        self.resolved_count
    }

    /// Rows without an identifier, failed rows included.
    pub fn unresolved_count(&self) -> usize {
        self.rows.len() - self.resolved_count
    }

    pub fn failed_count(&self) -> usize {
        self.failed_count
    }

    pub fn resolved(&self) -> impl Iterator<Item = &ClassifiedRow> {
        self.rows.iter().filter(|r| r.outcome.is_resolved())
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &ClassifiedRow> {
        self.rows.iter().filter(|r| !r.outcome.is_resolved())
    }

    pub fn into_rows(self) -> Vec<ClassifiedRow> {
        self.rows
    }
}

/// Applies the extraction cascade to every row of a batch.
#[derive(Debug, Clone, Default)]
pub struct RowClassifier {
    extractor: NoteExtractor,
    processing: ProcessingConfig,
}

impl RowClassifier {
    /// Create a classifier with default extraction settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set extraction settings.
    pub fn with_extraction(mut self, config: ExtractionConfig) -> Self {
        self.extractor = NoteExtractor::new(config);
        self
    }

    /// Set batch processing settings.
    pub fn with_processing(mut self, config: ProcessingConfig) -> Self {
        self.processing = config;
        self
    }

    /// Classify a single row.
    pub fn classify_row(&self, item: &LineItem) -> RowOutcome {
        self.classify_row_with(item, &PatternCache::default())
    }

    fn classify_row_with(&self, item: &LineItem, cache: &PatternCache) -> RowOutcome {
        let (Some(code), Some(text)) = (item.trimmed_product_code(), item.annotation()) else {
            return RowOutcome::Unresolved {
                reason: UnresolvedReason::MissingInput,
            };
        };

        let extracted = cache.get(code).and_then(|patterns| {
            self.extractor.extract_with(&patterns, code, text, item.quantity, item.value)
        });

        match extracted {
            Ok(Some(resolution)) => RowOutcome::Resolved(resolution),
            Ok(None) => RowOutcome::Unresolved {
                reason: UnresolvedReason::NoMatch,
            },
            Err(error) => {
                warn!(product_code = code, "row extraction failed: {}", error);
                RowOutcome::Failed { error }
            }
        }
    }

    /// Classify a batch; output order equals input order.
    ///
    /// Only fails when the worker pool cannot be built. Per-row failures are
    /// recorded in the row's outcome.
    pub fn classify(&self, items: Vec<LineItem>) -> Result<ClassificationResult> {
        let start = Instant::now();
        let cache = pattern_cache(&items);
        debug!(codes = cache.len(), "compiled product patterns");

        let rows = if self.processing.parallel && items.len() > 1 {
            if self.processing.num_threads > 0 {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(self.processing.num_threads)
                    .build()
                    .map_err(|e| NfeError::Config(format!("failed to build worker pool: {e}")))?;
                pool.install(|| self.classify_parallel(items, &cache))
            } else {
                self.classify_parallel(items, &cache)
            }
        } else {
            self.classify_sequential(items, &cache)
        };

        let result = ClassificationResult::from_rows(rows);
        info!(
            total = result.len(),
            resolved = result.resolved_count(),
            unresolved = result.unresolved_count(),
            failed = result.failed_count(),
            "classified rows in {:?}",
            start.elapsed()
        );
        Ok(result)
    }

    // Indexed parallel collect keeps input order.
    fn classify_parallel(&self, items: Vec<LineItem>, cache: &PatternCache) -> Vec<ClassifiedRow> {
        items
            .into_par_iter()
            .enumerate()
            .map(|(index, item)| self.classify_indexed(index, item, cache))
            .collect()
    }

    fn classify_sequential(
        &self,
        items: Vec<LineItem>,
        cache: &PatternCache,
    ) -> Vec<ClassifiedRow> {
        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| self.classify_indexed(index, item, cache))
            .collect()
    }

    fn classify_indexed(
        &self,
        index: usize,
        item: LineItem,
        cache: &PatternCache,
    ) -> ClassifiedRow {
        let outcome = self.classify_row_with(&item, cache);
        debug!(row = index, resolved = outcome.is_resolved(), "classified row");
        ClassifiedRow {
            index,
            item,
            outcome,
        }
    }
}

/// Classify rows with default settings, sequentially.
pub fn classify(items: Vec<LineItem>) -> ClassificationResult {
    let cache = pattern_cache(&items);
    let rows = RowClassifier::new().classify_sequential(items, &cache);
    ClassificationResult::from_rows(rows)
}

// Only rows that reach the cascade need patterns.
fn pattern_cache(items: &[LineItem]) -> PatternCache {
    PatternCache::for_codes(
        items
            .iter()
            .filter(|item| item.annotation().is_some())
            .filter_map(LineItem::trimmed_product_code),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn row(text: &str) -> LineItem {
        LineItem::new("123", dec("10.0"), dec("55.30")).with_annotation(text)
    }

    fn identifiers(result: &ClassificationResult) -> Vec<Option<String>> {
        result
            .rows()
            .iter()
            .map(|r| r.identifier().map(|id| id.to_string()))
            .collect()
    }

    #[test]
    fn test_missing_annotation_is_unresolved() {
        let items = vec![
            LineItem::new("123", dec("1"), dec("1")),
            row(""),
            row("   "),
        ];
        let result = classify(items);
        assert_eq!(result.resolved_count(), 0);
        for classified in result.rows() {
            assert_eq!(
                classified.outcome,
                RowOutcome::Unresolved {
                    reason: UnresolvedReason::MissingInput
                }
            );
        }
    }

    #[test]
    fn test_missing_product_code_is_unresolved() {
        let mut item = row("123 NFE 5");
        item.product_code = None;
        let outcome = RowClassifier::new().classify_row(&item);
        assert_eq!(
            outcome,
            RowOutcome::Unresolved {
                reason: UnresolvedReason::MissingInput
            }
        );
    }

    #[test]
    fn test_product_code_is_trimmed() {
        let mut item = row("123 NFE 5");
        item.product_code = Some(" 123 ".to_string());
        let outcome = RowClassifier::new().classify_row(&item);
        assert_eq!(outcome.identifier().map(|id| id.as_str()), Some("000005"));
    }

    #[test]
    fn test_scenarios() {
        let items = vec![
            row("123 NFE 42 blah, VR R$ 55.30 - 10.00 UN"),
            row("123 NFE 42 blah VR R$ 99.99 - 10.00 UN NOTA777DIA"),
            row("123 NFE 5"),
            row("sem referencia"),
        ];
        let result = classify(items);

        assert_eq!(
            identifiers(&result),
            vec![
                Some("000042".to_string()),
                Some("000777".to_string()),
                Some("000005".to_string()),
                None,
            ]
        );
        assert_eq!(result.resolved_count(), 3);
        assert_eq!(result.unresolved_count(), 1);
        assert_eq!(
            result.rows()[3].outcome,
            RowOutcome::Unresolved {
                reason: UnresolvedReason::NoMatch
            }
        );
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let items: Vec<LineItem> = (0..200)
            .map(|i| match i % 4 {
                0 => row(&format!("123 NFE {i} VR R$ 55.30 - 10.00 UN")),
                1 => row(&format!("NOTA{i}DIA")),
                2 => row("nada"),
                _ => LineItem::new("123", dec("1"), dec("1")),
            })
            .collect();

        let sequential = RowClassifier::new()
            .with_processing(ProcessingConfig {
                parallel: false,
                num_threads: 0,
            })
            .classify(items.clone())
            .unwrap();
        let parallel = RowClassifier::new()
            .with_processing(ProcessingConfig {
                parallel: true,
                num_threads: 3,
            })
            .classify(items)
            .unwrap();

        assert_eq!(sequential, parallel);
        assert_eq!(parallel.resolved_count(), 100);
        let indices: Vec<_> = parallel.rows().iter().map(|r| r.index).collect();
        assert_eq!(indices, (0..200).collect::<Vec<_>>());
    }

    #[test]
    fn test_failed_row_does_not_abort_batch() {
        // U+0663 is a Unicode digit: the pattern captures it, the
        // normalizer refuses it
        let items = vec![row("123 NFE \u{0663}"), row("123 NFE 5")];
        let result = RowClassifier::new().classify(items).unwrap();

        assert!(matches!(
            result.rows()[0].outcome,
            RowOutcome::Failed {
                error: ExtractionError::InvalidDigits(_)
            }
        ));
        assert_eq!(result.failed_count(), 1);
        assert_eq!(result.unresolved_count(), 1);
        assert_eq!(identifiers(&result)[1].as_deref(), Some("000005"));
    }

    #[test]
    fn test_pattern_cache_covers_distinct_codes() {
        let mut other = row("456 NFE 9");
        other.product_code = Some("456".to_string());
        let items = vec![
            row("123 NFE 1"),
            other,
            row("123 NFE 2"),
            LineItem::new("789", dec("1"), dec("1")),
        ];

        let cache = pattern_cache(&items);
        assert_eq!(cache.len(), 2);

        let result = classify(items);
        assert_eq!(
            identifiers(&result),
            vec![
                Some("000001".to_string()),
                Some("000009".to_string()),
                Some("000002".to_string()),
                None,
            ]
        );
    }

    #[test]
    fn test_blank_value_row_uses_fallbacks() {
        let mut item = row("123 NFE 42 VR R$ 55.30 - 10.00 UN");
        item.value = None;
        let outcome = RowClassifier::new().classify_row(&item);
        assert_eq!(outcome.identifier().map(|id| id.as_str()), Some("000042"));
        assert_eq!(outcome.stage(), Some(MatchStage::Truncated));
    }

    #[test]
    fn test_partitions() {
        let result = classify(vec![row("123 NFE 1"), row("x"), row("123 NFE 2")]);
        let resolved: Vec<_> = result.resolved().map(|r| r.index).collect();
        let unresolved: Vec<_> = result.unresolved().map(|r| r.index).collect();
        assert_eq!(resolved, vec![0, 2]);
        assert_eq!(unresolved, vec![1]);
    }
}
