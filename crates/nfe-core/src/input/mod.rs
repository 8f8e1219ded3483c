//! Line item ingestion from delimited text exports.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::debug;

use crate::error::{InputError, Result};
use crate::models::config::InputConfig;
use crate::models::line_item::LineItem;

/// Rows read from a table.
#[derive(Debug, Clone, Default)]
pub struct LoadedRows {
    /// Rows kept for classification, in file order.
    pub items: Vec<LineItem>,
    /// Rows skipped for a blank required column.
    pub dropped: usize,
}

struct ColumnIndices {
    product_code: usize,
    quantity: usize,
    value: usize,
    annotation: usize,
    required: Option<usize>,
}

/// Read line items from a CSV file.
pub fn read_line_items_from_path(path: &Path, config: &InputConfig) -> Result<LoadedRows> {
    let file = File::open(path)?;
    read_line_items(file, config)
}

/// Read line items from CSV data using the configured column names.
pub fn read_line_items<R: Read>(reader: R, config: &InputConfig) -> Result<LoadedRows> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(config.delimiter as u8)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .map_err(InputError::from)?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| InputError::MissingColumn(name.to_string()))
    };

    let columns = ColumnIndices {
        product_code: find(&config.product_code_column)?,
        quantity: find(&config.quantity_column)?,
        value: find(&config.value_column)?,
        annotation: find(&config.annotation_column)?,
        required: config.required_column.as_deref().map(|name| find(name)).transpose()?,
    };

    let mut loaded = LoadedRows::default();

    for (i, record) in csv_reader.records().enumerate() {
        let record = record.map_err(InputError::from)?;
        // header is line 1
        let row = record.position().map(|p| p.line() as usize).unwrap_or(i + 2);
        let cell = |index: usize| record.get(index).map(str::trim).filter(|s| !s.is_empty());

        if let Some(required) = columns.required {
            if cell(required).is_none() {
                loaded.dropped += 1;
                continue;
            }
        }

        // blank is absent; anything else must parse
        let number =
            |index: usize, column: &str| -> std::result::Result<Option<Decimal>, InputError> {
                let Some(raw) = cell(index) else {
                    return Ok(None);
                };
                parse_decimal_cell(raw)
                    .map(Some)
                    .ok_or_else(|| InputError::InvalidNumber {
                        row,
                        column: column.to_string(),
                        value: raw.to_string(),
                    })
            };

        loaded.items.push(LineItem {
            product_code: cell(columns.product_code).map(str::to_string),
            quantity: number(columns.quantity, &config.quantity_column)?,
            value: number(columns.value, &config.value_column)?,
            annotation_text: record
                .get(columns.annotation)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string),
        });
    }

    debug!(
        rows = loaded.items.len(),
        dropped = loaded.dropped,
        "read line items"
    );

    Ok(loaded)
}

/// Parse a numeric cell written with `.` or `,` as decimal separator.
///
/// When both appear, the last one is the decimal separator and the other
/// groups thousands ("1.234,56" and "1,234.56" are both 1234.56). Whitespace
/// and a leading `R$` are ignored and an exponent (`1.5E+03`) is honored.
/// Any other character makes the cell unparseable.
pub fn parse_decimal_cell(s: &str) -> Option<Decimal> {
    let trimmed = s.trim();
    let body = trimmed.strip_prefix("R$").unwrap_or(trimmed);
    let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();

    let (mantissa, exponent) = match compact.find(['e', 'E']) {
        Some(pos) => (&compact[..pos], Some(&compact[pos + 1..])),
        None => (compact.as_str(), None),
    };

    let unsigned = mantissa.strip_prefix('-').unwrap_or(mantissa);
    if !unsigned.starts_with(|c: char| c.is_ascii_digit() || matches!(c, ',' | '.'))
        || !unsigned
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ',' | '.'))
    {
        return None;
    }

    let normalized = match (mantissa.rfind(','), mantissa.rfind('.')) {
        (Some(c), Some(d)) if c > d => mantissa.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => mantissa.replace(',', ""),
        (Some(_), None) => mantissa.replace(',', "."),
        _ => mantissa.to_string(),
    };

    match exponent {
        Some(exponent) => {
            let exponent = exponent.strip_prefix('+').unwrap_or(exponent);
            let digits = exponent.strip_prefix('-').unwrap_or(exponent);
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            Decimal::from_scientific(&format!("{normalized}e{exponent}")).ok()
        }
        None => Decimal::from_str(&normalized).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NfeError;
    use pretty_assertions::assert_eq;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    const SAMPLE: &str = "\
TECSCI,ns1:cProd,ns1:qCom,ns1:vProd,ns1:infCpl
X,123,10.0,55.30,\"123 NFE 42 blah, VR R$ 55.30 - 10.00 UN\"
,999,1,1,ignored
X,456,\"2,5\",\"1.234,56\",
";

    #[test]
    fn test_parse_decimal_cell() {
        assert_eq!(parse_decimal_cell("10.0"), Some(dec("10.0")));
        assert_eq!(parse_decimal_cell("2,5"), Some(dec("2.5")));
        assert_eq!(parse_decimal_cell("1.234,56"), Some(dec("1234.56")));
        assert_eq!(parse_decimal_cell("1,234.56"), Some(dec("1234.56")));
        assert_eq!(parse_decimal_cell("R$ 55,30"), Some(dec("55.30")));
        assert_eq!(parse_decimal_cell("1 234,56"), Some(dec("1234.56")));
        assert_eq!(parse_decimal_cell("-3,5"), Some(dec("-3.5")));
        assert_eq!(parse_decimal_cell(""), None);
        assert_eq!(parse_decimal_cell("abc"), None);
        assert_eq!(parse_decimal_cell("R$"), None);
    }

    #[test]
    fn test_parse_decimal_cell_rejects_stray_characters() {
        assert_eq!(parse_decimal_cell("abc12"), None);
        assert_eq!(parse_decimal_cell("12abc"), None);
        assert_eq!(parse_decimal_cell("12-3"), None);
        assert_eq!(parse_decimal_cell("US$ 10"), None);
        assert_eq!(parse_decimal_cell("1.2.3"), None);
    }

    #[test]
    fn test_parse_decimal_cell_exponent() {
        assert_eq!(parse_decimal_cell("1.5E+03"), Some(dec("1500")));
        assert_eq!(parse_decimal_cell("2,5e-1"), Some(dec("0.25")));
        assert_eq!(parse_decimal_cell("1e"), None);
        assert_eq!(parse_decimal_cell("1E+x"), None);
        assert_eq!(parse_decimal_cell("E3"), None);
    }

    #[test]
    fn test_read_sample() {
        let loaded = read_line_items(SAMPLE.as_bytes(), &InputConfig::default()).unwrap();

        assert_eq!(loaded.dropped, 1);
        assert_eq!(loaded.items.len(), 2);

        let first = &loaded.items[0];
        assert_eq!(first.product_code.as_deref(), Some("123"));
        assert_eq!(first.quantity, Some(dec("10.0")));
        assert_eq!(first.value, Some(dec("55.30")));
        assert_eq!(
            first.annotation_text.as_deref(),
            Some("123 NFE 42 blah, VR R$ 55.30 - 10.00 UN")
        );

        let second = &loaded.items[1];
        assert_eq!(second.quantity, Some(dec("2.5")));
        assert_eq!(second.value, Some(dec("1234.56")));
        assert_eq!(second.annotation_text, None);
    }

    #[test]
    fn test_bom_and_semicolons() {
        let data = "\u{feff}ns1:cProd;ns1:qCom;ns1:vProd;ns1:infCpl\n7;1;2;7 NFE 3\n";
        let config = InputConfig {
            delimiter: ';',
            required_column: None,
            ..InputConfig::default()
        };
        let loaded = read_line_items(data.as_bytes(), &config).unwrap();
        assert_eq!(loaded.items.len(), 1);
        assert_eq!(loaded.items[0].annotation_text.as_deref(), Some("7 NFE 3"));
    }

    #[test]
    fn test_missing_column() {
        let data = "ns1:cProd,ns1:qCom\n1,2\n";
        let err = read_line_items(data.as_bytes(), &InputConfig::default()).unwrap_err();
        assert!(matches!(err, NfeError::Input(InputError::MissingColumn(c)) if c == "ns1:vProd"));
    }

    #[test]
    fn test_blank_number_keeps_row() {
        let data = "\
TECSCI,ns1:cProd,ns1:qCom,ns1:vProd,ns1:infCpl
X,123,10,55.30,123 NFE 5
X,124,1,,124 NFE 6
X,125,,,
";
        let loaded = read_line_items(data.as_bytes(), &InputConfig::default()).unwrap();
        assert_eq!(loaded.items.len(), 3);

        assert_eq!(loaded.items[0].value, Some(dec("55.30")));
        assert_eq!(loaded.items[1].quantity, Some(dec("1")));
        assert_eq!(loaded.items[1].value, None);
        assert_eq!(loaded.items[2].quantity, None);
        assert_eq!(loaded.items[2].value, None);

        let result = crate::classify(loaded.items);
        let notes: Vec<_> = result
            .rows()
            .iter()
            .map(|r| r.identifier().map(|id| id.to_string()))
            .collect();
        assert_eq!(
            notes,
            vec![Some("000005".to_string()), Some("000006".to_string()), None]
        );
    }

    #[test]
    fn test_invalid_number_reports_row() {
        let data = "ns1:cProd,ns1:qCom,ns1:vProd,ns1:infCpl\n1,2,3,a\n1,x,3,b\n";
        let config = InputConfig {
            required_column: None,
            ..InputConfig::default()
        };
        let err = read_line_items(data.as_bytes(), &config).unwrap_err();
        match err {
            NfeError::Input(InputError::InvalidNumber { row, column, value }) => {
                assert_eq!(row, 3);
                assert_eq!(column, "ns1:qCom");
                assert_eq!(value, "x");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
