//! Column type profiling.
//!
//! Classifies a column by majority share over a bounded sample of its
//! non-empty cells. Numeric and currency cells never count toward the text
//! share, so the shares partition the sample.

use ois_model::ColumnType;
use serde::{Deserialize, Serialize};

use crate::config::InferConfig;

/// Inferred type of one source column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnTypeProfile {
    pub detected: ColumnType,
    /// Majority share backing the detection, in [0, 1].
    pub confidence: f64,
    /// Sampled non-empty values (bounded).
    pub samples: Vec<String>,
    /// Non-empty cells seen in the column.
    pub non_empty: usize,
}

impl ColumnTypeProfile {
    /// Profile of a column with no data at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            detected: ColumnType::Empty,
            confidence: 1.0,
            samples: Vec::new(),
            non_empty: 0,
        }
    }
}

/// Profile one column from its cell text.
///
/// Samples up to `config.type_sample_size` non-empty cells and classifies
/// by majority share: numeric, then currency, then plain text, then date,
/// falling back to mixed. Confidence is the winning share.
#[must_use]
pub fn profile_column<'a, I>(cells: I, config: &InferConfig) -> ColumnTypeProfile
where
    I: IntoIterator<Item = &'a str>,
{
    let samples: Vec<String> = cells
        .into_iter()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .take(config.type_sample_size)
        .map(str::to_string)
        .collect();

    if samples.is_empty() {
        return ColumnTypeProfile::empty();
    }

    let total = samples.len() as f64;
    let mut integers = 0usize;
    let mut decimals = 0usize;
    let mut currency = 0usize;
    let mut dates = 0usize;
    let mut text = 0usize;

    for cell in &samples {
        if let Some(value) = parse_plain_number(cell) {
            if value.fract() == 0.0 {
                integers += 1;
            } else {
                decimals += 1;
            }
        } else if config.is_currency(cell) {
            currency += 1;
        } else if config.is_date_like(cell) {
            dates += 1;
        } else {
            text += 1;
        }
    }

    let numeric_share = (integers + decimals) as f64 / total;
    let currency_share = currency as f64 / total;
    let date_share = dates as f64 / total;
    let text_share = text as f64 / total;

    let (detected, confidence) = if numeric_share >= config.numeric_share {
        let detected = if decimals == 0 {
            ColumnType::Integer
        } else {
            ColumnType::Decimal
        };
        (detected, numeric_share)
    } else if currency_share >= config.currency_share {
        (ColumnType::Currency, currency_share)
    } else if text_share >= config.text_share {
        (ColumnType::Text, text_share)
    } else if date_share >= config.date_share {
        (ColumnType::Date, date_share)
    } else {
        let max_share = numeric_share
            .max(currency_share)
            .max(date_share)
            .max(text_share);
        (ColumnType::Mixed, max_share)
    };

    let non_empty = samples.len();
    ColumnTypeProfile {
        detected,
        confidence,
        samples,
        non_empty,
    }
}

/// Parse a bare number, tolerating thousands separators.
fn parse_plain_number(cell: &str) -> Option<f64> {
    let compact = cell.replace(',', "");
    // A comma-only cell must not become an empty parse target.
    if compact.is_empty() {
        return None;
    }
    compact.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(values: &[&str]) -> ColumnTypeProfile {
        profile_column(values.iter().copied(), &InferConfig::default())
    }

    #[test]
    fn integer_column() {
        let p = profile(&["1", "2", "30", "4"]);
        assert_eq!(p.detected, ColumnType::Integer);
        assert_eq!(p.confidence, 1.0);
    }

    #[test]
    fn decimal_column() {
        let p = profile(&["1.5", "2", "3.25"]);
        assert_eq!(p.detected, ColumnType::Decimal);
    }

    #[test]
    fn currency_column() {
        let p = profile(&["$10.00", "$2.50", "1,200.00 USD", "n/a"]);
        assert_eq!(p.detected, ColumnType::Currency);
        assert!(p.confidence >= 0.5);
    }

    #[test]
    fn text_column() {
        let p = profile(&["Acme Ltd", "Beta GmbH", "Gamma Inc"]);
        assert_eq!(p.detected, ColumnType::Text);
    }

    #[test]
    fn date_column() {
        let p = profile(&["2026-01-02", "2026-01-03", "2026-02-01"]);
        assert_eq!(p.detected, ColumnType::Date);
    }

    #[test]
    fn mixed_column_reports_majority_share() {
        let p = profile(&["1", "two", "3", "four"]);
        assert_eq!(p.detected, ColumnType::Mixed);
        assert_eq!(p.confidence, 0.5);
    }

    #[test]
    fn empty_column_is_certain() {
        let p = profile(&["", "  ", ""]);
        assert_eq!(p.detected, ColumnType::Empty);
        assert_eq!(p.confidence, 1.0);
    }

    #[test]
    fn sampling_is_bounded() {
        let values: Vec<String> = (0..500).map(|i| i.to_string()).collect();
        let refs: Vec<&str> = values.iter().map(String::as_str).collect();
        let p = profile_column(refs.iter().copied(), &InferConfig::default());
        assert_eq!(p.samples.len(), 50);
        assert_eq!(p.detected, ColumnType::Integer);
    }
}
