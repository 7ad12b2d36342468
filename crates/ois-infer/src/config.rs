//! Inference configuration.
//!
//! Synonym dictionaries and regex caches are constructed configuration
//! objects injected into the matcher and profiler, never module globals.
//! Every tunable threshold is a named field with its deployment default.

use std::collections::BTreeMap;

use ois_model::CanonicalField;
use regex::Regex;

use crate::normalize::normalize_header;

/// Synonym dictionary mapping each canonical field to normalized header
/// spellings seen in the wild.
#[derive(Debug, Clone)]
pub struct SynonymTable {
    entries: BTreeMap<CanonicalField, Vec<String>>,
}

impl SynonymTable {
    /// Build a table from raw synonym lists; entries are normalized on the
    /// way in so lookups compare like with like.
    #[must_use]
    pub fn new(raw: BTreeMap<CanonicalField, Vec<String>>) -> Self {
        let entries = raw
            .into_iter()
            .map(|(field, synonyms)| {
                (
                    field,
                    synonyms.iter().map(|s| normalize_header(s)).collect(),
                )
            })
            .collect();
        Self { entries }
    }

    /// Synonyms for one field; empty slice when the field has none.
    #[must_use]
    pub fn for_field(&self, field: CanonicalField) -> &[String] {
        self.entries.get(&field).map_or(&[], Vec::as_slice)
    }
}

impl Default for SynonymTable {
    fn default() -> Self {
        let mut raw = BTreeMap::new();
        raw.insert(
            CanonicalField::Quantity,
            str_vec(&[
                "quantity",
                "qty",
                "qty ordered",
                "order qty",
                "quantity ordered",
                "units",
                "pcs",
                "pieces",
                "no of units",
            ]),
        );
        raw.insert(
            CanonicalField::Sku,
            str_vec(&[
                "sku",
                "item code",
                "item no",
                "item number",
                "product code",
                "article",
                "article number",
                "part number",
                "part no",
                "item id",
                "product id",
            ]),
        );
        raw.insert(
            CanonicalField::Description,
            str_vec(&[
                "description",
                "item description",
                "product description",
                "item name",
                "product name",
                "product",
                "details",
            ]),
        );
        raw.insert(
            CanonicalField::UnitPrice,
            str_vec(&[
                "unit price",
                "price",
                "price per unit",
                "unit cost",
                "rate",
                "price each",
                "unit rate",
            ]),
        );
        raw.insert(
            CanonicalField::Customer,
            str_vec(&[
                "customer",
                "customer name",
                "client",
                "client name",
                "account",
                "account name",
                "company",
                "buyer",
                "sold to",
            ]),
        );
        raw.insert(
            CanonicalField::LineTotal,
            str_vec(&[
                "line total",
                "total",
                "amount",
                "total price",
                "extended price",
                "line amount",
                "subtotal",
                "net amount",
                "total amount",
            ]),
        );
        raw.insert(
            CanonicalField::OrderDate,
            str_vec(&[
                "order date",
                "date",
                "delivery date",
                "po date",
                "document date",
            ]),
        );
        Self::new(raw)
    }
}

fn str_vec(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Tunables for matching, profiling, and scoring.
#[derive(Debug, Clone)]
pub struct InferConfig {
    pub synonyms: SynonymTable,

    /// Minimum blended score for a field mapping to be emitted.
    pub accept_threshold: f64,
    /// Weight of the text tier in the blended score.
    pub text_weight: f64,
    /// Weight of type compatibility in the blended score.
    pub type_weight: f64,
    /// Type score granted when the detected column type is mixed.
    pub mixed_type_score: f64,
    /// Ranked candidates retained per field.
    pub max_alternates: usize,

    /// Non-empty cells sampled per column during type detection.
    pub type_sample_size: usize,
    /// Share of numeric cells required to call a column numeric.
    pub numeric_share: f64,
    /// Share of currency cells required to call a column currency.
    pub currency_share: f64,
    /// Share of plain-text cells required to call a column text.
    pub text_share: f64,
    /// Share of date cells required to call a column date.
    pub date_share: f64,

    /// Document confidence at or above which the band is high.
    pub high_band: f64,
    /// Document confidence at or above which the band is medium.
    pub medium_band: f64,
    /// Multiplier applied when enough important fields are mapped.
    pub important_boost: f64,
    /// Important fields needed to earn the boost.
    pub boost_min_important: usize,
    /// Multiplier applied when the required field is unmapped.
    pub missing_required_penalty: f64,

    /// Rows at the top of a table region tried as the header row.
    pub max_header_scan: usize,

    currency_pattern: Regex,
    date_patterns: Vec<Regex>,
}

impl Default for InferConfig {
    fn default() -> Self {
        Self {
            synonyms: SynonymTable::default(),
            accept_threshold: 0.6,
            text_weight: 0.7,
            type_weight: 0.3,
            mixed_type_score: 0.6,
            max_alternates: 5,
            type_sample_size: 50,
            numeric_share: 0.8,
            currency_share: 0.5,
            text_share: 0.7,
            date_share: 0.7,
            high_band: 0.80,
            medium_band: 0.60,
            important_boost: 1.1,
            boost_min_important: 3,
            missing_required_penalty: 0.5,
            max_header_scan: 3,
            currency_pattern: Regex::new(
                r"^[-+]?\s*[$€£¥]\s*\d[\d,]*(\.\d+)?$|^[-+]?\d[\d,]*(\.\d+)?\s*(USD|EUR|GBP|[$€£¥])$",
            )
            .expect("currency pattern compiles"),
            date_patterns: vec![
                Regex::new(r"^\d{4}-\d{1,2}-\d{1,2}([T ].*)?$").expect("iso date pattern"),
                Regex::new(r"^\d{1,2}[/.]\d{1,2}[/.]\d{2,4}$").expect("numeric date pattern"),
                Regex::new(r"^\d{1,2}\s+[A-Za-z]{3,9}\.?\s+\d{2,4}$").expect("dmy date pattern"),
                Regex::new(r"^[A-Za-z]{3,9}\.?\s+\d{1,2},?\s+\d{2,4}$").expect("mdy date pattern"),
            ],
        }
    }
}

impl InferConfig {
    /// True when the cell text is a currency-formatted amount.
    #[must_use]
    pub fn is_currency(&self, cell: &str) -> bool {
        self.currency_pattern.is_match(cell.trim())
    }

    /// True when the cell text looks like a date.
    #[must_use]
    pub fn is_date_like(&self, cell: &str) -> bool {
        let trimmed = cell.trim();
        self.date_patterns.iter().any(|p| p.is_match(trimmed))
    }
}
