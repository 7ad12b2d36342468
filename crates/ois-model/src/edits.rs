//! User edits: corrections and disambiguation selections.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::order::CanonicalOrder;

/// One user edit to an extracted order field.
///
/// `field_path` addresses a single value, e.g. `customer.name`,
/// `meta.order_number`, or `lines[2].quantity` (0-based index).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    pub field_path: String,
    pub original: Option<String>,
    pub corrected: String,
    pub actor: String,
    pub at: DateTime<Utc>,
}

/// A disambiguation choice made by a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Chosen ledger customer id, when the customer was ambiguous.
    pub customer_external_id: Option<String>,
    /// Chosen ledger item id per line number.
    pub line_items: BTreeMap<usize, String>,
}

/// Failure to apply a correction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CorrectionError {
    #[error("Unknown field path: {0}")]
    UnknownPath(String),
    #[error("Line index {index} is out of range (order has {len} lines)")]
    LineOutOfRange { index: usize, len: usize },
    #[error("Value '{value}' is not a number for path {path}")]
    NotANumber { path: String, value: String },
}

impl CanonicalOrder {
    /// Apply one correction, bumping the order version.
    ///
    /// # Errors
    ///
    /// Fails on unknown paths, out-of-range line indexes, and non-numeric
    /// values for numeric fields. The order is unchanged on error.
    pub fn apply_correction(&mut self, correction: &Correction) -> Result<(), CorrectionError> {
        let path = correction.field_path.as_str();
        let value = correction.corrected.as_str();

        match path {
            "customer.name" => self.customer.name = non_empty(value),
            "customer.external_id" => self.customer.external_id = non_empty(value),
            "meta.order_number" => self.meta.order_number = non_empty(value),
            "meta.order_date" => self.meta.order_date = non_empty(value),
            _ => self.apply_line_correction(path, value)?,
        }

        self.version += 1;
        Ok(())
    }

    fn apply_line_correction(&mut self, path: &str, value: &str) -> Result<(), CorrectionError> {
        let (index, field) =
            parse_line_path(path).ok_or_else(|| CorrectionError::UnknownPath(path.to_string()))?;
        let len = self.lines.len();
        let line = self
            .lines
            .get_mut(index)
            .ok_or(CorrectionError::LineOutOfRange { index, len })?;

        match field {
            "quantity" => line.quantity = parse_number(path, value)?,
            "unit_price" => line.unit_price = Some(parse_number(path, value)?),
            "line_total" => line.line_total = Some(parse_number(path, value)?),
            "sku" => line.sku = non_empty(value),
            "gtin" => line.gtin = non_empty(value),
            "description" => line.description = non_empty(value),
            _ => return Err(CorrectionError::UnknownPath(path.to_string())),
        }
        Ok(())
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_number(path: &str, value: &str) -> Result<f64, CorrectionError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| CorrectionError::NotANumber {
            path: path.to_string(),
            value: value.to_string(),
        })
}

/// Split `lines[i].field` into its index and field name.
fn parse_line_path(path: &str) -> Option<(usize, &str)> {
    let rest = path.strip_prefix("lines[")?;
    let close = rest.find(']')?;
    let index: usize = rest[..close].parse().ok()?;
    let field = rest[close + 1..].strip_prefix('.')?;
    Some((index, field))
}
