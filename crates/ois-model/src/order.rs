//! Extracted order types.

use serde::{Deserialize, Serialize};

/// One order line extracted from a spreadsheet row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// 1-based position within the source table.
    pub line_number: usize,
    pub description: Option<String>,
    pub quantity: f64,
    pub unit_price: Option<f64>,
    pub line_total: Option<f64>,
    pub sku: Option<String>,
    pub gtin: Option<String>,
}

impl LineItem {
    /// A minimal line with only a position and quantity.
    #[must_use]
    pub fn new(line_number: usize, quantity: f64) -> Self {
        Self {
            line_number,
            description: None,
            quantity,
            unit_price: None,
            line_total: None,
            sku: None,
            gtin: None,
        }
    }
}

/// Customer information extracted from the sheet or corrected by a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    /// Name as it appeared in the source data.
    pub name: Option<String>,
    /// Ledger customer id once resolved or selected.
    pub external_id: Option<String>,
}

/// Order-level metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderMeta {
    pub order_number: Option<String>,
    /// Raw order date text; left unparsed until draft creation.
    pub order_date: Option<String>,
    pub source_file: Option<String>,
}

/// The structured representation of one spreadsheet's order.
///
/// `version` counts mutations (corrections, selections); every prior version
/// remains reconstructable from the case event log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalOrder {
    pub customer: CustomerInfo,
    pub lines: Vec<LineItem>,
    pub meta: OrderMeta,
    pub version: u32,
}

impl CanonicalOrder {
    /// Deterministic signature over the line items, used in the duplicate
    /// fingerprint. Independent of extraction provenance and versioning.
    #[must_use]
    pub fn line_signature(&self) -> String {
        let mut parts: Vec<String> = self
            .lines
            .iter()
            .map(|line| {
                format!(
                    "{}|{}|{}",
                    line.sku.as_deref().unwrap_or(""),
                    line.quantity,
                    line.unit_price.map(|p| p.to_string()).unwrap_or_default(),
                )
            })
            .collect();
        parts.sort();
        parts.join(";")
    }
}
