//! Order extraction from an inferred table.

use tracing::debug;

use ois_ingest::Workbook;
use ois_model::{CanonicalField, CanonicalOrder, CustomerInfo, LineItem, OrderMeta};

use crate::coordinator::SchemaInference;
use crate::types::FieldMapping;

/// Extract a canonical order from the table selected by inference.
///
/// Rows that are entirely blank across the mapped columns are skipped;
/// line numbers count the rows actually extracted.
#[must_use]
pub fn extract_order(workbook: &Workbook, inference: &SchemaInference) -> CanonicalOrder {
    let sheet = &workbook.sheets[inference.sheet];
    let find = |field: CanonicalField| -> Option<&FieldMapping> {
        inference.mappings.iter().find(|m| m.field == field)
    };

    let sku_col = find(CanonicalField::Sku);
    let description_col = find(CanonicalField::Description);
    let quantity_col = find(CanonicalField::Quantity);
    let unit_price_col = find(CanonicalField::UnitPrice);
    let line_total_col = find(CanonicalField::LineTotal);
    let customer_col = find(CanonicalField::Customer);
    let order_date_col = find(CanonicalField::OrderDate);

    let mut lines = Vec::new();
    let mut customer_name: Option<String> = None;
    let mut order_date: Option<String> = None;

    for row in inference.table.data_start..inference.table.data_end {
        let cell = |mapping: Option<&FieldMapping>| -> Option<String> {
            let m = mapping?;
            let text = sheet.cell(row, m.column.column).trim();
            if text.is_empty() {
                None
            } else {
                Some(text.to_string())
            }
        };

        let sku = cell(sku_col);
        let description = cell(description_col);
        let quantity = cell(quantity_col).and_then(|c| parse_amount(&c));
        let unit_price = cell(unit_price_col).and_then(|c| parse_amount(&c));
        let line_total = cell(line_total_col).and_then(|c| parse_amount(&c));

        if customer_name.is_none() {
            customer_name = cell(customer_col);
        }
        if order_date.is_none() {
            order_date = cell(order_date_col);
        }

        if sku.is_none()
            && description.is_none()
            && quantity.is_none()
            && unit_price.is_none()
            && line_total.is_none()
        {
            continue;
        }

        lines.push(LineItem {
            line_number: lines.len() + 1,
            description,
            quantity: quantity.unwrap_or(0.0),
            unit_price,
            line_total,
            sku,
            gtin: None,
        });
    }

    debug!(lines = lines.len(), "order extracted");
    CanonicalOrder {
        customer: CustomerInfo {
            name: customer_name,
            external_id: None,
        },
        lines,
        meta: OrderMeta {
            order_number: None,
            order_date,
            source_file: None,
        },
        version: 0,
    }
}

/// Parse a numeric cell, tolerating currency symbols and separators.
fn parse_amount(cell: &str) -> Option<f64> {
    let cleaned: String = cell
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-' || *c == '+')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InferConfig;
    use crate::coordinator::infer_schema;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|r| r.iter().map(|c| (*c).to_string()).collect())
            .collect()
    }

    #[test]
    fn extracts_lines_and_customer() {
        let workbook = Workbook::single(
            "Orders",
            rows(&[
                &["Item Code", "Qty", "Unit Price", "Line Total", "Customer"],
                &["SKU-1", "2", "$10.00", "$20.00", "Acme Ltd"],
                &["SKU-2", "1", "$4.50", "$4.50", ""],
                &["", "", "", "", ""],
            ]),
        );
        let inference = infer_schema(&workbook, &InferConfig::default()).unwrap();
        let order = extract_order(&workbook, &inference);

        assert_eq!(order.lines.len(), 2);
        assert_eq!(order.customer.name.as_deref(), Some("Acme Ltd"));
        let first = &order.lines[0];
        assert_eq!(first.sku.as_deref(), Some("SKU-1"));
        assert_eq!(first.quantity, 2.0);
        assert_eq!(first.unit_price, Some(10.0));
        assert_eq!(first.line_total, Some(20.0));
    }

    #[test]
    fn currency_symbols_are_tolerated() {
        assert_eq!(parse_amount("$1,234.56"), Some(1234.56));
        assert_eq!(parse_amount("€4.50"), Some(4.5));
        assert_eq!(parse_amount("-3"), Some(-3.0));
        assert_eq!(parse_amount("n/a"), None);
    }
}
