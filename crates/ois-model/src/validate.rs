//! Order validation.
//!
//! Each issue variant carries only its own data; severity decides whether a
//! case stops, routes to review, or merely warns.

use serde::{Deserialize, Serialize};

use crate::order::CanonicalOrder;

/// How an issue affects case progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    /// Malformed data; the case cannot proceed until corrected.
    Blocking,
    /// Requires explicit user confirmation before the case proceeds.
    Confirm,
    /// Informational; does not stop the case.
    Warning,
}

/// A validation finding on an extracted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum OrderIssue {
    /// Quantity below zero is never valid.
    NegativeQuantity { line_number: usize, quantity: f64 },
    /// Zero quantities are accepted only after explicit confirmation.
    ZeroQuantity { line_number: usize },
    /// No line items were extracted.
    EmptyOrder,
    /// A line carries neither a SKU nor a description to resolve against.
    UnidentifiableLine { line_number: usize },
    /// No customer reference was extracted.
    MissingCustomer,
}

impl OrderIssue {
    #[must_use]
    pub fn severity(&self) -> IssueSeverity {
        match self {
            Self::NegativeQuantity { .. } | Self::EmptyOrder => IssueSeverity::Blocking,
            Self::ZeroQuantity { .. } | Self::MissingCustomer => IssueSeverity::Confirm,
            Self::UnidentifiableLine { .. } => IssueSeverity::Warning,
        }
    }

    /// User-facing message.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::NegativeQuantity {
                line_number,
                quantity,
            } => {
                format!("Line {line_number} has a negative quantity ({quantity})")
            }
            Self::ZeroQuantity { line_number } => {
                format!("Line {line_number} has a quantity of zero and needs confirmation")
            }
            Self::EmptyOrder => "No order lines could be extracted".to_string(),
            Self::UnidentifiableLine { line_number } => {
                format!("Line {line_number} has no SKU or description")
            }
            Self::MissingCustomer => "No customer reference was found".to_string(),
        }
    }
}

/// Validate an extracted order.
///
/// Returns every finding; callers decide progression from the worst
/// severity present.
#[must_use]
pub fn validate_order(order: &CanonicalOrder) -> Vec<OrderIssue> {
    let mut issues = Vec::new();

    if order.lines.is_empty() {
        issues.push(OrderIssue::EmptyOrder);
    }

    for line in &order.lines {
        if line.quantity < 0.0 {
            issues.push(OrderIssue::NegativeQuantity {
                line_number: line.line_number,
                quantity: line.quantity,
            });
        } else if line.quantity == 0.0 {
            issues.push(OrderIssue::ZeroQuantity {
                line_number: line.line_number,
            });
        }
        if line.sku.is_none() && line.description.is_none() {
            issues.push(OrderIssue::UnidentifiableLine {
                line_number: line.line_number,
            });
        }
    }

    if order.customer.name.is_none() && order.customer.external_id.is_none() {
        issues.push(OrderIssue::MissingCustomer);
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{CustomerInfo, LineItem};

    fn order_with_lines(lines: Vec<LineItem>) -> CanonicalOrder {
        CanonicalOrder {
            customer: CustomerInfo {
                name: Some("Acme Ltd".into()),
                external_id: None,
            },
            lines,
            ..CanonicalOrder::default()
        }
    }

    #[test]
    fn negative_quantity_is_blocking() {
        let order = order_with_lines(vec![LineItem {
            sku: Some("X".into()),
            ..LineItem::new(1, -2.0)
        }]);
        let issues = validate_order(&order);
        assert!(
            issues
                .iter()
                .any(|i| i.severity() == IssueSeverity::Blocking)
        );
    }

    #[test]
    fn zero_quantity_requires_confirmation() {
        let order = order_with_lines(vec![LineItem {
            sku: Some("X".into()),
            ..LineItem::new(1, 0.0)
        }]);
        let issues = validate_order(&order);
        assert_eq!(
            issues,
            vec![OrderIssue::ZeroQuantity { line_number: 1 }],
        );
        assert_eq!(issues[0].severity(), IssueSeverity::Confirm);
    }

    #[test]
    fn clean_order_has_no_issues() {
        let order = order_with_lines(vec![LineItem {
            sku: Some("SKU-1".into()),
            unit_price: Some(10.0),
            ..LineItem::new(1, 2.0)
        }]);
        assert!(validate_order(&order).is_empty());
    }

    #[test]
    fn empty_order_is_blocking() {
        let order = order_with_lines(Vec::new());
        assert!(issues_contain_blocking(&validate_order(&order)));
    }

    fn issues_contain_blocking(issues: &[OrderIssue]) -> bool {
        issues
            .iter()
            .any(|i| i.severity() == IssueSeverity::Blocking)
    }
}
