//! The canonical field catalog.
//!
//! Every extraction targets this fixed set of fields. Scoring weights and
//! allowed column types live here so the matcher and scorer never carry
//! their own copies.

use serde::{Deserialize, Serialize};

/// A canonical order field that a spreadsheet column can map onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    /// Ordered quantity. The only required field.
    Quantity,
    /// Stock keeping unit / item code.
    Sku,
    /// Free-text item description.
    Description,
    /// Price per unit.
    UnitPrice,
    /// Customer name or reference.
    Customer,
    /// Extended line total (quantity x unit price).
    LineTotal,
    /// Order date.
    OrderDate,
}

/// Weight class of a canonical field for document-level scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldClass {
    Required,
    Important,
    Optional,
}

/// Detected type of a spreadsheet column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Decimal,
    Currency,
    Text,
    Date,
    Mixed,
    Empty,
}

impl CanonicalField {
    /// All catalog fields in scoring order.
    pub const ALL: [CanonicalField; 7] = [
        CanonicalField::Quantity,
        CanonicalField::Sku,
        CanonicalField::Description,
        CanonicalField::UnitPrice,
        CanonicalField::Customer,
        CanonicalField::LineTotal,
        CanonicalField::OrderDate,
    ];

    /// Fields that must all come from one table when the committee accepts
    /// a mapping.
    pub const SAME_TABLE_SET: [CanonicalField; 4] = [
        CanonicalField::Sku,
        CanonicalField::Quantity,
        CanonicalField::UnitPrice,
        CanonicalField::LineTotal,
    ];

    /// Stable key used in configs, field paths, and logs.
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Self::Quantity => "quantity",
            Self::Sku => "sku",
            Self::Description => "description",
            Self::UnitPrice => "unit_price",
            Self::Customer => "customer",
            Self::LineTotal => "line_total",
            Self::OrderDate => "order_date",
        }
    }

    /// Parse a field from its stable key.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.key() == key)
    }

    #[must_use]
    pub fn class(&self) -> FieldClass {
        match self {
            Self::Quantity => FieldClass::Required,
            Self::Sku | Self::Description | Self::UnitPrice | Self::Customer => {
                FieldClass::Important
            }
            Self::LineTotal | Self::OrderDate => FieldClass::Optional,
        }
    }

    /// Weight of this field in the document confidence sum.
    #[must_use]
    pub fn weight(&self) -> f64 {
        match self.class() {
            FieldClass::Required => 0.40,
            FieldClass::Important => 0.15,
            FieldClass::Optional => 0.075,
        }
    }

    /// Column types compatible with this field.
    ///
    /// A detected type in this set scores full type compatibility; `Mixed`
    /// scores partial compatibility for every field.
    #[must_use]
    pub fn allowed_types(&self) -> &'static [ColumnType] {
        match self {
            Self::Quantity => &[ColumnType::Integer, ColumnType::Decimal],
            Self::Sku => &[ColumnType::Text, ColumnType::Mixed],
            Self::Description | Self::Customer => &[ColumnType::Text],
            Self::UnitPrice | Self::LineTotal => {
                &[ColumnType::Currency, ColumnType::Decimal, ColumnType::Integer]
            }
            Self::OrderDate => &[ColumnType::Date],
        }
    }
}

impl std::fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_round_trips() {
        for field in CanonicalField::ALL {
            assert_eq!(CanonicalField::from_key(field.key()), Some(field));
        }
    }

    #[test]
    fn weights_match_classes() {
        assert_eq!(CanonicalField::Quantity.weight(), 0.40);
        assert_eq!(CanonicalField::Sku.weight(), 0.15);
        assert_eq!(CanonicalField::LineTotal.weight(), 0.075);
    }

    #[test]
    fn exactly_one_required_field() {
        let required: Vec<_> = CanonicalField::ALL
            .iter()
            .filter(|f| f.class() == FieldClass::Required)
            .collect();
        assert_eq!(required.len(), 1);
    }
}
