//! Mapping types produced by header matching.

use ois_model::CanonicalField;
use serde::{Deserialize, Serialize};

/// Address of one source column inside a workbook.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    /// Sheet index within the workbook.
    pub sheet: usize,
    /// Table region index within the sheet.
    pub table: usize,
    /// 0-based column index within the table.
    pub column: usize,
    /// Raw header text as it appeared in the sheet.
    pub header: String,
}

/// How a header was matched to a canonical field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    /// Exact normalized match against the synonym table.
    ExactSynonym,
    /// Substring overlap with a synonym.
    PartialSynonym,
    /// Edit-distance similarity.
    Fuzzy,
}

/// One ranked candidate column for a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternateCandidate {
    pub column: ColumnRef,
    pub confidence: f64,
    pub method: MatchMethod,
}

/// The accepted source for one canonical field, with its evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub field: CanonicalField,
    pub column: ColumnRef,
    /// Blended text/type confidence in [0, 1].
    pub confidence: f64,
    pub method: MatchMethod,
    /// Ranked candidates for this field (best first, at most five). The
    /// first entry mirrors the accepted column and the list doubles as the
    /// deterministic candidate set handed to reviewers.
    pub alternates: Vec<AlternateCandidate>,
}
