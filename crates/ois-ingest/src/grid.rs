//! Workbook grid types.

use serde::{Deserialize, Serialize};

/// One sheet of raw cell text. An empty string is an empty cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    /// Row-major cell text. Rows may have ragged widths.
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    #[must_use]
    pub fn new(name: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Widest row in the sheet.
    #[must_use]
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Cell text at (row, col); empty string when out of range.
    #[must_use]
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map_or("", String::as_str)
    }

    /// True when every cell in the row is blank.
    #[must_use]
    pub fn row_is_empty(&self, row: usize) -> bool {
        self.rows
            .get(row)
            .is_none_or(|r| r.iter().all(|c| c.trim().is_empty()))
    }
}

/// A parsed spreadsheet: one or more sheets of raw cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    #[must_use]
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    /// Convenience constructor for a single-sheet workbook, used heavily in
    /// tests and by CSV loading.
    #[must_use]
    pub fn single(name: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            sheets: vec![Sheet::new(name, rows)],
        }
    }

    /// True when no sheet contains a non-blank cell.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sheets
            .iter()
            .all(|s| (0..s.rows.len()).all(|r| s.row_is_empty(r)))
    }
}
