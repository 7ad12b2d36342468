//! Schema inference coordination.
//!
//! Scans every sheet of a workbook for table regions, tries candidate
//! header rows, and keeps the (sheet, table, header row) combination with
//! the best document confidence. Ties resolve to the earlier sheet, then
//! the earlier table, then the earlier row, so inference is deterministic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use ois_ingest::{Sheet, Workbook};

use crate::config::InferConfig;
use crate::engine::match_headers;
use crate::profile::{ColumnTypeProfile, profile_column};
use crate::score::{DocumentScore, document_confidence};
use crate::types::{ColumnRef, FieldMapping};

/// A contiguous block of non-empty rows within a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRegion {
    /// Table index within the sheet.
    pub index: usize,
    /// Row index of the selected header row.
    pub header_row: usize,
    /// First data row (inclusive).
    pub data_start: usize,
    /// Last data row (exclusive).
    pub data_end: usize,
}

impl TableRegion {
    /// Number of data rows under the header.
    #[must_use]
    pub fn data_rows(&self) -> usize {
        self.data_end.saturating_sub(self.data_start)
    }
}

/// The selected mapping for one workbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaInference {
    pub sheet: usize,
    pub sheet_name: String,
    pub table: TableRegion,
    pub mappings: Vec<FieldMapping>,
    /// Type profiles per mapped column index.
    pub profiles: BTreeMap<usize, ColumnTypeProfile>,
    pub score: DocumentScore,
}

/// Inference failure.
#[derive(Debug, Error)]
pub enum InferError {
    /// No sheet contained a table whose headers map onto the catalog.
    #[error("No usable table found in any sheet")]
    NoUsableTable,
}

/// Infer the schema of a workbook.
///
/// # Errors
///
/// [`InferError::NoUsableTable`] when no candidate table produces a single
/// field mapping. Callers treat this as a blocked file, not a fault.
pub fn infer_schema(workbook: &Workbook, config: &InferConfig) -> Result<SchemaInference, InferError> {
    let mut best: Option<SchemaInference> = None;

    for (sheet_index, sheet) in workbook.sheets.iter().enumerate() {
        for region in find_regions(sheet) {
            for candidate in candidate_inferences(sheet_index, sheet, region, config) {
                let better = match &best {
                    None => true,
                    Some(current) => candidate.score.value > current.score.value,
                };
                if better {
                    best = Some(candidate);
                }
            }
        }
    }

    let inference = best.ok_or(InferError::NoUsableTable)?;
    debug!(
        sheet = inference.sheet_name,
        header_row = inference.table.header_row,
        fields = inference.mappings.len(),
        confidence = inference.score.value,
        "schema inferred"
    );
    Ok(inference)
}

/// Contiguous non-empty row blocks of a sheet, in order.
fn find_regions(sheet: &Sheet) -> Vec<(usize, usize, usize)> {
    let mut regions = Vec::new();
    let mut row = 0;
    let total = sheet.rows.len();
    let mut index = 0;

    while row < total {
        while row < total && sheet.row_is_empty(row) {
            row += 1;
        }
        if row >= total {
            break;
        }
        let start = row;
        while row < total && !sheet.row_is_empty(row) {
            row += 1;
        }
        regions.push((index, start, row));
        index += 1;
    }

    regions
}

/// Try each candidate header row at the top of a region.
fn candidate_inferences(
    sheet_index: usize,
    sheet: &Sheet,
    (table_index, start, end): (usize, usize, usize),
    config: &InferConfig,
) -> Vec<SchemaInference> {
    let mut results = Vec::new();
    let last_header = (start + config.max_header_scan).min(end);

    for header_row in start..last_header {
        let data_start = header_row + 1;
        if data_start >= end {
            continue;
        }

        let width = (header_row..end)
            .filter_map(|r| sheet.rows.get(r).map(Vec::len))
            .max()
            .unwrap_or(0);

        let mut columns = Vec::new();
        let mut profiles = Vec::new();
        for col in 0..width {
            let header = sheet.cell(header_row, col).trim();
            if header.is_empty() {
                continue;
            }
            let cells = (data_start..end).map(|r| sheet.cell(r, col));
            columns.push(ColumnRef {
                sheet: sheet_index,
                table: table_index,
                column: col,
                header: header.to_string(),
            });
            profiles.push(profile_column(cells, config));
        }
        if columns.is_empty() {
            continue;
        }

        let mappings = match_headers(&columns, &profiles, config);
        if mappings.is_empty() {
            continue;
        }
        let score = document_confidence(&mappings, config);

        let profile_map: BTreeMap<usize, ColumnTypeProfile> = columns
            .iter()
            .zip(profiles)
            .map(|(c, p)| (c.column, p))
            .collect();

        results.push(SchemaInference {
            sheet: sheet_index,
            sheet_name: sheet.name.clone(),
            table: TableRegion {
                index: table_index,
                header_row,
                data_start,
                data_end: end,
            },
            mappings,
            profiles: profile_map,
            score,
        });
    }

    results
}
