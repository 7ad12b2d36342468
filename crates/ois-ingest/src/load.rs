//! File loading for CSV and XLSX sources.

use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::grid::{Sheet, Workbook};

/// Load a spreadsheet, dispatching on the file extension.
///
/// # Errors
///
/// Returns [`IngestError::UnsupportedExtension`] for unknown extensions,
/// [`IngestError::Blocked`] for files that exist but cannot be parsed, and
/// [`IngestError::Io`] for filesystem failures.
pub fn load_workbook(path: &Path) -> Result<Workbook> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let workbook = match extension.as_str() {
        "csv" | "tsv" => load_csv(path)?,
        "xlsx" | "xlsm" | "xls" | "ods" => load_xlsx(path)?,
        _ => {
            return Err(IngestError::UnsupportedExtension {
                path: path.to_path_buf(),
            });
        }
    };

    if workbook.is_empty() {
        return Err(IngestError::Blocked {
            path: path.to_path_buf(),
            reason: "file contains no data".to_string(),
        });
    }

    debug!(
        path = %path.display(),
        sheets = workbook.sheets.len(),
        "loaded workbook"
    );
    Ok(workbook)
}

/// Load a delimited text file as a single-sheet workbook.
pub fn load_csv(path: &Path) -> Result<Workbook> {
    let delimiter = if path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("tsv"))
    {
        b'\t'
    } else {
        b','
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|e| map_csv_error(path, "open", e))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| map_csv_error(path, "read", e))?;
        rows.push(record.iter().map(|c| c.trim().to_string()).collect());
    }

    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Sheet1")
        .to_string();
    Ok(Workbook::single(name, rows))
}

/// Load an Excel or OpenDocument workbook with all of its sheets.
pub fn load_xlsx(path: &Path) -> Result<Workbook> {
    let mut workbook = open_workbook_auto(path).map_err(|e| IngestError::Blocked {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut sheets = Vec::new();
    for (name, range) in workbook.worksheets() {
        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect())
            .collect();
        sheets.push(Sheet::new(name, rows));
    }

    Ok(Workbook::new(sheets))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => format_number(*f),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => format_number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

/// Render a float without a spurious trailing fraction.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn map_csv_error(path: &Path, operation: &'static str, error: csv::Error) -> IngestError {
    if error.is_io_error() {
        match error.into_kind() {
            csv::ErrorKind::Io(source) => IngestError::Io {
                operation,
                path: path.to_path_buf(),
                source,
            },
            other => IngestError::Blocked {
                path: path.to_path_buf(),
                reason: format!("{other:?}"),
            },
        }
    } else {
        IngestError::Blocked {
            path: path.to_path_buf(),
            reason: error.to_string(),
        }
    }
}
