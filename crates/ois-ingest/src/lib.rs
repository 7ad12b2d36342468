//! Spreadsheet ingestion.
//!
//! Loads CSV and XLSX files into an in-memory [`Workbook`] grid of raw cell
//! text. No schema is assumed at this layer; header detection and typing
//! happen downstream in inference.

#![deny(unsafe_code)]

mod error;
mod grid;
mod load;

pub use error::{IngestError, Result};
pub use grid::{Sheet, Workbook};
pub use load::{load_csv, load_workbook, load_xlsx};
