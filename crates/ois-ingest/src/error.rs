//! Ingestion error types.

use std::path::PathBuf;

use thiserror::Error;

/// Ingestion failure.
#[derive(Debug, Error)]
pub enum IngestError {
    /// File I/O failure.
    #[error("Failed to {operation} file: {path}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file extension is not one we can parse.
    #[error("Unsupported file type: {path}")]
    UnsupportedExtension { path: PathBuf },

    /// The file exists but cannot be parsed deterministically.
    ///
    /// Blocked files are not failures; they route the case back to
    /// re-upload.
    #[error("File cannot be parsed: {path} ({reason})")]
    Blocked { path: PathBuf, reason: String },
}

impl IngestError {
    /// True when the input should be re-requested rather than treated as a
    /// fatal error.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        matches!(
            self,
            Self::Blocked { .. } | Self::UnsupportedExtension { .. }
        )
    }
}

/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;
