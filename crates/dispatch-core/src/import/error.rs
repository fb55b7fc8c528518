use std::path::PathBuf;

use thiserror::Error;

use crate::store::StoreError;

/// Run-level import failures. Per-row match problems are never errors; they
/// land in the report.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("No data found in sheet")]
    EmptySheet,

    #[error("Missing required columns: {}. Found: {}", .missing.join(", "), .found.join(", "))]
    MissingColumns {
        missing: Vec<String>,
        found: Vec<String>,
    },

    #[error("Failed to parse sheet: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Record store error: {0}")]
    Store(#[from] StoreError),
}
