//! Pairing sheet ingestion.
//!
//! A pairing sheet is a header row followed by one row per rider. Only the four
//! rider/driver columns are required; everything else rides along as
//! passthrough data.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::ImportError;
use super::reconcile::ExternalRow;

/// Header names of the required sheet columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetColumns {
    pub rider_first: String,
    pub rider_last: String,
    pub am_driver: String,
    pub pm_driver: String,
}

impl Default for SheetColumns {
    fn default() -> Self {
        Self {
            rider_first: "Rider_FirstNm".to_string(),
            rider_last: "Rider_LastNm".to_string(),
            am_driver: "PUAM_Drv".to_string(),
            pm_driver: "PUPM_Drv".to_string(),
        }
    }
}

impl SheetColumns {
    fn required(&self) -> [&str; 4] {
        [
            self.rider_first.as_str(),
            self.rider_last.as_str(),
            self.am_driver.as_str(),
            self.pm_driver.as_str(),
        ]
    }
}

/// Cell `idx` of a row, empty past its end.
fn cell(row: &[String], idx: usize) -> String {
    row.get(idx).cloned().unwrap_or_default()
}

/// Map a header row and data rows to `ExternalRow`s.
///
/// Rows shorter than the header are padded with empty cells. Rows with every
/// cell blank are skipped.
pub fn rows_from_table(
    headers: &[String],
    rows: &[Vec<String>],
    columns: &SheetColumns,
) -> Result<Vec<ExternalRow>, ImportError> {
    let position = |name: &str| headers.iter().position(|h| h.trim() == name);

    let [first, last, am, pm] = columns.required().map(position);
    let (Some(first_idx), Some(last_idx), Some(am_idx), Some(pm_idx)) = (first, last, am, pm)
    else {
        let missing = columns
            .required()
            .into_iter()
            .filter(|&name| position(name).is_none())
            .map(str::to_string)
            .collect();
        return Err(ImportError::MissingColumns {
            missing,
            found: headers.iter().map(|h| h.trim().to_string()).collect(),
        });
    };
    let required = [first_idx, last_idx, am_idx, pm_idx];

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }

        let passthrough: BTreeMap<String, String> = headers
            .iter()
            .enumerate()
            .filter(|(idx, header)| !required.contains(idx) && !header.trim().is_empty())
            .map(|(idx, header)| (header.trim().to_string(), cell(row, idx)))
            .collect();

        out.push(ExternalRow {
            rider_first: cell(row, first_idx),
            rider_last: cell(row, last_idx),
            am_driver: cell(row, am_idx),
            pm_driver: cell(row, pm_idx),
            passthrough,
        });
    }

    if out.is_empty() {
        return Err(ImportError::EmptySheet);
    }
    debug!(rows = out.len(), "Parsed pairing sheet");
    Ok(out)
}

/// Read a CSV export of a pairing sheet.
pub fn read_csv<R: Read>(reader: R, columns: &SheetColumns) -> Result<Vec<ExternalRow>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(ImportError::EmptySheet);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    rows_from_table(&headers, &rows, columns)
}

pub fn read_csv_path(path: &Path, columns: &SheetColumns) -> Result<Vec<ExternalRow>, ImportError> {
    let file = File::open(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_csv(file, columns)
}
