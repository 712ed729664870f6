//! CSV persistence for extracted records.
//!
//! A [`Table`] is plain strings: records are rendered once with
//! [`FileRecord::to_row`] and the split helpers move rows around without
//! reinterpreting them.

use crate::record::{FileRecord, COLUMNS};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("CSV error on {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("cannot serialize record {file_name}: {source}")]
    Serialize {
        file_name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{} has columns {found:?}, expected {expected:?}", .path.display())]
    HeaderMismatch {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// One row per record, header = [`COLUMNS`].
    pub fn from_records(records: &[FileRecord]) -> Result<Self, TableError> {
        let mut table = Table::new(COLUMNS.iter().map(|c| c.to_string()).collect());
        for record in records {
            let row = record.to_row().map_err(|source| TableError::Serialize {
                file_name: record.file_name().to_string(),
                source,
            })?;
            table.rows.push(row);
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write header and rows. The parent directory must already exist.
    pub fn write_csv(&self, path: &Path) -> Result<(), TableError> {
        let csv_err = |source| TableError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
        writer.write_record(&self.headers).map_err(csv_err)?;
        for row in &self.rows {
            writer.write_record(row).map_err(csv_err)?;
        }
        writer
            .flush()
            .map_err(|e| csv_err(csv::Error::from(e)))?;
        Ok(())
    }

    pub fn read_csv(path: &Path) -> Result<Self, TableError> {
        let csv_err = |source| TableError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
        let headers = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(str::to_string)
            .collect();

        let mut table = Table::new(headers);
        for result in reader.records() {
            let record = result.map_err(csv_err)?;
            table.rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(table)
    }
}

/// Write records to one CSV file.
pub fn write_records(records: &[FileRecord], path: &Path) -> Result<(), TableError> {
    let table = Table::from_records(records)?;
    table.write_csv(path)?;
    info!(rows = table.len(), path = %path.display(), "wrote dataset");
    Ok(())
}

/// Save the first half of the rows (rounded down) to `first`, the rest to
/// `second`. Both files carry the full header.
pub fn save_split(table: &Table, first: &Path, second: &Path) -> Result<(), TableError> {
    let middle = table.rows.len() / 2;
    let (head, tail) = table.rows.split_at(middle);

    Table {
        headers: table.headers.clone(),
        rows: head.to_vec(),
    }
    .write_csv(first)?;
    Table {
        headers: table.headers.clone(),
        rows: tail.to_vec(),
    }
    .write_csv(second)?;

    info!(
        first = %first.display(),
        first_rows = head.len(),
        second = %second.display(),
        second_rows = tail.len(),
        "saved split dataset"
    );
    Ok(())
}

/// Inverse of [`save_split`]: `first`'s rows followed by `second`'s.
pub fn load_split(first: &Path, second: &Path) -> Result<Table, TableError> {
    let mut table = Table::read_csv(first)?;
    let tail = Table::read_csv(second)?;

    if tail.headers != table.headers {
        return Err(TableError::HeaderMismatch {
            path: second.to_path_buf(),
            expected: table.headers,
            found: tail.headers,
        });
    }

    table.rows.extend(tail.rows);
    Ok(table)
}
