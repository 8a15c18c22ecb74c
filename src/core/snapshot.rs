//! Snapshot table loading.
//!
//! Reads the comma-delimited traffic snapshot written by the capture merger.
//! Malformed lines are skipped; a missing, empty or headerless file aborts
//! the load.

use std::fs;
use std::path::Path;
use std::time::SystemTime;
use log::debug;
use thiserror::Error;

use crate::core::normalizer::RawTrafficRow;
use crate::models::SnapshotSchema;

/// Errors that can occur while loading a snapshot
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Missing column: {0}")]
    MissingColumn(String),
    #[error("Snapshot contains no rows")]
    Empty,
}

/// Size and modification time of the snapshot at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileFingerprint {
    pub size: u64,
    pub modified: SystemTime,
}

impl FileFingerprint {
    pub fn read(path: &Path) -> std::io::Result<Self> {
        let metadata = fs::metadata(path)?;
        Ok(Self {
            size: metadata.len(),
            modified: metadata.modified()?,
        })
    }

    /// True when both size and modification time changed.
    ///
    /// A partial write can match an earlier size, so size alone is not enough.
    pub fn differs_from(&self, other: &FileFingerprint) -> bool {
        self.size != other.size && self.modified != other.modified
    }
}

/// Positions of the schema columns in the header
struct ColumnIndex {
    time: usize,
    protocol: usize,
    length: usize,
}

impl ColumnIndex {
    fn resolve(headers: &csv::StringRecord, schema: &SnapshotSchema) -> Result<Self, SnapshotError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| SnapshotError::MissingColumn(name.to_string()))
        };
        Ok(Self {
            time: find(&schema.time_column)?,
            protocol: find(&schema.protocol_column)?,
            length: find(&schema.length_column)?,
        })
    }
}

/// Load the snapshot rows bound to `schema`
pub fn load(path: &Path, schema: &SnapshotSchema) -> Result<Vec<RawTrafficRow>, SnapshotError> {
    if fs::metadata(path)?.len() == 0 {
        return Err(SnapshotError::Empty);
    }
    let reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)?;
    read_rows(reader, schema)
}

fn read_rows<R: std::io::Read>(
    mut reader: csv::Reader<R>,
    schema: &SnapshotSchema,
) -> Result<Vec<RawTrafficRow>, SnapshotError> {
    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(SnapshotError::Empty);
    }
    let columns = ColumnIndex::resolve(&headers, schema)?;
    let width = headers.len();

    let mut rows = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                debug!("Skipping unreadable snapshot line {}: {}", line + 2, e);
                continue;
            }
        };
        if record.len() > width {
            debug!("Skipping snapshot line {}: {} fields, expected {}", line + 2, record.len(), width);
            continue;
        }
        let field = |i: usize| record.get(i).unwrap_or_default().to_string();
        rows.push(RawTrafficRow {
            time: field(columns.time),
            protocol: field(columns.protocol),
            length: field(columns.length),
        });
    }

    if rows.is_empty() {
        return Err(SnapshotError::Empty);
    }
    Ok(rows)
}
