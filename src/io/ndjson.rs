//! NDJSON (Newline Delimited JSON) raw chat record storage.
//!
//! Each line holds one loosely-typed raw chat record. Reading is lenient:
//! lines that are not valid JSON are kept as `null` records so the refiner
//! can count them as malformed instead of aborting the whole batch.

use super::{RawEventSource, RawEventStore};
use crate::error::{AnalyzerError, AnalyzerResult};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Read raw chat records from an NDJSON file.
///
/// # Arguments
/// * `path` - Path to the NDJSON file
///
/// # Returns
/// One `Value` per non-empty line. Unparseable lines, including lines that
/// are not valid UTF-8, become `Value::Null`.
pub fn read_raw_records(path: impl AsRef<Path>) -> AnalyzerResult<Vec<Value>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        AnalyzerError::generic(
            "opening file",
            format!("Failed to open '{}': {}", path.display(), e),
        )
    })?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();
    let mut unparseable = 0usize;

    // Split on raw bytes so a line with invalid UTF-8 is counted, not fatal
    for (line_number, line) in reader.split(b'\n').enumerate() {
        let line = line?;

        // Skip empty lines
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        match serde_json::from_slice::<Value>(&line) {
            Ok(record) => records.push(record),
            Err(source) => {
                let error = AnalyzerError::JsonParse {
                    line: line_number + 1,
                    source,
                };
                debug!("Unparseable raw record kept as null: {}", error);
                unparseable += 1;
                records.push(Value::Null);
            }
        }
    }

    if unparseable > 0 {
        warn!(
            path = %path.display(),
            unparseable,
            "Some NDJSON lines could not be parsed"
        );
    }

    info!(
        path = %path.display(),
        records = records.len(),
        "📥 Raw chat records loaded"
    );

    Ok(records)
}

/// Write raw chat records to an NDJSON file, one record per line.
pub fn write_raw_records(path: impl AsRef<Path>, records: &[Value]) -> AnalyzerResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(path)?);
    for record in records {
        let line = serde_json::to_string(record)
            .map_err(|e| AnalyzerError::generic("serializing record", e.to_string()))?;
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;

    debug!(path = %path.display(), records = records.len(), "Raw chat records written");
    Ok(())
}

/// NDJSONファイルを使った生レコードストア
#[derive(Debug, Clone)]
pub struct NdjsonStore {
    path: PathBuf,
}

impl NdjsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

impl RawEventSource for NdjsonStore {
    fn read_records(&self) -> AnalyzerResult<Vec<Value>> {
        read_raw_records(&self.path)
    }
}

impl RawEventStore for NdjsonStore {
    fn write_records(&self, records: &[Value]) -> AnalyzerResult<()> {
        write_raw_records(&self.path, records)
    }
}
