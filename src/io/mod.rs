//! I/O utilities for raw chat record storage.
//!
//! The analysis core never performs I/O itself; callers load a batch of raw
//! records through a [`RawEventSource`] before refinement begins.

pub mod ndjson;

use crate::error::AnalyzerResult;
use serde_json::Value;

// Re-export commonly used types and functions
pub use ndjson::{read_raw_records, write_raw_records, NdjsonStore};

/// 生チャットレコードの供給元
pub trait RawEventSource {
    fn read_records(&self) -> AnalyzerResult<Vec<Value>>;
}

/// 生チャットレコードのキャッシュ（読み書き）
pub trait RawEventStore: RawEventSource {
    fn write_records(&self, records: &[Value]) -> AnalyzerResult<()>;
}
