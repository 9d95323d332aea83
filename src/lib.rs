pub mod analytics;
pub mod chat_management;
pub mod config;
pub mod error;
pub mod io;
pub mod models;
pub mod utils;

// Re-export the main error types for convenience
pub use error::{AnalyzerError, AnalyzerResult};

// Re-export the pipeline entry points
pub use analytics::{
    AnalysisReport, Highlight, HighlightAnalysis, Intensity, IntensityClassifier, StreamAnalyzer,
};
pub use chat_management::{ContextMatcher, EventRefiner, RefineStats, RefinedChat};
pub use config::{AnalyzerConfig, ConfigManager};

// Re-export I/O utilities for convenience
pub use io::{read_raw_records, write_raw_records, NdjsonStore};

pub use models::{Author, ChatItem, ChatItemKind, StreamId};
