//! Error types shared by the analysis pipeline and its I/O surfaces.

use thiserror::Error;

/// Comprehensive error types for configuration, I/O and parsing operations.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    /// I/O error when reading files
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error at line {line}: {source}")]
    JsonParse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// TOML設定ファイルのパースエラー
    #[error("Config parsing error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// 分析開始前に検出された設定値の不正
    #[error("Invalid configuration '{field}': {reason}")]
    InvalidConfiguration { field: String, reason: String },

    /// コンテキストルールファイルの読み込み・解析失敗
    #[error("Context rule file '{path}' unavailable: {reason}")]
    RuleFile { path: String, reason: String },

    /// Invalid stream identifier
    #[error("Invalid stream id: {input}")]
    InvalidStreamId { input: String },

    /// Generic error with context
    #[error("Error in {context}: {message}")]
    Generic { context: String, message: String },
}

impl AnalyzerError {
    /// Create a new generic error with context
    pub fn generic(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Generic {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a rule file error
    pub fn rule_file(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RuleFile {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type AnalyzerResult<T> = Result<T, AnalyzerError>;
