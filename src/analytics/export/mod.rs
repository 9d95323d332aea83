use super::stream_analyzer::AnalysisReport;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub mod json_exporter;
pub mod text_exporter;

pub use json_exporter::JsonExporter;
pub use text_exporter::TextExporter;

/// エクスポート形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Text,
    Json,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 2] = [ExportFormat::Text, ExportFormat::Json];

    pub fn file_extension(&self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Json => "json",
        }
    }

    /// 出力ファイル名
    pub fn file_name(&self) -> String {
        format!("highlights.{}", self.file_extension())
    }
}

/// エクスポートエラー
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unsupported format: {format:?}")]
    UnsupportedFormat { format: ExportFormat },

    #[error("File access error: {path}")]
    FileAccess { path: String },
}

/// フォーマットハンドラートレイト
pub trait FormatHandler: Send + Sync {
    fn export(&self, report: &AnalysisReport) -> Result<Vec<u8>, ExportError>;
    fn file_extension(&self) -> &str;
}

/// エクスポートマネージャー
pub struct ExportManager {
    format_handlers: HashMap<ExportFormat, Box<dyn FormatHandler>>,
}

impl ExportManager {
    /// 新しいエクスポートマネージャーを作成
    pub fn new() -> Self {
        let mut manager = Self {
            format_handlers: HashMap::new(),
        };

        // デフォルトハンドラーを登録
        manager.register_handler(ExportFormat::Text, Box::new(TextExporter::new()));
        manager.register_handler(ExportFormat::Json, Box::new(JsonExporter::new()));

        manager
    }

    /// フォーマットハンドラーを登録
    pub fn register_handler(&mut self, format: ExportFormat, handler: Box<dyn FormatHandler>) {
        self.format_handlers.insert(format, handler);
    }

    /// レポートを指定形式のバイト列に変換
    pub fn export(
        &self,
        report: &AnalysisReport,
        format: ExportFormat,
    ) -> Result<Vec<u8>, ExportError> {
        let handler = self
            .format_handlers
            .get(&format)
            .ok_or(ExportError::UnsupportedFormat { format })?;

        handler.export(report)
    }

    /// サポートされている形式を取得
    pub fn supported_formats(&self) -> Vec<ExportFormat> {
        self.format_handlers.keys().copied().collect()
    }

    /// `base_dir/folder_name` 以下に各形式のファイルを書き出す
    ///
    /// フォルダ名を省略した場合は現在のUNIX時刻を使う。
    /// 既に存在するフォルダ名には `_<timestamp>` を付けて別フォルダにする。
    pub fn export_to_dir(
        &self,
        report: &AnalysisReport,
        base_dir: impl AsRef<Path>,
        folder_name: Option<&str>,
        formats: &[ExportFormat],
    ) -> Result<Vec<PathBuf>, ExportError> {
        let timestamp = chrono::Utc::now().timestamp();
        let folder = folder_name
            .map(str::to_string)
            .unwrap_or_else(|| timestamp.to_string());

        let mut target = base_dir.as_ref().join(&folder);
        if target.exists() {
            let renamed = format!("{}_{}", folder, timestamp);
            warn!(
                "⚠️ Folder {} already exists, writing to {} instead",
                target.display(),
                renamed
            );
            target = base_dir.as_ref().join(renamed);
        }

        fs::create_dir_all(&target).map_err(|_| ExportError::FileAccess {
            path: target.display().to_string(),
        })?;

        let mut written = Vec::with_capacity(formats.len());
        for format in formats {
            let bytes = self.export(report, *format)?;
            let path = target.join(format.file_name());
            fs::write(&path, bytes)?;
            written.push(path);
        }

        info!(
            "💾 Exported {} highlights to {}",
            report.highlights.len(),
            target.display()
        );
        Ok(written)
    }
}

impl Default for ExportManager {
    fn default() -> Self {
        Self::new()
    }
}
