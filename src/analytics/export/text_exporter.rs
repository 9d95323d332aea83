use super::{ExportError, FormatHandler};
use crate::analytics::stream_analyzer::AnalysisReport;

/// プレーンテキスト形式エクスポーター（1ハイライト1行）
pub struct TextExporter {
    with_urls: bool,
}

impl TextExporter {
    pub fn new() -> Self {
        Self { with_urls: false }
    }

    /// 各行の後ろに配信の該当時刻URLを付ける
    pub fn with_urls(mut self, enabled: bool) -> Self {
        self.with_urls = enabled;
        self
    }
}

impl Default for TextExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatHandler for TextExporter {
    fn export(&self, report: &AnalysisReport) -> Result<Vec<u8>, ExportError> {
        let mut output = String::new();
        for highlight in &report.highlights {
            output.push_str(&highlight.to_string());
            if self.with_urls {
                output.push(' ');
                output.push_str(&highlight.url());
            }
            output.push('\n');
        }
        Ok(output.into_bytes())
    }

    fn file_extension(&self) -> &str {
        "txt"
    }
}
