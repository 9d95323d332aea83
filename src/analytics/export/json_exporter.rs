use super::{ExportError, FormatHandler};
use crate::analytics::stream_analyzer::AnalysisReport;
use serde_json::json;

/// JSON形式エクスポーター
pub struct JsonExporter {
    pretty_print: bool,
    include_messages: bool,
}

impl JsonExporter {
    pub fn new() -> Self {
        Self {
            pretty_print: true,
            include_messages: true,
        }
    }

    pub fn with_pretty_print(mut self, pretty: bool) -> Self {
        self.pretty_print = pretty;
        self
    }

    /// ハイライトごとのメッセージ本体を含めるか
    pub fn with_messages(mut self, include: bool) -> Self {
        self.include_messages = include;
        self
    }

    /// レポートをJSON構造に変換
    fn build_json(&self, report: &AnalysisReport) -> serde_json::Value {
        let highlights: Vec<serde_json::Value> = report
            .highlights
            .iter()
            .map(|highlight| {
                let mut value = highlight.to_value();
                if let serde_json::Value::Object(ref mut map) = value {
                    map.insert("time_in_hms".to_string(), json!(highlight.time_in_hms()));
                    map.insert("url".to_string(), json!(highlight.url()));
                    if !self.include_messages {
                        map.remove("messages");
                        map.insert("message_count".to_string(), json!(highlight.messages.len()));
                    }
                }
                value
            })
            .collect();

        json!({
            "stream_id": report.stream_id,
            "summary": {
                "total_messages": report.total_message_amount(),
                "unique_authors": report.authors.len(),
                "baseline": report.baseline,
                "spread": report.spread,
                "window_count": report.window_count,
                "refine": report.stats,
            },
            "highlights": highlights,
        })
    }
}

impl Default for JsonExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatHandler for JsonExporter {
    fn export(&self, report: &AnalysisReport) -> Result<Vec<u8>, ExportError> {
        let json = self.build_json(report);

        let output = if self.pretty_print {
            serde_json::to_string_pretty(&json)
        } else {
            serde_json::to_string(&json)
        };

        output
            .map(String::into_bytes)
            .map_err(|e| ExportError::Serialization(e.to_string()))
    }

    fn file_extension(&self) -> &str {
        "json"
    }
}
