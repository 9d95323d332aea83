use super::intensity_classifier::Intensity;
use crate::models::{ChatItem, StreamId};
use crate::utils::format_hms;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// 検出されたハイライト区間
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Highlight {
    pub stream_id: StreamId,
    /// 区間開始（配信開始からの秒数）
    pub time: u64,
    /// 区間長（秒）
    pub duration: u64,
    pub intensity: Intensity,
    /// 区間の最初の窓から最後の窓への頻度差
    pub fdelta: f64,
    /// 区間内の最大窓頻度
    pub peak_frequency: f64,
    /// 区間に含まれるチャット（時刻昇順）
    pub messages: Vec<ChatItem>,
    pub keywords: Vec<String>,
    pub contexts: BTreeSet<String>,
}

impl Highlight {
    /// 区間終了（含まない）
    pub fn end(&self) -> u64 {
        self.time + self.duration
    }

    pub fn contains_time(&self, time: u64) -> bool {
        self.time <= time && time < self.end()
    }

    pub fn time_in_hms(&self) -> String {
        format_hms(self.time)
    }

    /// 配信の該当時刻へのURL
    pub fn url(&self) -> String {
        format!("https://youtu.be/{}?t={}", self.stream_id, self.time)
    }

    /// シリアライズ用の構造化表現
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for Highlight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message_count = if self.messages.is_empty() {
            "No".to_string()
        } else {
            self.messages.len().to_string()
        };

        write!(
            f,
            "[{}] {}: {} ({} messages, {} intensity, {:.3} diff, {}s duration)",
            self.time_in_hms(),
            self.contexts.iter().cloned().collect::<Vec<_>>().join("/"),
            self.keywords.join(", "),
            message_count,
            self.intensity,
            self.fdelta,
            self.duration,
        )
    }
}
