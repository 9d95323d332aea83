use super::density_analyzer::{CandidateInterval, TimeWindow};
use super::highlight::Highlight;
use super::intensity_classifier::IntensityClassifier;
use crate::chat_management::ContextMatcher;
use crate::models::StreamId;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// 候補区間をハイライトとして組み立てる
#[derive(Debug, Clone)]
pub struct HighlightAssembler {
    stream_id: StreamId,
    min_duration_secs: u64,
    classifier: IntensityClassifier,
}

impl HighlightAssembler {
    pub fn new(stream_id: StreamId, min_duration_secs: u64, classifier: IntensityClassifier) -> Self {
        Self {
            stream_id,
            min_duration_secs,
            classifier,
        }
    }

    /// 連続区間を結合し、キーワード・コンテキスト・強度を付与したハイライト列を返す
    ///
    /// 結果は `(time, stream_id)` で安定ソートされる。
    pub fn assemble(
        &self,
        intervals: &[CandidateInterval<'_>],
        baseline: f64,
        matcher: &ContextMatcher,
    ) -> Vec<Highlight> {
        let mut highlights: Vec<Highlight> = merge_intervals(intervals)
            .into_iter()
            .filter_map(|windows| self.build(&windows, baseline, matcher))
            .collect();

        highlights.sort_by(|a, b| (a.time, &a.stream_id).cmp(&(b.time, &b.stream_id)));
        highlights
    }

    fn build(
        &self,
        windows: &[&TimeWindow<'_>],
        baseline: f64,
        matcher: &ContextMatcher,
    ) -> Option<Highlight> {
        let (first, last) = (windows.first()?, windows.last()?);
        let start = first.start;
        let end = windows.iter().map(|w| w.end).max().unwrap_or(last.end);
        let duration = end - start;

        if duration < self.min_duration_secs {
            debug!(start, duration, "Highlight shorter than minimum duration dropped");
            return None;
        }

        let peak_frequency = windows.iter().map(|w| w.frequency).fold(0.0, f64::max);
        let intensity = self.classifier.classify(peak_frequency, baseline);

        let mut messages = Vec::new();
        let mut seen_messages = HashSet::new();
        let mut keywords = Vec::new();
        let mut seen_keywords = HashSet::new();
        let mut contexts = BTreeSet::new();

        for item in windows.iter().flat_map(|w| w.messages.iter()) {
            if !seen_messages.insert(item.id.as_str()) {
                continue;
            }
            let matched = matcher.match_item(item);
            contexts.extend(matched.contexts);
            for keyword in matched.keywords {
                if seen_keywords.insert(keyword.clone()) {
                    keywords.push(keyword);
                }
            }
            messages.push(item.clone());
        }
        messages.sort_by_key(|item| item.time);

        Some(Highlight {
            stream_id: self.stream_id.clone(),
            time: start,
            duration,
            intensity,
            fdelta: last.frequency - first.frequency,
            peak_frequency,
            messages,
            keywords,
            contexts,
        })
    }
}

/// 重なり・隣接する区間を1つにまとめる
fn merge_intervals<'r, 'a>(intervals: &'r [CandidateInterval<'a>]) -> Vec<Vec<&'r TimeWindow<'a>>> {
    let mut ordered: Vec<&CandidateInterval<'a>> =
        intervals.iter().filter(|i| !i.windows.is_empty()).collect();
    ordered.sort_by_key(|interval| interval.start());

    let mut merged: Vec<Vec<&TimeWindow<'a>>> = Vec::new();
    let mut current_end = 0u64;

    for interval in ordered {
        let extends_current = !merged.is_empty() && interval.start() <= current_end;
        if extends_current {
            if let Some(group) = merged.last_mut() {
                // 既存グループの範囲を越えて伸びる窓だけを追加する
                group.extend(interval.windows.iter().filter(|w| w.end > current_end));
                group.sort_by_key(|w| w.start);
            }
            current_end = current_end.max(interval.end());
        } else {
            merged.push(interval.windows.iter().collect());
            current_end = interval.end();
        }
    }

    merged
}
