//! 配信チャットのハイライト分析パイプライン
//!
//! 精製 → 密度分析 → 強度分類 → ハイライト組み立てを単一スレッドで順に実行します。
//! I/O（生レコードやルールファイルの読み込み）はこの前に呼び出し側で済ませておきます。

use super::density_analyzer::DensityAnalyzer;
use super::highlight::Highlight;
use super::highlight_assembler::HighlightAssembler;
use super::intensity_classifier::IntensityClassifier;
use crate::chat_management::{ContextMatcher, EventRefiner, RefineStats, RefinedChat};
use crate::config::AnalyzerConfig;
use crate::error::AnalyzerResult;
use crate::models::{Author, ChatItem, StreamId};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// 精製済みアイテムに対する分析結果
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HighlightAnalysis {
    pub baseline: f64,
    pub spread: f64,
    pub window_count: usize,
    pub highlights: Vec<Highlight>,
}

/// パイプライン全体の結果
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub stream_id: StreamId,
    pub items: Vec<ChatItem>,
    pub authors: Vec<Arc<Author>>,
    pub stats: RefineStats,
    pub baseline: f64,
    pub spread: f64,
    pub window_count: usize,
    pub highlights: Vec<Highlight>,
}

impl AnalysisReport {
    pub fn total_message_amount(&self) -> usize {
        self.items.len()
    }
}

/// ハイライト分析器
#[derive(Debug, Clone)]
pub struct StreamAnalyzer {
    stream_id: StreamId,
    config: AnalyzerConfig,
    matcher: ContextMatcher,
    refiner: EventRefiner,
    density: DensityAnalyzer,
    assembler: HighlightAssembler,
}

impl StreamAnalyzer {
    /// 設定を検証して分析器を作成する（不正な設定はここで失敗する）
    pub fn new(
        stream_id: StreamId,
        config: AnalyzerConfig,
        matcher: ContextMatcher,
    ) -> AnalyzerResult<Self> {
        config.validate()?;

        let analysis = &config.analysis;
        let refiner = EventRefiner::new(analysis.message_limit);
        let density = DensityAnalyzer::new(
            analysis.window_secs,
            analysis.threshold_ratio,
            analysis.baseline,
            config.weights.clone(),
        )?;
        let classifier = IntensityClassifier::new(config.intensity.clone())?;
        let assembler =
            HighlightAssembler::new(stream_id.clone(), analysis.min_duration_secs, classifier);

        Ok(Self {
            stream_id,
            config,
            matcher,
            refiner,
            density,
            assembler,
        })
    }

    /// 設定ファイルに指定されたルールファイルを読み込んで作成する
    pub fn with_configured_rules(stream_id: StreamId, config: AnalyzerConfig) -> AnalyzerResult<Self> {
        let matcher = match &config.analysis.context_path {
            Some(path) => ContextMatcher::load(path),
            None => ContextMatcher::empty(),
        };
        Self::new(stream_id, config, matcher)
    }

    pub fn stream_id(&self) -> &StreamId {
        &self.stream_id
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn matcher(&self) -> &ContextMatcher {
        &self.matcher
    }

    /// 生レコードを精製する
    pub fn refine<I>(&self, records: I) -> RefinedChat
    where
        I: IntoIterator<Item = Value>,
    {
        self.refiner.refine(records)
    }

    /// 精製済みアイテムからハイライトを検出する
    ///
    /// 同じ入力と設定に対して常に同じ結果を返す。
    pub fn analyze(&self, items: &[ChatItem]) -> AnalyzerResult<HighlightAnalysis> {
        let report = self.density.analyze(items)?;
        let intervals = report.intervals();
        let highlights = self
            .assembler
            .assemble(&intervals, report.baseline, &self.matcher);

        info!(
            stream_id = %self.stream_id,
            windows = report.window_count,
            baseline = report.baseline,
            intervals = intervals.len(),
            highlights = highlights.len(),
            "✨ Highlights detected"
        );

        Ok(HighlightAnalysis {
            baseline: report.baseline,
            spread: report.spread,
            window_count: report.window_count,
            highlights,
        })
    }

    /// 精製から組み立てまでを実行する
    pub fn run<I>(&self, records: I) -> AnalyzerResult<AnalysisReport>
    where
        I: IntoIterator<Item = Value>,
    {
        info!(stream_id = %self.stream_id, "🎬 Starting stream analysis");

        let refined = self.refine(records);
        let analysis = self.analyze(&refined.items)?;

        Ok(AnalysisReport {
            stream_id: self.stream_id.clone(),
            items: refined.items,
            authors: refined.authors,
            stats: refined.stats,
            baseline: analysis.baseline,
            spread: analysis.spread,
            window_count: analysis.window_count,
            highlights: analysis.highlights,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalyzerError;
    use serde_json::json;

    fn stream_id() -> StreamId {
        StreamId::parse("test_stream").unwrap()
    }

    fn raw(id: usize, time: u64, text: &str) -> Value {
        json!({
            "message_id": format!("m{}", id),
            "message": text,
            "time_in_seconds": time,
            "author": {"id": format!("UC{}", id % 7), "name": format!("viewer{}", id % 7)},
        })
    }

    #[test]
    fn test_invalid_configuration_fails_fast() {
        let mut config = AnalyzerConfig::default();
        config.analysis.window_secs = 0;
        let result = StreamAnalyzer::new(stream_id(), config, ContextMatcher::empty());
        assert!(matches!(
            result,
            Err(AnalyzerError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_empty_run() {
        let analyzer =
            StreamAnalyzer::new(stream_id(), AnalyzerConfig::default(), ContextMatcher::empty())
                .unwrap();
        let report = analyzer.run(Vec::new()).unwrap();
        assert!(report.items.is_empty());
        assert!(report.authors.is_empty());
        assert!(report.highlights.is_empty());
        assert_eq!(report.window_count, 0);
    }

    #[test]
    fn test_run_detects_spike() {
        let mut records: Vec<Value> = (0..40).map(|i| raw(i, 200 + (i as u64 % 8), "lol")).collect();
        records.push(raw(100, 0, "hello"));
        records.push(raw(101, 599, "bye"));

        let matcher = ContextMatcher::from_json_str(r#"{"funny": ["lol"]}"#).unwrap();
        let analyzer = StreamAnalyzer::new(stream_id(), AnalyzerConfig::default(), matcher).unwrap();
        let report = analyzer.run(records).unwrap();

        assert_eq!(report.total_message_amount(), 42);
        assert_eq!(report.authors.len(), 7);
        assert_eq!(report.highlights.len(), 1);

        let highlight = &report.highlights[0];
        assert_eq!(highlight.time, 200);
        assert_eq!(highlight.duration, 10);
        assert_eq!(highlight.messages.len(), 40);
        assert!(highlight.contexts.contains("funny"));
        assert_eq!(highlight.keywords, vec!["lol"]);
    }

    #[test]
    fn test_analyze_is_idempotent() {
        let records: Vec<Value> = (0..60)
            .map(|i| raw(i, if i < 30 { 50 + i as u64 % 5 } else { i as u64 * 10 }, "pog"))
            .collect();
        let analyzer =
            StreamAnalyzer::new(stream_id(), AnalyzerConfig::default(), ContextMatcher::empty())
                .unwrap();
        let refined = analyzer.refine(records);

        let first = analyzer.analyze(&refined.items).unwrap();
        let second = analyzer.analyze(&refined.items).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_configured_rules_missing_file_degrades() {
        let mut config = AnalyzerConfig::default();
        config.analysis.context_path = Some("no/such/contexts.json".into());
        let analyzer = StreamAnalyzer::with_configured_rules(stream_id(), config).unwrap();
        assert!(analyzer.matcher().is_empty());
    }
}
