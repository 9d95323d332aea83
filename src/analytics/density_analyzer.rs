use crate::error::{AnalyzerError, AnalyzerResult};
use crate::models::{ChatItem, ChatItemKind, MAX_TIME_OFFSET_SECS};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// ベースラインに使う統計量
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BaselineStatistic {
    #[default]
    Mean,
    Median,
}

/// チャット種別ごとの密度重み
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KindWeights {
    pub message: f64,
    pub superchat: f64,
    pub membership: f64,
    pub sticker: f64,
}

impl Default for KindWeights {
    fn default() -> Self {
        Self {
            message: 1.0,
            superchat: 1.0,
            membership: 1.0,
            sticker: 1.0,
        }
    }
}

impl KindWeights {
    pub fn weight_of(&self, kind: &ChatItemKind) -> f64 {
        match kind {
            ChatItemKind::Message { .. } => self.message,
            ChatItemKind::Superchat { .. } => self.superchat,
            ChatItemKind::Membership { .. } => self.membership,
            ChatItemKind::Sticker { .. } => self.sticker,
        }
    }

    pub fn validate(&self) -> AnalyzerResult<()> {
        let weights = [
            ("weights.message", self.message),
            ("weights.superchat", self.superchat),
            ("weights.membership", self.membership),
            ("weights.sticker", self.sticker),
        ];
        for (field, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(AnalyzerError::invalid_config(
                    field,
                    format!("{} is not a finite non-negative weight", weight),
                ));
            }
        }
        Ok(())
    }
}

/// 固定幅の時間窓
///
/// `messages` はソート済みアイテム列のうち `[start, end)` に含まれる連続区間。
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TimeWindow<'a> {
    pub start: u64,
    pub end: u64,
    pub frequency: f64,
    pub is_candidate: bool,
    pub messages: &'a [ChatItem],
}

impl TimeWindow<'_> {
    pub fn duration(&self) -> u64 {
        self.end - self.start
    }
}

/// 隣接する候補窓をまとめた連続区間
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateInterval<'a> {
    pub windows: Vec<TimeWindow<'a>>,
}

impl<'a> CandidateInterval<'a> {
    pub fn start(&self) -> u64 {
        self.windows.first().map(|w| w.start).unwrap_or_default()
    }

    pub fn end(&self) -> u64 {
        self.windows.last().map(|w| w.end).unwrap_or_default()
    }

    /// 区間内で最大の窓頻度
    pub fn peak_frequency(&self) -> f64 {
        self.windows
            .iter()
            .map(|w| w.frequency)
            .fold(0.0, f64::max)
    }

    /// 最後の窓の頻度 - 最初の窓の頻度
    pub fn fdelta(&self) -> f64 {
        match (self.windows.first(), self.windows.last()) {
            (Some(first), Some(last)) => last.frequency - first.frequency,
            _ => 0.0,
        }
    }

    pub fn messages(&self) -> impl Iterator<Item = &'a ChatItem> + '_ {
        self.windows.iter().flat_map(|w| w.messages.iter())
    }
}

/// 密度分析の結果
///
/// `windows` にはメッセージを含む窓のみを時刻昇順で保持する。
/// 空の窓は頻度0として `window_count` とベースラインに含まれる。
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct DensityReport<'a> {
    /// 全窓の頻度から算出したベースライン
    pub baseline: f64,
    /// 窓頻度の標準偏差（診断用）
    pub spread: f64,
    /// 候補判定の閾値 `baseline * (1 + threshold_ratio)`
    pub threshold: f64,
    /// 空の窓を含む全窓数
    pub window_count: usize,
    pub window_secs: u64,
    pub windows: Vec<TimeWindow<'a>>,
}

impl<'a> DensityReport<'a> {
    pub fn candidates(&self) -> impl Iterator<Item = &TimeWindow<'a>> {
        self.windows.iter().filter(|w| w.is_candidate)
    }

    /// 空の窓を補って `[min, max + 1)` 全体を順に返す
    pub fn all_windows(&self) -> impl Iterator<Item = TimeWindow<'a>> + '_ {
        let step = self.window_secs.max(1);
        self.windows.iter().enumerate().flat_map(move |(i, window)| {
            let gap_end = self
                .windows
                .get(i + 1)
                .map(|next| next.start)
                .unwrap_or(window.end);
            let gaps = (window.end..gap_end)
                .step_by(step as usize)
                .map(move |start| TimeWindow {
                    start,
                    end: start.saturating_add(step).min(gap_end),
                    frequency: 0.0,
                    is_candidate: false,
                    messages: &[],
                });
            std::iter::once(window.clone()).chain(gaps)
        })
    }

    /// 隣接する候補窓（間に非候補窓・空の窓がない）を連続区間にまとめる
    pub fn intervals(&self) -> Vec<CandidateInterval<'a>> {
        let mut intervals = Vec::new();
        let mut current: Vec<TimeWindow<'a>> = Vec::new();

        for window in &self.windows {
            let contiguous = current.last().is_some_and(|last| last.end == window.start);
            if (!window.is_candidate || !contiguous) && !current.is_empty() {
                intervals.push(CandidateInterval {
                    windows: std::mem::take(&mut current),
                });
            }
            if window.is_candidate {
                current.push(window.clone());
            }
        }
        if !current.is_empty() {
            intervals.push(CandidateInterval { windows: current });
        }

        intervals
    }
}

/// 時間窓ごとのチャット密度分析
#[derive(Debug, Clone)]
pub struct DensityAnalyzer {
    window_secs: u64,
    threshold_ratio: f64,
    statistic: BaselineStatistic,
    weights: KindWeights,
}

impl DensityAnalyzer {
    pub fn new(
        window_secs: u64,
        threshold_ratio: f64,
        statistic: BaselineStatistic,
        weights: KindWeights,
    ) -> AnalyzerResult<Self> {
        if window_secs == 0 {
            return Err(AnalyzerError::invalid_config(
                "analysis.window_secs",
                "must be greater than 0",
            ));
        }
        if !threshold_ratio.is_finite() || threshold_ratio <= -1.0 {
            return Err(AnalyzerError::invalid_config(
                "analysis.threshold_ratio",
                "must be finite and greater than -1",
            ));
        }
        if window_secs > MAX_TIME_OFFSET_SECS {
            return Err(AnalyzerError::invalid_config(
                "analysis.window_secs",
                format!("must not exceed {} seconds", MAX_TIME_OFFSET_SECS),
            ));
        }
        weights.validate()?;

        Ok(Self {
            window_secs,
            threshold_ratio,
            statistic,
            weights,
        })
    }

    /// 時刻昇順のアイテム列を時間窓に分割し、候補窓を判定する
    pub fn analyze<'a>(&self, items: &'a [ChatItem]) -> AnalyzerResult<DensityReport<'a>> {
        if !items.windows(2).all(|pair| pair[0].time <= pair[1].time) {
            return Err(AnalyzerError::generic(
                "density analysis",
                "chat items must be sorted by time",
            ));
        }

        let (Some(first), Some(last)) = (items.first(), items.last()) else {
            return Ok(DensityReport {
                window_secs: self.window_secs,
                ..Default::default()
            });
        };
        if last.time > MAX_TIME_OFFSET_SECS {
            return Err(AnalyzerError::generic(
                "density analysis",
                format!("time offset {} exceeds {} seconds", last.time, MAX_TIME_OFFSET_SECS),
            ));
        }

        let min_time = first.time;
        let range_end = last.time + 1;
        let window_secs = self.window_secs;
        let window_count = (range_end - min_time).div_ceil(window_secs) as usize;

        // メッセージを含む窓だけを作る
        let mut windows = Vec::new();
        let mut begin = 0usize;
        while begin < items.len() {
            let start = min_time + (items[begin].time - min_time) / window_secs * window_secs;
            let end = (start + window_secs).min(range_end);
            let mut cursor = begin;
            while cursor < items.len() && items[cursor].time < end {
                cursor += 1;
            }
            let messages = &items[begin..cursor];
            let frequency = messages
                .iter()
                .map(|item| self.weights.weight_of(&item.kind))
                .sum();

            windows.push(TimeWindow {
                start,
                end,
                frequency,
                is_candidate: false,
                messages,
            });
            begin = cursor;
        }

        let frequencies: Vec<f64> = windows.iter().map(|w| w.frequency).collect();
        let empty = window_count - windows.len();
        let baseline = match self.statistic {
            BaselineStatistic::Mean => mean(&frequencies, empty),
            BaselineStatistic::Median => median(&frequencies, empty),
        };
        let spread = std_dev(&frequencies, empty);
        let threshold = baseline * (1.0 + self.threshold_ratio);

        for window in &mut windows {
            window.is_candidate = window.frequency > threshold;
        }

        debug!(
            windows = window_count,
            non_empty = windows.len(),
            baseline,
            spread,
            threshold,
            candidates = windows.iter().filter(|w| w.is_candidate).count(),
            "Density windows computed"
        );

        Ok(DensityReport {
            baseline,
            spread,
            threshold,
            window_count,
            window_secs,
            windows,
        })
    }
}

// `empty` は頻度0の空の窓の数

fn mean(values: &[f64], empty: usize) -> f64 {
    let count = values.len() + empty;
    if count == 0 {
        return 0.0;
    }
    values.iter().sum::<f64>() / count as f64
}

fn median(values: &[f64], empty: usize) -> f64 {
    let count = values.len() + empty;
    if count == 0 {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    // 重みは非負なので空の窓は先頭に並ぶ
    let at = |i: usize| if i < empty { 0.0 } else { sorted[i - empty] };
    let mid = count / 2;
    if count % 2 == 0 {
        (at(mid - 1) + at(mid)) / 2.0
    } else {
        at(mid)
    }
}

fn std_dev(values: &[f64], empty: usize) -> f64 {
    let count = values.len() + empty;
    if count == 0 {
        return 0.0;
    }
    let avg = mean(values, empty);
    let squares = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() + empty as f64 * avg * avg;
    (squares / count as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Author, Money, SuperchatColor};
    use std::sync::Arc;

    fn items_at(times: &[u64]) -> Vec<ChatItem> {
        let author = Arc::new(Author {
            id: "UC1".to_string(),
            name: "Viewer".to_string(),
            ..Default::default()
        });
        times
            .iter()
            .enumerate()
            .map(|(i, &t)| ChatItem::message(format!("m{}", i), t, author.clone(), "hi", vec![]))
            .collect()
    }

    fn analyzer(window_secs: u64) -> DensityAnalyzer {
        DensityAnalyzer::new(
            window_secs,
            1.0,
            BaselineStatistic::Mean,
            KindWeights::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_input_yields_no_windows() {
        let items: Vec<ChatItem> = Vec::new();
        let report = analyzer(10).analyze(&items).unwrap();
        assert!(report.windows.is_empty());
        assert!(report.intervals().is_empty());
        assert_eq!(report.baseline, 0.0);
    }

    #[test]
    fn test_single_timestamp_yields_single_window() {
        let items = items_at(&[42, 42, 42]);
        let report = analyzer(10).analyze(&items).unwrap();
        assert_eq!(report.windows.len(), 1);
        assert_eq!(report.windows[0].start, 42);
        assert_eq!(report.windows[0].end, 43);
        assert_eq!(report.windows[0].frequency, 3.0);
        assert!(!report.windows[0].is_candidate);
    }

    #[test]
    fn test_windows_cover_range_without_gaps() {
        let items = items_at(&[5, 7, 18, 33, 47]);
        let report = analyzer(10).analyze(&items).unwrap();

        // 35..45 は空の窓なので保持しない
        let stored: Vec<(u64, u64)> = report.windows.iter().map(|w| (w.start, w.end)).collect();
        assert_eq!(stored, vec![(5, 15), (15, 25), (25, 35), (45, 48)]);
        assert_eq!(report.window_count, 5);

        let all: Vec<TimeWindow> = report.all_windows().collect();
        let bounds: Vec<(u64, u64)> = all.iter().map(|w| (w.start, w.end)).collect();
        assert_eq!(bounds, vec![(5, 15), (15, 25), (25, 35), (35, 45), (45, 48)]);
        assert!(all[3].messages.is_empty());
        assert_eq!(all[3].frequency, 0.0);

        let total: usize = report.windows.iter().map(|w| w.messages.len()).sum();
        assert_eq!(total, items.len());
    }

    #[test]
    fn test_distant_outlier_keeps_window_storage_small() {
        let items = items_at(&[0, 0, 0, 2_000_000]);
        let report = analyzer(1).analyze(&items).unwrap();

        assert_eq!(report.window_count, 2_000_001);
        assert_eq!(report.windows.len(), 2);
        assert_eq!(report.baseline, 4.0 / 2_000_001.0);
        assert_eq!(report.windows[1].start, 2_000_000);
        assert_eq!(report.windows[1].end, 2_000_001);
    }

    #[test]
    fn test_time_offset_beyond_limit_is_rejected() {
        let items = items_at(&[0, MAX_TIME_OFFSET_SECS + 1]);
        assert!(analyzer(10).analyze(&items).is_err());

        let items = items_at(&[u64::MAX - 1, u64::MAX]);
        assert!(analyzer(10).analyze(&items).is_err());
    }

    #[test]
    fn test_empty_window_splits_intervals() {
        let mut times: Vec<u64> = Vec::new();
        times.extend(std::iter::repeat(0).take(30));
        times.extend(std::iter::repeat(20).take(30));
        times.extend([100, 150, 199]);
        let items = items_at(&times);

        let report = analyzer(10).analyze(&items).unwrap();
        let intervals = report.intervals();
        assert_eq!(intervals.len(), 2);
        assert_eq!((intervals[0].start(), intervals[0].end()), (0, 10));
        assert_eq!((intervals[1].start(), intervals[1].end()), (20, 30));
    }

    #[test]
    fn test_uniform_stream_has_no_candidates() {
        let items = items_at(&[0, 1, 2]);
        let report = analyzer(60).analyze(&items).unwrap();
        assert_eq!(report.windows.len(), 1);
        assert_eq!(report.candidates().count(), 0);
    }

    #[test]
    fn test_spike_is_a_candidate() {
        let mut times: Vec<u64> = vec![0, 95];
        times.extend(std::iter::repeat(100).take(20));
        times.push(199);
        let items = items_at(&times);

        let report = analyzer(10).analyze(&items).unwrap();
        let candidates: Vec<_> = report.candidates().collect();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].start, 100);
        assert_eq!(candidates[0].frequency, 20.0);
    }

    #[test]
    fn test_adjacent_candidates_form_one_interval() {
        let mut times: Vec<u64> = Vec::new();
        times.extend(std::iter::repeat(5).take(20));
        times.extend(std::iter::repeat(15).take(30));
        times.extend([40, 60, 80, 99]);
        let items = items_at(&times);

        let report = analyzer(10).analyze(&items).unwrap();
        let intervals = report.intervals();
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].start(), 5);
        assert_eq!(intervals[0].end(), 25);
        assert_eq!(intervals[0].peak_frequency(), 30.0);
        assert_eq!(intervals[0].fdelta(), 10.0);
        assert_eq!(intervals[0].messages().count(), 50);
    }

    #[test]
    fn test_weights_change_frequency() {
        let author = Arc::new(Author::default());
        let items = vec![
            ChatItem::message("m1", 0, author.clone(), "hi", vec![]),
            ChatItem::superchat(
                "s1",
                1,
                author.clone(),
                "thanks",
                Money::default(),
                SuperchatColor::default(),
                vec![],
            ),
        ];
        let weights = KindWeights {
            superchat: 5.0,
            ..Default::default()
        };
        let analyzer = DensityAnalyzer::new(10, 1.0, BaselineStatistic::Mean, weights).unwrap();
        let report = analyzer.analyze(&items).unwrap();
        assert_eq!(report.windows[0].frequency, 6.0);
    }

    #[test]
    fn test_median_baseline() {
        assert_eq!(median(&[1.0, 9.0, 3.0], 0), 3.0);
        assert_eq!(median(&[1.0, 2.0, 3.0, 4.0], 0), 2.5);
        assert_eq!(median(&[5.0], 2), 0.0);
        assert_eq!(median(&[4.0, 6.0], 2), 2.0);
        assert_eq!(mean(&[1.0, 2.0, 3.0, 4.0], 0), 2.5);
        assert_eq!(mean(&[6.0], 2), 2.0);
        assert_eq!(std_dev(&[2.0, 2.0, 2.0], 0), 0.0);
        assert_eq!(std_dev(&[2.0], 1), 1.0);
    }

    #[test]
    fn test_unsorted_input_is_rejected() {
        let items = items_at(&[10, 5]);
        assert!(analyzer(10).analyze(&items).is_err());
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(DensityAnalyzer::new(0, 1.0, BaselineStatistic::Mean, KindWeights::default())
            .is_err());
        assert!(DensityAnalyzer::new(10, -1.0, BaselineStatistic::Mean, KindWeights::default())
            .is_err());
        assert!(DensityAnalyzer::new(
            u64::MAX,
            1.0,
            BaselineStatistic::Mean,
            KindWeights::default()
        )
        .is_err());
        let weights = KindWeights {
            message: -1.0,
            ..Default::default()
        };
        assert!(DensityAnalyzer::new(10, 1.0, BaselineStatistic::Mean, weights).is_err());
    }
}
