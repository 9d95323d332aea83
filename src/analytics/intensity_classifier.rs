use crate::error::{AnalyzerError, AnalyzerResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// ハイライトの強度レベル
///
/// 宣言順（= `constant()`）で全順序が決まる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intensity {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl Intensity {
    pub const ALL: [Intensity; 4] = [
        Intensity::Low,
        Intensity::Medium,
        Intensity::High,
        Intensity::VeryHigh,
    ];

    /// レベル名
    pub fn level(&self) -> &'static str {
        match self {
            Intensity::Low => "LOW",
            Intensity::Medium => "MEDIUM",
            Intensity::High => "HIGH",
            Intensity::VeryHigh => "VERY_HIGH",
        }
    }

    /// 順位（0が最弱）
    pub fn constant(&self) -> u8 {
        *self as u8
    }

    /// 表示用の色（表示専用で分析には使わない）
    pub fn color(&self) -> &'static str {
        match self {
            Intensity::Low => "#2196f3",
            Intensity::Medium => "#ffc107",
            Intensity::High => "#ff5722",
            Intensity::VeryHigh => "#e91e63",
        }
    }
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.level())
    }
}

/// 強度レベルの下限（ベースラインに対する倍率）
///
/// LOW は下限なし（それ未満すべてのフォールバック）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IntensityThresholds {
    pub medium: f64,
    pub high: f64,
    pub very_high: f64,
}

impl Default for IntensityThresholds {
    fn default() -> Self {
        Self {
            medium: 3.0,
            high: 5.0,
            very_high: 8.0,
        }
    }
}

impl IntensityThresholds {
    pub fn validate(&self) -> AnalyzerResult<()> {
        let bounds = [
            ("intensity.medium", self.medium),
            ("intensity.high", self.high),
            ("intensity.very_high", self.very_high),
        ];
        for (field, value) in bounds {
            if !value.is_finite() || value <= 0.0 {
                return Err(AnalyzerError::invalid_config(
                    field,
                    format!("{} is not a positive finite multiple", value),
                ));
            }
        }
        if !(self.medium < self.high && self.high < self.very_high) {
            return Err(AnalyzerError::invalid_config(
                "intensity",
                "thresholds must be strictly ascending (medium < high < very_high)",
            ));
        }
        Ok(())
    }
}

/// ピーク頻度を強度レベルに分類する
#[derive(Debug, Clone, Default)]
pub struct IntensityClassifier {
    thresholds: IntensityThresholds,
}

impl IntensityClassifier {
    pub fn new(thresholds: IntensityThresholds) -> AnalyzerResult<Self> {
        thresholds.validate()?;
        Ok(Self { thresholds })
    }

    pub fn thresholds(&self) -> &IntensityThresholds {
        &self.thresholds
    }

    /// ピーク頻度とベースラインから強度を決定する
    ///
    /// 全域で定義された単調関数。ベースラインが0以下の場合、正のピークは最大強度とする。
    pub fn classify(&self, peak_frequency: f64, baseline: f64) -> Intensity {
        if peak_frequency.is_nan() || peak_frequency <= 0.0 {
            return Intensity::Low;
        }
        if baseline.is_nan() || baseline <= 0.0 {
            return Intensity::VeryHigh;
        }

        let ratio = peak_frequency / baseline;
        if ratio >= self.thresholds.very_high {
            Intensity::VeryHigh
        } else if ratio >= self.thresholds.high {
            Intensity::High
        } else if ratio >= self.thresholds.medium {
            Intensity::Medium
        } else {
            Intensity::Low
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intensity_order() {
        assert!(Intensity::Low < Intensity::Medium);
        assert!(Intensity::Medium < Intensity::High);
        assert!(Intensity::High < Intensity::VeryHigh);
        for (rank, intensity) in Intensity::ALL.iter().enumerate() {
            assert_eq!(intensity.constant() as usize, rank);
        }
        assert_eq!(Intensity::VeryHigh.to_string(), "VERY_HIGH");
        assert_eq!(
            serde_json::to_value(Intensity::VeryHigh).unwrap(),
            serde_json::json!("VERY_HIGH")
        );
    }

    #[test]
    fn test_classification_boundaries() {
        let classifier = IntensityClassifier::default();
        assert_eq!(classifier.classify(0.0, 2.0), Intensity::Low);
        assert_eq!(classifier.classify(5.9, 2.0), Intensity::Low);
        assert_eq!(classifier.classify(6.0, 2.0), Intensity::Medium);
        assert_eq!(classifier.classify(10.0, 2.0), Intensity::High);
        assert_eq!(classifier.classify(16.0, 2.0), Intensity::VeryHigh);
        assert_eq!(classifier.classify(1e12, 2.0), Intensity::VeryHigh);
    }

    #[test]
    fn test_classification_is_total_and_monotonic() {
        let classifier = IntensityClassifier::default();
        for baseline in [0.1, 0.5, 1.0, 3.7, 42.0] {
            let mut previous = Intensity::Low;
            let mut frequency = 0.0;
            while frequency < 500.0 {
                let current = classifier.classify(frequency, baseline);
                assert!(current >= previous, "not monotonic at {}", frequency);
                previous = current;
                frequency += 0.25;
            }
        }
    }

    #[test]
    fn test_degenerate_inputs() {
        let classifier = IntensityClassifier::default();
        assert_eq!(classifier.classify(f64::NAN, 1.0), Intensity::Low);
        assert_eq!(classifier.classify(-3.0, 1.0), Intensity::Low);
        assert_eq!(classifier.classify(3.0, 0.0), Intensity::VeryHigh);
        assert_eq!(classifier.classify(0.0, 0.0), Intensity::Low);
    }

    #[test]
    fn test_threshold_validation() {
        assert!(IntensityThresholds::default().validate().is_ok());

        let descending = IntensityThresholds {
            medium: 5.0,
            high: 3.0,
            very_high: 8.0,
        };
        assert!(IntensityClassifier::new(descending).is_err());

        let non_positive = IntensityThresholds {
            medium: 0.0,
            ..Default::default()
        };
        assert!(non_positive.validate().is_err());
    }
}
