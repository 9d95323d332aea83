//! 分析設定管理モジュール
//!
//! TOML設定ファイルの読み込み・保存と、分析開始前の設定値検証を提供します。

use crate::analytics::density_analyzer::{BaselineStatistic, KindWeights};
use crate::analytics::intensity_classifier::IntensityThresholds;
use crate::error::{AnalyzerError, AnalyzerResult};
use crate::models::MAX_TIME_OFFSET_SECS;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 分析パラメータ
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// 時間窓の幅（秒）
    pub window_secs: u64,
    /// ベースラインに対する閾値比率（frequency > baseline * (1 + ratio) で候補）
    pub threshold_ratio: f64,
    /// ベースラインの統計量
    pub baseline: BaselineStatistic,
    /// ハイライトの最小長（秒）。これ未満はノイズとして除外
    pub min_duration_secs: u64,
    /// 精製するメッセージ数の上限
    pub message_limit: Option<usize>,
    /// コンテキストルールファイルのパス
    pub context_path: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_secs: 10,
            threshold_ratio: 1.0,
            baseline: BaselineStatistic::Mean,
            min_duration_secs: 0,
            message_limit: None,
            context_path: None,
        }
    }
}

/// ログ設定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// ログファイル出力先（Noneの場合はファイル出力しない）
    pub log_dir: Option<PathBuf>,
    /// ログレベル (trace/debug/info/warn/error)
    pub log_level: String,
    /// ファイル出力有効化
    pub enable_file_logging: bool,
    /// ファイル出力をJSON行形式にする
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            log_level: "info".to_string(),
            enable_file_logging: false,
            json_format: false,
        }
    }
}

/// アプリケーション設定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AnalyzerConfig {
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// 種別ごとの密度重み
    #[serde(default)]
    pub weights: KindWeights,

    /// 強度レベルの閾値（ベースライン倍率）
    #[serde(default)]
    pub intensity: IntensityThresholds,

    #[serde(default)]
    pub log: LogConfig,
}

impl AnalyzerConfig {
    /// 設定値の妥当性を検証
    ///
    /// 意味のある出力が得られない設定は処理開始前にエラーとする。
    pub fn validate(&self) -> AnalyzerResult<()> {
        let analysis = &self.analysis;

        if analysis.window_secs == 0 {
            return Err(AnalyzerError::invalid_config(
                "analysis.window_secs",
                "must be greater than 0",
            ));
        }

        if analysis.window_secs > MAX_TIME_OFFSET_SECS {
            return Err(AnalyzerError::invalid_config(
                "analysis.window_secs",
                format!("must not exceed {} seconds", MAX_TIME_OFFSET_SECS),
            ));
        }

        if !analysis.threshold_ratio.is_finite() {
            return Err(AnalyzerError::invalid_config(
                "analysis.threshold_ratio",
                "must be a finite number",
            ));
        }

        if analysis.threshold_ratio <= -1.0 {
            return Err(AnalyzerError::invalid_config(
                "analysis.threshold_ratio",
                format!(
                    "{} makes every window a candidate; must be greater than -1",
                    analysis.threshold_ratio
                ),
            ));
        }

        if analysis.message_limit == Some(0) {
            return Err(AnalyzerError::invalid_config(
                "analysis.message_limit",
                "must be greater than 0 when set",
            ));
        }

        self.weights.validate()?;
        self.intensity.validate()?;

        Ok(())
    }
}

/// 設定管理マネージャー
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// XDGディレクトリ配下の設定ファイルを使う設定マネージャーを作成
    pub fn new() -> AnalyzerResult<Self> {
        let config_path = Self::get_config_path()?;
        Ok(Self { config_path })
    }

    /// 任意のパスの設定ファイルを使う設定マネージャーを作成
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
        }
    }

    /// XDGディレクトリに基づく設定ファイルパスを取得
    fn get_config_path() -> AnalyzerResult<PathBuf> {
        let project_dirs = ProjectDirs::from("dev", "sifyfy", "stream-analyzer").ok_or_else(
            || AnalyzerError::generic("config path", "Failed to get project directories"),
        )?;

        let config_file = project_dirs.config_dir().join("config.toml");
        debug!("Config file path: {}", config_file.display());

        Ok(config_file)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// 設定を読み込み（ファイルがなければデフォルト設定）
    pub fn load_config(&self) -> AnalyzerResult<AnalyzerConfig> {
        if !self.config_path.exists() {
            info!(
                "Config file not found, using default settings: {}",
                self.config_path.display()
            );
            return Ok(AnalyzerConfig::default());
        }

        let config_content = fs::read_to_string(&self.config_path)?;
        let config: AnalyzerConfig = toml::from_str(&config_content)?;

        info!(
            "✅ Configuration loaded from: {}",
            self.config_path.display()
        );

        Ok(config)
    }

    /// 設定を保存
    pub fn save_config(&self, config: &AnalyzerConfig) -> AnalyzerResult<()> {
        let config_content = toml::to_string_pretty(config)
            .map_err(|e| AnalyzerError::generic("serializing config", e.to_string()))?;

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.config_path, config_content)?;

        info!("💾 Configuration saved to: {}", self.config_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = AnalyzerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.analysis.window_secs, 10);
        assert_eq!(config.analysis.threshold_ratio, 1.0);
        assert_eq!(config.analysis.baseline, BaselineStatistic::Mean);
    }

    #[test]
    fn test_zero_window_is_rejected() {
        let mut config = AnalyzerConfig::default();
        config.analysis.window_secs = 0;
        match config.validate() {
            Err(AnalyzerError::InvalidConfiguration { field, .. }) => {
                assert_eq!(field, "analysis.window_secs");
            }
            other => panic!("Expected InvalidConfiguration, got {:?}", other),
        }
    }

    #[test]
    fn test_oversized_window_is_rejected() {
        let mut config = AnalyzerConfig::default();
        config.analysis.window_secs = u64::MAX;
        assert!(config.validate().is_err());

        config.analysis.window_secs = MAX_TIME_OFFSET_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_file_logging_option() {
        assert!(!LogConfig::default().json_format);

        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[log]\nlog_dir = \"logs\"\nenable_file_logging = true\njson_format = true\n",
        )
        .unwrap();

        let config = ConfigManager::with_path(&path).load_config().unwrap();
        assert!(config.log.json_format);
        assert!(config.log.enable_file_logging);
        assert_eq!(config.log.log_level, "info");
    }

    #[test]
    fn test_threshold_ratio_bounds() {
        let mut config = AnalyzerConfig::default();
        config.analysis.threshold_ratio = -1.0;
        assert!(config.validate().is_err());

        config.analysis.threshold_ratio = f64::NAN;
        assert!(config.validate().is_err());

        config.analysis.threshold_ratio = -0.5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_message_limit_is_rejected() {
        let mut config = AnalyzerConfig::default();
        config.analysis.message_limit = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("missing.toml"));
        let config = manager.load_config().unwrap();
        assert_eq!(config, AnalyzerConfig::default());
    }

    #[test]
    fn test_partial_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[analysis]
window_secs = 30
baseline = "median"

[weights]
superchat = 3.0
"#,
        )
        .unwrap();

        let config = ConfigManager::with_path(&path).load_config().unwrap();
        assert_eq!(config.analysis.window_secs, 30);
        assert_eq!(config.analysis.baseline, BaselineStatistic::Median);
        assert_eq!(config.analysis.threshold_ratio, 1.0);
        assert_eq!(config.weights.superchat, 3.0);
        assert_eq!(config.weights.message, 1.0);
        assert_eq!(config.intensity, IntensityThresholds::default());
    }

    #[test]
    fn test_save_and_load_config() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("nested").join("config.toml"));

        let mut config = AnalyzerConfig::default();
        config.analysis.window_secs = 60;
        config.analysis.message_limit = Some(1000);
        manager.save_config(&config).unwrap();

        let loaded = manager.load_config().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "analysis = [not valid").unwrap();

        let result = ConfigManager::with_path(&path).load_config();
        assert!(matches!(result, Err(AnalyzerError::ConfigParse(_))));
    }
}
