// 共通ユーティリティ関数

use crate::config::LogConfig;
use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::time::LocalTime, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// 正規化時に除去する記号（ASCII句読点）
pub const PUNCTUATION: &str = r##"!"#$%&'()*+,-./:;<=>?@[\]^_`{|}~"##;

/// ログ初期化
///
/// `RUST_LOG` が設定されていればそちらを優先する。ファイル出力が有効な場合は
/// 日次ローテーションのファイルレイヤー（ローカル時刻、`json_format` でJSON行）を
/// 追加し、そのガードを返す。
/// ガードを破棄するとファイルへの書き込みが止まるため、呼び出し側で保持すること。
pub fn init_logging(config: &LogConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let (file_layer, guard) = match (&config.log_dir, config.enable_file_logging) {
        (Some(dir), true) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, "stream-analyzer.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_timer(LocalTime::rfc_3339());
            let layer = if config.json_format {
                layer.json().boxed()
            } else {
                layer.boxed()
            };
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init()?;

    debug!(
        log_level = %config.log_level,
        file_logging = guard.is_some(),
        json = config.json_format,
        "Logging initialized"
    );

    Ok(guard)
}

/// 秒数を `H:MM:SS` 形式に変換
pub fn format_hms(seconds: u64) -> String {
    format!(
        "{}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

/// テキストの正規化
///
/// 空白で分割した各トークンについて、記号のみのトークン（顔文字など）はそのまま残し、
/// それ以外は小文字化して記号を除去する。トークンは単一の空白で連結する。
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .filter_map(|token| {
            if token.chars().all(|c| PUNCTUATION.contains(c)) {
                return Some(token.to_string());
            }
            let cleaned: String = token
                .to_lowercase()
                .chars()
                .filter(|c| !PUNCTUATION.contains(*c))
                .collect();
            (!cleaned.is_empty()).then_some(cleaned)
        })
        .collect::<Vec<_>>()
        .join(" ")
}
