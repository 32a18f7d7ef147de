//! ログ出力の初期化
//!
//! `tracing` のイベントを `tracing-subscriber` の fmt レイヤーで整形し、
//! `tracing-appender` のノンブロッキングライター経由で出力します。
//!
//! | 指定 | 出力先 |
//! |------|--------|
//! | `log_dir` なし | 標準エラー出力 |
//! | `log_dir` あり | `<log_dir>/teeflow.log.YYYY-MM-DD`（日次ローテーション） |
//!
//! 返される [`WorkerGuard`] が drop されるとバッファがフラッシュされるため、
//! プロセス終了まで保持してください。

use std::path::PathBuf;

use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;

/// ログファイル名の接頭辞
const LOG_FILE_PREFIX: &str = "teeflow.log";

/// ログ出力の設定
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub level: LevelFilter,
    /// JSON 形式で出力するか
    pub json: bool,
    pub log_dir: Option<PathBuf>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            json: false,
            log_dir: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("ログ出力の初期化に失敗しました: {0}")]
    Init(String),
}

/// グローバルな subscriber を設定する
pub fn init(config: &TelemetryConfig) -> Result<WorkerGuard, TelemetryError> {
    let (writer, guard) = match &config.log_dir {
        Some(dir) => tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX)),
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    let builder = tracing_subscriber::fmt()
        .with_max_level(config.level)
        .with_writer(writer)
        .with_ansi(config.log_dir.is_none() && !config.json);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
    result.map_err(|e| TelemetryError::Init(e.to_string()))?;

    Ok(guard)
}

/// 詳細度フラグの数からログレベルを決める
pub fn level_from_verbosity(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::WARN;
    }
    match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_verbosity() {
        assert_eq!(level_from_verbosity(0, false), LevelFilter::INFO);
        assert_eq!(level_from_verbosity(1, false), LevelFilter::DEBUG);
        assert_eq!(level_from_verbosity(3, false), LevelFilter::TRACE);
        assert_eq!(level_from_verbosity(2, true), LevelFilter::WARN);
    }

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.level, LevelFilter::INFO);
        assert!(!config.json);
        assert!(config.log_dir.is_none());
    }
}
