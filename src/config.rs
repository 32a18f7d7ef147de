//! 設定の読み込みと管理
//!
//! # モジュール構成
//!
//! - `dto` - TOML デシリアライズ専用の生データ（内部用）
//! - `settings` - バリデーション済みの [`Settings`]
//! - `provider` - AI プロバイダーの種類 [`ProviderKind`]
//!
//! 設定ストアは [`SettingsStore`] として抽象化され、オーケストレーターは
//! 実行開始時に一度だけスナップショットを取得します。

mod dto;
pub mod provider;
pub mod settings;

use std::path::PathBuf;

pub use provider::ProviderKind;
pub use settings::{AI_DECIDE, ColorPin, DescriptionLength, Settings};

use crate::error::ConfigError;

/// 設定ストア
pub trait SettingsStore: Send + Sync {
    /// 現在の設定のスナップショットを返す
    fn snapshot(&self) -> Result<Settings, ConfigError>;
}

/// メモリ上の固定設定
#[derive(Debug, Clone)]
pub struct StaticSettings(pub Settings);

impl SettingsStore for StaticSettings {
    fn snapshot(&self) -> Result<Settings, ConfigError> {
        Ok(self.0.clone())
    }
}

/// TOML ファイルに保存された設定
///
/// スナップショットのたびにファイルを読み直すため、実行と実行の間に
/// 編集された内容は次の実行から反映されます。
#[derive(Debug, Clone)]
pub struct FileSettings {
    path: PathBuf,
}

impl FileSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SettingsStore for FileSettings {
    fn snapshot(&self) -> Result<Settings, ConfigError> {
        Settings::from_file(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_settings_reads_latest_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "autoflow_count = 2\n").unwrap();

        let store = FileSettings::new(&path);
        assert_eq!(store.snapshot().unwrap().autoflow_count(), 2);

        std::fs::write(&path, "autoflow_count = 9\n").unwrap();
        assert_eq!(store.snapshot().unwrap().autoflow_count(), 9);
    }

    #[test]
    fn test_file_settings_missing_file() {
        let store = FileSettings::new("/nonexistent/teeflow/settings.toml");
        assert!(matches!(store.snapshot(), Err(ConfigError::FileRead(_))));
    }

    #[test]
    fn test_settings_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.toml");
        let settings = Settings::from_toml("auto_publish = true").unwrap();

        settings.to_file(&path).unwrap();

        assert!(Settings::from_file(&path).unwrap().auto_publish());
    }
}
