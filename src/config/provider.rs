//! AIプロバイダーの種類
//!
//! 設定ファイルの `ai_provider` キーの値と 1 対 1 に対応します。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// AI プロバイダー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google Gemini（複数 API キーのローテーションに対応）
    Gemini,
    /// OpenRouter（単一キー）
    OpenRouter,
    /// Groq（単一キー）
    Groq,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [ProviderKind::Gemini, ProviderKind::OpenRouter, ProviderKind::Groq];

    /// 設定ファイル上の名前
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::Groq => "groq",
        }
    }

    /// 複数の認証情報をローテーションするプロバイダーかどうか
    pub fn rotates_credentials(&self) -> bool {
        matches!(self, ProviderKind::Gemini)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProviderKind::Gemini => "Gemini",
            ProviderKind::OpenRouter => "OpenRouter",
            ProviderKind::Groq => "Groq",
        };
        f.write_str(label)
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| ConfigError::Validation(format!("未対応の AI プロバイダーです: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        assert_eq!("gemini".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        assert_eq!(" OpenRouter ".parse::<ProviderKind>().unwrap(), ProviderKind::OpenRouter);
        assert!("claude".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_only_gemini_rotates() {
        assert!(ProviderKind::Gemini.rotates_credentials());
        assert!(!ProviderKind::Groq.rotates_credentials());
    }
}
