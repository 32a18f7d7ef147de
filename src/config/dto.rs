//! TOML デシリアライズ用の DTO (Data Transfer Object)
//!
//! # 責務
//!
//! このモジュールは、設定ファイル（フラットな key = value の TOML）からの
//! データ読み込み専用の構造体を提供します。
//! DTO はバリデーション前の「生データ」を表現し、ドメインモデルとは分離されています。
//!
//! ## 設計思想
//!
//! - **単一責務**: TOML のデシリアライズのみを担当
//! - **バリデーション前の状態**: 未設定・不正なデータも一旦受け入れる
//! - **カプセル化**: config モジュール内部のみで使用（外部非公開）
//!
//! ## 変換フロー
//!
//! ```text
//! TOML ファイル
//!   ↓ (デシリアライズ)
//! SettingsDto
//!   ↓ (TryFrom でバリデーション & デフォルト値の補完)
//! Settings (ドメインモデル)
//! ```

use serde::{Deserialize, Serialize};

/// 設定 DTO
///
/// すべてのキーは省略可能です。省略時のデフォルト値は
/// [`Settings`](super::settings::Settings) への変換時に補完されます。
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub(super) struct SettingsDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) ai_provider: Option<String>,
    pub(super) gemini_keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) gemini_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) openrouter_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) openrouter_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) groq_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) groq_model: Option<String>,

    // 色のピン留め（"AI_DECIDE" または色名）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) tshirt_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) hoodie_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) tank_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) crewneck_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) longsleeve_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) baseball_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) kids_tshirt_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) kids_hoodie_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) kids_longsleeve_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) enable_kids: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) mature_content: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) product_colors: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) supporting_tags_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) description_length: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) avoid_copyright: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) autoflow_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) autoflow_delay: Option<DelayDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) auto_publish: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) provider_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) navigation_timeout_secs: Option<u64>,
}

/// `autoflow_delay` は文字列（"random" / "8"）と整数の両方を受け付ける
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub(super) enum DelayDto {
    Seconds(u64),
    Text(String),
}
