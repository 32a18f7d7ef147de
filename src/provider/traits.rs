//! AIプロバイダーの共通インターフェース定義
//!
//! # 責務
//!
//! - AIプロバイダー（Gemini, OpenRouter, Groq）の共通トレイト [`ProviderClient`] を定義
//! - プロバイダー非依存のリクエスト [`GenerationRequest`] とレスポンス [`ProviderResponse`] を提供
//! - トークン使用量 [`TokenUsage`] と停止理由 [`StopReason`] の型を定義
//!
//! 認証情報は呼び出しごとに [`GenerationRequest::credential`] で渡します。
//! どの認証情報を使うかはフェイルオーバードライバーが決めるため、
//! クライアント自身は API キーを保持しません。
//!
//! # 使用例
//!
//! ```rust,no_run
//! use teeflow::adapter::ImageData;
//! use teeflow::provider::{GenerationRequest, ProviderClient};
//!
//! async fn example(client: &dyn ProviderClient, image: &ImageData) {
//!     let response = client.generate(GenerationRequest {
//!         credential: "api-key",
//!         model: "gemini-2.0-flash",
//!         prompt: "Describe this design as JSON.",
//!         image,
//!     }).await.unwrap();
//!
//!     println!("Response: {}", response.content);
//!     println!("Tokens: {} in, {} out",
//!         response.token_usage.input_tokens,
//!         response.token_usage.output_tokens
//!     );
//! }
//! ```

use async_trait::async_trait;

use crate::adapter::ImageData;
use crate::config::ProviderKind;
use crate::error::ProviderError;

/// AIプロバイダーの共通インターフェース
///
/// # 実装要件
///
/// - `Send + Sync`: 先読みタスクから共有されるため
/// - 非同期実行対応（`async_trait`を使用）
/// - キャンセル安全であること（タイムアウト時に future が drop される）
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// このクライアントが担当するプロバイダー
    fn kind(&self) -> ProviderKind;

    /// プロンプトと画像を送信し、生成テキストを取得する
    ///
    /// # エラー
    ///
    /// - [`ProviderError::Api`] - API がエラーを返した
    /// - [`ProviderError::Request`] - 通信エラー
    /// - [`ProviderError::Blocked`] - 安全フィルター等でブロックされた
    /// - [`ProviderError::EmptyResponse`] - 候補が返されなかった
    /// - [`ProviderError::InvalidResponse`] - 不正なレスポンス
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<ProviderResponse, ProviderError>;
}

/// 1 回分の生成リクエスト
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    /// 今回の試行で使う API キー
    pub credential: &'a str,
    /// モデル名
    pub model: &'a str,
    pub prompt: &'a str,
    pub image: &'a ImageData,
}

/// AIプロバイダーからのレスポンス
///
/// プロバイダー固有のレスポンス形式を共通の型に変換したもの。
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// モデルが生成したテキスト（JSON を含むことが期待される）
    pub content: String,

    /// トークン使用量（プロバイダーが返さない場合は 0）
    pub token_usage: TokenUsage,

    /// 生成停止理由
    pub stop_reason: StopReason,

    /// 使用されたモデル名
    pub model: String,
}

/// トークン使用量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct TokenUsage {
    /// 入力トークン数（プロンプト + 画像）
    pub input_tokens: u32,

    /// 出力トークン数
    pub output_tokens: u32,
}

impl TokenUsage {
    /// 総トークン数を計算
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// 生成停止理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// 自然な終了
    EndTurn,

    /// 最大トークン数到達
    MaxTokens,

    /// コンテンツフィルター発動
    ContentFilter,

    /// 不明な理由
    Unknown,
}

impl StopReason {
    /// Gemini の `finishReason` / OpenAI 互換 API の `finish_reason` から変換
    pub fn from_finish_reason(reason: Option<&str>) -> Self {
        match reason.map(str::to_ascii_lowercase).as_deref() {
            Some("stop") | Some("end_turn") => StopReason::EndTurn,
            Some("max_tokens") | Some("length") => StopReason::MaxTokens,
            Some("safety") | Some("content_filter") | Some("blocklist") => StopReason::ContentFilter,
            _ => StopReason::Unknown,
        }
    }
}
