//! AIプロバイダー抽象化レイヤー
//!
//! # 責務
//!
//! - 複数のAIプロバイダー（Gemini, OpenRouter, Groq）を統一的に扱うインターフェースを提供
//! - プロバイダーの種類に応じた適切なクライアントを生成するファクトリー機能
//! - 認証情報のローテーション（台帳）とフェイルオーバー
//!
//! # モジュール構成
//!
//! - `traits` - 共通インターフェース（[`ProviderClient`]トレイト等）
//! - `gemini` - Google Gemini `generateContent` クライアント
//! - `openrouter` / `groq` - OpenAI 互換 Chat Completions クライアント（`chat` を共有）
//! - `ledger` - 認証情報カーソルの台帳と永続化
//! - `failover` - タイムアウトとキーローテーション付きの呼び出し
//!
//! # 使用例
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use teeflow::adapter::ImageData;
//! use teeflow::config::ProviderKind;
//! use teeflow::provider::{create_provider, Credentials, FailoverDriver};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = create_provider(ProviderKind::Groq, reqwest::Client::new());
//!     let driver = FailoverDriver::new(
//!         client,
//!         Credentials::Single("gsk-...".to_string()),
//!         "mixtral-8x7b-32768",
//!         Duration::from_secs(30),
//!     );
//!
//!     let image = ImageData::new("design.png", std::fs::read("design.png")?);
//!     let response = driver.invoke(&image, "Describe this design as JSON.").await?;
//!
//!     println!("Response: {}", response.content);
//!     Ok(())
//! }
//! ```

pub mod traits;
pub mod gemini;
pub mod openrouter;
pub mod groq;
pub mod ledger;
pub mod failover;
mod chat;
mod http;

// 公開APIの再エクスポート
pub use traits::{GenerationRequest, ProviderClient, ProviderResponse, StopReason, TokenUsage};
pub use ledger::{CredentialLedger, CursorStore, FileCursorStore, MemoryCursorStore};
pub use failover::{Credentials, FailoverDriver, race_timeout};

use std::sync::Arc;

use crate::config::ProviderKind;

/// プロバイダークライアントを生成するファクトリー関数
///
/// HTTP クライアントはコネクションプールを共有するため呼び出し側から渡します。
/// 認証情報はクライアントに保持させず、呼び出しごとに
/// [`GenerationRequest::credential`] で渡します。
///
/// # 例
///
/// ```rust,no_run
/// use teeflow::config::ProviderKind;
/// use teeflow::provider::create_provider;
///
/// let client = create_provider(ProviderKind::Gemini, reqwest::Client::new());
/// assert_eq!(client.kind(), ProviderKind::Gemini);
/// ```
pub fn create_provider(kind: ProviderKind, http: reqwest::Client) -> Arc<dyn ProviderClient> {
    match kind {
        ProviderKind::Gemini => Arc::new(gemini::GeminiClient::new(http)),
        ProviderKind::OpenRouter => Arc::new(openrouter::OpenRouterClient::new(http)),
        ProviderKind::Groq => Arc::new(groq::GroqClient::new(http)),
    }
}
