//! フェイルオーバードライバー
//!
//! # 責務
//!
//! - 1 回分の生成要求を、認証情報のローテーションとタイムアウト付きで実行する
//! - リトライ可能なエラーでは台帳のカーソルを進めて次のキーを試す
//! - 致命的なエラーや成功時はカーソルを動かさずに結果を返す
//!
//! # 動作
//!
//! | 状況 | 動作 |
//! |------|------|
//! | `cursor >= len` | カーソルを 0 に戻し [`ProviderError::CredentialsExhausted`] |
//! | 成功 | そのまま返す（カーソル据え置き） |
//! | Retryable | `cursor + 1` を保存してから次のキーへ |
//! | Fatal | 即座に返す（カーソル据え置き） |
//!
//! すべての試行は [`race_timeout`] を通り、期限切れの場合は送信中の
//! リクエスト future が drop されます。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::adapter::ImageData;
use crate::config::{ProviderKind, Settings};
use crate::error::ProviderError;

use super::ledger::{CredentialLedger, CursorStore};
use super::traits::{GenerationRequest, ProviderClient, ProviderResponse};

/// 試行に使う認証情報
#[derive(Debug, Clone)]
pub enum Credentials {
    /// 単一キー（OpenRouter / Groq）
    Single(String),
    /// 台帳によるローテーション（Gemini）
    Rotating(CredentialLedger),
}

impl Credentials {
    /// 設定から、指定プロバイダーの認証情報を組み立てる
    pub fn from_settings(
        settings: &Settings,
        kind: ProviderKind,
        store: Arc<dyn CursorStore>,
    ) -> Result<Self, ProviderError> {
        if kind.rotates_credentials() {
            if settings.gemini_keys().is_empty() {
                return Err(ProviderError::MissingCredential(kind));
            }
            return Ok(Credentials::Rotating(CredentialLedger::new(
                kind,
                settings.gemini_keys().to_vec(),
                store,
            )));
        }

        settings
            .single_credential(kind)
            .map(|key| Credentials::Single(key.to_string()))
            .ok_or(ProviderError::MissingCredential(kind))
    }
}

/// future をタイムアウトと競争させる
///
/// 期限切れの場合 `fut` は drop され、[`ProviderError::Timeout`] を返します。
pub async fn race_timeout<T, F>(provider: ProviderKind, limit: Duration, fut: F) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout {
            provider,
            secs: limit.as_secs(),
        }),
    }
}

/// 認証情報のフェイルオーバー付きでプロバイダーを呼び出す
pub struct FailoverDriver {
    client: Arc<dyn ProviderClient>,
    credentials: Credentials,
    model: String,
    timeout: Duration,
}

impl FailoverDriver {
    pub fn new(
        client: Arc<dyn ProviderClient>,
        credentials: Credentials,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            credentials,
            model: model.into(),
            timeout,
        }
    }

    /// 画像とプロンプトを送信する
    pub async fn invoke(&self, image: &ImageData, prompt: &str) -> Result<ProviderResponse, ProviderError> {
        match &self.credentials {
            Credentials::Single(key) => self.attempt(key, image, prompt).await,
            Credentials::Rotating(ledger) => self.invoke_rotating(ledger, image, prompt).await,
        }
    }

    async fn invoke_rotating(
        &self,
        ledger: &CredentialLedger,
        image: &ImageData,
        prompt: &str,
    ) -> Result<ProviderResponse, ProviderError> {
        let provider = self.client.kind();
        let mut cursor = ledger.load_cursor().await?;

        loop {
            let Some(key) = ledger.credential(cursor) else {
                ledger.commit_reset().await?;
                return Err(ProviderError::CredentialsExhausted {
                    provider,
                    attempted: ledger.len(),
                });
            };

            debug!(%provider, cursor, "provider attempt");
            match self.attempt(key, image, prompt).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() => {
                    warn!(%provider, cursor, error = %e, "API key failed, rotating to the next key");
                    cursor = ledger.commit_advance(cursor).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn attempt(&self, credential: &str, image: &ImageData, prompt: &str) -> Result<ProviderResponse, ProviderError> {
        let request = GenerationRequest {
            credential,
            model: &self.model,
            prompt,
            image,
        };
        race_timeout(self.client.kind(), self.timeout, self.client.generate(request)).await
    }
}
