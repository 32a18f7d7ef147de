//! メタデータ取得パイプライン
//!
//! # 責務
//!
//! 1 枚のデザイン画像から [`MetadataRecord`] を作るまでの一連の処理を担当します。
//!
//! 1. 設定とヒントからプロンプトを組み立てる（[`PromptBuilder`]）
//! 2. フェイルオーバー付きでプロバイダーを呼び出す（[`FailoverDriver`]）
//! 3. 応答をパースする（失敗時はデフォルトレコード）
//! 4. 色を検証する
//! 5. 禁止語を取り除く
//!
//! [`MetadataPipeline::generate`] は失敗しません。内部で起きたエラーは
//! ログに記録し、デフォルトレコードで置き換えます。

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::adapter::ImageData;
use crate::config::{ProviderKind, Settings};
use crate::engine::events::EventSink;
use crate::error::{LedgerError, ProviderError};
use crate::provider::{
    CredentialLedger, Credentials, CursorStore, FailoverDriver, ProviderClient, ProviderResponse, StopReason,
    create_provider,
};

use super::filter::{FieldKind, filter_denylisted};
use super::parse::parse_metadata;
use super::prompt::{PromptBuilder, TagHints};
use super::record::{MetadataRecord, dedup_tags, validate_colors};

/// メタデータ取得パイプライン
///
/// 先読みタスクからも使われるため `Arc` で共有される前提です。
pub struct MetadataPipeline {
    clients: BTreeMap<ProviderKind, Arc<dyn ProviderClient>>,
    cursor_store: Arc<dyn CursorStore>,
    events: EventSink,
}

impl MetadataPipeline {
    /// 全プロバイダーの標準クライアントでパイプラインを作る
    pub fn new(http: reqwest::Client, cursor_store: Arc<dyn CursorStore>, events: EventSink) -> Self {
        let clients = ProviderKind::ALL
            .into_iter()
            .map(|kind| (kind, create_provider(kind, http.clone())))
            .collect();
        Self {
            clients,
            cursor_store,
            events,
        }
    }

    /// 特定プロバイダーのクライアントを差し替える
    pub fn with_client(mut self, client: Arc<dyn ProviderClient>) -> Self {
        self.clients.insert(client.kind(), client);
        self
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }

    /// 実行開始時の準備
    ///
    /// ローテーション対象のプロバイダーで、前回の実行ですべてのキーが
    /// 失敗済みになっていればカーソルを先頭に戻します。
    pub fn prepare_run(&self, settings: &Settings) -> Result<(), LedgerError> {
        let kind = settings.provider();
        if !kind.rotates_credentials() || settings.gemini_keys().is_empty() {
            return Ok(());
        }

        let ledger = CredentialLedger::new(kind, settings.gemini_keys().to_vec(), self.cursor_store.clone());
        if ledger.reset_if_exhausted()? {
            self.events
                .log(format!("All {kind} API keys failed last time. Starting again from the first key."));
        }
        Ok(())
    }

    /// 画像からメタデータを生成する
    pub async fn generate(&self, settings: &Settings, image: &ImageData, hints: &TagHints) -> MetadataRecord {
        let prompt = PromptBuilder::new(settings).build(hints);

        let raw = match self.request(settings, image, &prompt).await {
            Ok(response) => {
                debug!(
                    model = %response.model,
                    input_tokens = response.token_usage.input_tokens,
                    output_tokens = response.token_usage.output_tokens,
                    total_tokens = response.token_usage.total(),
                    "provider response received"
                );
                if response.stop_reason == StopReason::MaxTokens {
                    self.events
                        .warn("AI response was cut off at the token limit. The metadata may be incomplete.");
                }
                response.content
            }
            Err(e) => {
                self.events
                    .warn(format!("AI request failed: {e}. Using default metadata."));
                return MetadataRecord::fallback();
            }
        };

        let mut record = match parse_metadata(&raw) {
            Ok(record) => record,
            Err(e) => {
                self.events
                    .warn(format!("Could not parse AI response: {e}. Using default metadata."));
                return MetadataRecord::fallback();
            }
        };

        let repaired = validate_colors(&mut record);
        if !repaired.is_empty() {
            debug!(?repaired, "invalid colors replaced with defaults");
        }

        apply_content_filter(&mut record);
        record
    }

    async fn request(
        &self,
        settings: &Settings,
        image: &ImageData,
        prompt: &str,
    ) -> Result<ProviderResponse, ProviderError> {
        let kind = settings.provider();
        let client = self
            .clients
            .get(&kind)
            .cloned()
            .ok_or(ProviderError::MissingCredential(kind))?;
        let credentials = Credentials::from_settings(settings, kind, self.cursor_store.clone())?;

        self.events.log(format!("Generating metadata with {kind}..."));
        let driver = FailoverDriver::new(client, credentials, settings.model(kind), settings.provider_timeout());
        driver.invoke(image, prompt).await
    }
}

/// 全テキストフィールドから禁止語を取り除く
fn apply_content_filter(record: &mut MetadataRecord) {
    for field in [&mut record.title, &mut record.description, &mut record.main_tag] {
        if let Some(filtered) = removed(field, FieldKind::Text) {
            *field = filtered;
        }
    }

    if let Some(filtered) = removed(&record.tags_line(), FieldKind::Tags) {
        record.supporting_tags = dedup_tags(filtered.split(','));
    }
}

/// 禁止語を取り除いた場合だけ新しい文字列を返す
fn removed(text: &str, kind: FieldKind) -> Option<String> {
    match filter_denylisted(text, kind) {
        Cow::Owned(filtered) => Some(filtered),
        Cow::Borrowed(_) => None,
    }
}
