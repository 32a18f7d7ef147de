//! Google Gemini クライアント
//!
//! # 責務
//!
//! - Gemini `generateContent` API との通信を担当
//! - [`ProviderClient`] トレイトを実装し、統一インターフェースを提供
//! - Gemini 固有の JSON 形式と共通型の変換
//!
//! # リクエスト形式
//!
//! `POST {base_url}/v1beta/models/{model}:generateContent`
//! （API キーは `x-goog-api-key` ヘッダー）
//!
//! ```json
//! {
//!   "contents": [{
//!     "parts": [
//!       {"text": "..."},
//!       {"inline_data": {"mime_type": "image/jpeg", "data": "<base64>"}}
//!     ]
//!   }]
//! }
//! ```
//!
//! 候補が返されない場合は `promptFeedback.blockReason` をエラーとして報告します。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ProviderKind;
use crate::error::ProviderError;

use super::http::read_json;
use super::traits::{GenerationRequest, ProviderClient, ProviderResponse, StopReason, TokenUsage};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini クライアント
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_base_url(http, DEFAULT_BASE_URL)
    }

    /// 接続先を指定してクライアントを生成（テストやプロキシ経由の利用向け）
    pub fn with_base_url(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl ProviderClient for GeminiClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn generate(&self, request: GenerationRequest<'_>) -> Result<ProviderResponse, ProviderError> {
        let body = GeminiRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: request.prompt.to_string(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: request.image.mime_type.clone(),
                            data: request.image.base64(),
                        },
                    },
                ],
            }],
        };

        let response = self
            .http
            .post(self.endpoint(request.model))
            .header("x-goog-api-key", request.credential)
            .json(&body)
            .send()
            .await
            .map_err(|source| ProviderError::Request {
                provider: ProviderKind::Gemini,
                source,
            })?;

        let parsed: GeminiResponse = read_json(ProviderKind::Gemini, response).await?;

        let Some(candidate) = parsed.candidates.into_iter().next() else {
            return Err(match parsed.prompt_feedback.and_then(|f| f.block_reason) {
                Some(reason) => ProviderError::Blocked(reason),
                None => ProviderError::EmptyResponse(ProviderKind::Gemini),
            });
        };

        let content = candidate
            .content
            .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
            .ok_or(ProviderError::EmptyResponse(ProviderKind::Gemini))?;

        let token_usage = parsed
            .usage_metadata
            .map(|u| TokenUsage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();

        Ok(ProviderResponse {
            content,
            token_usage,
            stop_reason: StopReason::from_finish_reason(candidate.finish_reason.as_deref()),
            model: parsed.model_version.unwrap_or_else(|| request.model.to_string()),
        })
    }
}

// --- Gemini 固有のリクエスト / レスポンス構造 ---

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::ImageData;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MODEL: &str = "gemini-2.0-flash";

    fn image() -> ImageData {
        ImageData::new("https://example.com/design.png", b"png-bytes".to_vec())
    }

    async fn call(server: &MockServer) -> Result<ProviderResponse, ProviderError> {
        let client = GeminiClient::with_base_url(reqwest::Client::new(), server.uri());
        let image = image();
        client
            .generate(GenerationRequest {
                credential: "key-1",
                model: MODEL,
                prompt: "describe",
                image: &image,
            })
            .await
    }

    #[tokio::test]
    async fn test_generate_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1beta/models/{MODEL}:generateContent")))
            .and(header("x-goog-api-key", "key-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"parts": [{"text": "{\"title\": \"Cat\"}"}]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {"promptTokenCount": 120, "candidatesTokenCount": 40}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = call(&server).await.unwrap();

        assert_eq!(response.content, "{\"title\": \"Cat\"}");
        assert_eq!(response.token_usage.total(), 160);
        assert_eq!(response.stop_reason, StopReason::EndTurn);
        assert_eq!(response.model, MODEL);
    }

    #[tokio::test]
    async fn test_invalid_key_is_retryable_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": 400, "message": "API key not valid. Please pass a valid API key."}
            })))
            .mount(&server)
            .await;

        let err = call(&server).await.unwrap_err();

        assert!(matches!(err, ProviderError::Api { status: 400, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_blocked_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "promptFeedback": {"blockReason": "SAFETY"}
            })))
            .mount(&server)
            .await;

        let err = call(&server).await.unwrap_err();

        assert!(matches!(err, ProviderError::Blocked(ref reason) if reason == "SAFETY"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_non_json_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
            .mount(&server)
            .await;

        let err = call(&server).await.unwrap_err();

        assert!(matches!(err, ProviderError::Api { status: 429, .. }));
        assert!(err.is_retryable());
    }
}
