//! Groq クライアント
//!
//! `POST {base_url}/openai/v1/chat/completions`（Bearer 認証、単一キー）。
//! Groq は出力長の上限を明示しないと短く打ち切ることがあるため `max_tokens` を指定します。

use async_trait::async_trait;

use crate::config::ProviderKind;
use crate::error::ProviderError;

use super::chat;
use super::traits::{GenerationRequest, ProviderClient, ProviderResponse};

const DEFAULT_BASE_URL: &str = "https://api.groq.com";

const MAX_TOKENS: u32 = 2048;

/// Groq クライアント
#[derive(Debug, Clone)]
pub struct GroqClient {
    http: reqwest::Client,
    base_url: String,
}

impl GroqClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_base_url(http, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ProviderClient for GroqClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Groq
    }

    async fn generate(&self, request: GenerationRequest<'_>) -> Result<ProviderResponse, ProviderError> {
        let url = format!("{}/openai/v1/chat/completions", self.base_url);
        chat::complete(&self.http, ProviderKind::Groq, &url, request, Some(MAX_TOKENS)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::ImageData;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_sends_max_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/v1/chat/completions"))
            .and(body_partial_json(json!({"max_tokens": 2048})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "{}"}, "finish_reason": "length"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GroqClient::with_base_url(reqwest::Client::new(), server.uri());
        let image = ImageData::new("local", vec![0]);
        let response = client
            .generate(GenerationRequest {
                credential: "gsk",
                model: "llama",
                prompt: "p",
                image: &image,
            })
            .await
            .unwrap();

        assert_eq!(response.content, "{}");
        assert_eq!(response.model, "llama");
    }

    #[tokio::test]
    async fn test_rate_limit_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {"message": "Rate limit reached for model", "type": "tokens"}
            })))
            .mount(&server)
            .await;

        let client = GroqClient::with_base_url(reqwest::Client::new(), server.uri());
        let image = ImageData::new("local", vec![0]);
        let err = client
            .generate(GenerationRequest {
                credential: "gsk",
                model: "llama",
                prompt: "p",
                image: &image,
            })
            .await
            .unwrap_err();

        assert!(err.is_retryable());
    }
}
