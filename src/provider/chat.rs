//! OpenAI 互換 Chat Completions API の共通実装
//!
//! OpenRouter と Groq はどちらも OpenAI 互換の `chat/completions` エンドポイントを
//! 提供しているため、リクエスト・レスポンスの構造と送信処理をここで共有します。
//! 画像は `data:` URL として `image_url` パートに埋め込みます。

use serde::{Deserialize, Serialize};

use crate::config::ProviderKind;
use crate::error::ProviderError;

use super::http::read_json;
use super::traits::{GenerationRequest, ProviderResponse, StopReason, TokenUsage};

/// Chat Completions 呼び出し
pub(crate) async fn complete(
    http: &reqwest::Client,
    provider: ProviderKind,
    url: &str,
    request: GenerationRequest<'_>,
    max_tokens: Option<u32>,
) -> Result<ProviderResponse, ProviderError> {
    let body = ChatRequest {
        model: request.model,
        messages: vec![ChatMessage {
            role: "user",
            content: vec![
                ContentPart::Text {
                    text: request.prompt,
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: request.image.data_url(),
                    },
                },
            ],
        }],
        max_tokens,
    };

    let response = http
        .post(url)
        .bearer_auth(request.credential)
        .json(&body)
        .send()
        .await
        .map_err(|source| ProviderError::Request { provider, source })?;

    let parsed: ChatResponse = read_json(provider, response).await?;

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or(ProviderError::EmptyResponse(provider))?;
    let content = choice
        .message
        .content
        .ok_or(ProviderError::EmptyResponse(provider))?;

    Ok(ProviderResponse {
        content,
        token_usage: parsed
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default(),
        stop_reason: StopReason::from_finish_reason(choice.finish_reason.as_deref()),
        model: parsed.model.unwrap_or_else(|| request.model.to_string()),
    })
}

// --- OpenAI 互換のリクエスト / レスポンス構造 ---

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}
