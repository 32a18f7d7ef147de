//! OpenRouter クライアント
//!
//! `POST {base_url}/api/v1/chat/completions`（Bearer 認証、単一キー）

use async_trait::async_trait;

use crate::config::ProviderKind;
use crate::error::ProviderError;

use super::chat;
use super::traits::{GenerationRequest, ProviderClient, ProviderResponse};

const DEFAULT_BASE_URL: &str = "https://openrouter.ai";

/// OpenRouter クライアント
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    http: reqwest::Client,
    base_url: String,
}

impl OpenRouterClient {
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
impl ProviderClient for OpenRouterClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenRouter
    }

    async fn generate(&self, request: GenerationRequest<'_>) -> Result<ProviderResponse, ProviderError> {
        let url = format!("{}/api/v1/chat/completions", self.base_url);
        chat::complete(&self.http, ProviderKind::OpenRouter, &url, request, None).await
    }
}
