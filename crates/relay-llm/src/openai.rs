use std::time::Duration;

use async_trait::async_trait;
use relay_core::{ChatMessage, ModelSettings};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response, StatusCode};

use crate::error::{LLMError, Result};
use crate::openai_compat::{build_openai_compat_body, parse_openai_compat_sse_data};
use crate::provider::{LLMProvider, LLMStream};
use crate::sse::llm_stream_from_sse;

/// Streaming client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAIProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl OpenAIProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: Some(api_key.into()),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    pub fn from_settings(settings: &ModelSettings) -> Self {
        Self {
            client: Client::new(),
            api_key: settings.api_key.clone(),
            base_url: settings.api_base.clone(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

fn parse_retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

async fn error_from_response(response: Response) -> LLMError {
    let status = response.status();
    let retry_after = parse_retry_after(&response);
    let text = response.text().await.unwrap_or_default();

    match status {
        StatusCode::TOO_MANY_REQUESTS => LLMError::RateLimited { retry_after },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LLMError::Auth(text),
        _ => LLMError::Http {
            status: status.as_u16(),
            message: text,
        },
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn chat_stream(&self, messages: &[ChatMessage], model: &str) -> Result<LLMStream> {
        let body = build_openai_compat_body(model, messages);

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        log::debug!("Starting chat stream: model={}, messages={}", model, messages.len());
        let response = request.send().await?;

        if !response.status().is_success() {
            let err = error_from_response(response).await;
            log::warn!("Chat stream rejected for model {}: {}", model, err);
            return Err(err);
        }

        Ok(llm_stream_from_sse(response, |_event, data| {
            parse_openai_compat_sse_data(data)
        }))
    }
}
