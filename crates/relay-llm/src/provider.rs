use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use relay_core::ChatMessage;

use crate::error::{LLMError, Result};
use crate::types::LLMChunk;

pub type LLMStream = Pin<Box<dyn Stream<Item = Result<LLMChunk>> + Send>>;

#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Stream a chat completion from `model`.
    ///
    /// Errors before the first byte (bad status, auth, connect) are returned
    /// directly; failures after that arrive as stream items.
    async fn chat_stream(&self, messages: &[ChatMessage], model: &str) -> Result<LLMStream>;
}

pub type SharedLLMProvider = Arc<dyn LLMProvider>;

/// Drain a stream into its text. A stream with no text is an
/// [`LLMError::EmptyResponse`].
pub async fn collect_text(mut stream: LLMStream) -> Result<String> {
    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        match chunk? {
            LLMChunk::Token(token) => text.push_str(&token),
            LLMChunk::Done { .. } => break,
            LLMChunk::Image(_) | LLMChunk::Usage(_) => {}
        }
    }

    if text.trim().is_empty() {
        return Err(LLMError::EmptyResponse);
    }
    Ok(text)
}
