//! Pair summarization through an LLM.

use std::time::Duration;

use async_trait::async_trait;
use relay_core::{ChatMessage, Role};
use relay_llm::{collect_text, LLMError, SharedLLMProvider};

const SUMMARY_INSTRUCTIONS: &str = "You condense earlier parts of a chat conversation so it \
can continue within a limited context window. Preserve decisions, technical details, names, \
numbers and the chronological order of events. Write plain prose in under 200 words. Do not \
add commentary or answer any question in the transcript.";

/// Prefix of the system message that replaces summarized pairs.
pub const SUMMARY_PREFIX: &str = "[Summary of earlier conversation]";

#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize a plain-text transcript.
    async fn summarize(&self, transcript: &str) -> Result<String, LLMError>;
}

/// Replacement message for a batch of summarized pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryResult {
    pub message: ChatMessage,
    pub original_tokens: u32,
    pub summary_tokens: u32,
}

impl SummaryResult {
    pub fn saves_tokens(&self) -> bool {
        self.summary_tokens < self.original_tokens
    }
}

pub fn summary_message(summary: &str) -> ChatMessage {
    ChatMessage::system(format!("{SUMMARY_PREFIX}\n{}", summary.trim()))
}

/// Render messages as a `Role: text` transcript.
pub fn render_transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| {
            let speaker = match m.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
                Role::System => "System",
            };
            let mut text = m.text();
            let images = m.image_count();
            if images > 0 {
                text.push_str(&format!(" [{images} image(s)]"));
            }
            format!("{speaker}: {text}")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Summarizer backed by a streaming chat model.
pub struct LlmSummarizer {
    provider: SharedLLMProvider,
    model: String,
    timeout: Duration,
}

impl LlmSummarizer {
    pub fn new(provider: SharedLLMProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, transcript: &str) -> Result<String, LLMError> {
        let messages = [
            ChatMessage::system(SUMMARY_INSTRUCTIONS),
            ChatMessage::user(format!("Summarize this conversation:\n\n{transcript}")),
        ];

        let call = async {
            let stream = self.provider.chat_stream(&messages, &self.model).await?;
            collect_text(stream).await
        };

        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map(|text| text.trim().to_string()),
            Err(_) => Err(LLMError::Timeout),
        }
    }
}
