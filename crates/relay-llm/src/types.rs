use relay_core::GeneratedImage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LLMChunk {
    Token(String),
    /// Image generated by the model, delivered inline.
    Image(GeneratedImage),
    Usage(TokenUsage),
    Done { finish_reason: Option<String> },
}

impl LLMChunk {
    /// True for chunks that count as response content.
    pub fn is_content(&self) -> bool {
        match self {
            LLMChunk::Token(text) => !text.is_empty(),
            LLMChunk::Image(_) => true,
            LLMChunk::Usage(_) | LLMChunk::Done { .. } => false,
        }
    }
}
