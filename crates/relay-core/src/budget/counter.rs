//! Token counting for budget management.
//!
//! Provides heuristic token estimation (chars/4 + 10% margin). An exact
//! tokenizer can be plugged in through [`TokenCounter`].

use crate::message::{ChatMessage, ContentPart};
use std::sync::Arc;

/// Trait for token counting implementations.
pub trait TokenCounter: Send + Sync {
    /// Count tokens in a plain text string.
    fn count_text(&self, text: &str) -> u32;

    /// Count tokens in a single message.
    fn count_message(&self, message: &ChatMessage) -> u32;

    /// Count tokens in multiple messages.
    fn count_messages(&self, messages: &[ChatMessage]) -> u32 {
        messages
            .iter()
            .fold(0u32, |acc, m| acc.saturating_add(self.count_message(m)))
    }
}

/// Heuristic token counter using character-based estimation.
///
/// Uses the approximation: tokens ≈ characters / 4, with a 10% safety margin
/// plus overhead for message metadata and a flat cost per image or audio part.
///
/// This is intentionally conservative to avoid underestimating token usage.
#[derive(Debug, Clone)]
pub struct HeuristicTokenCounter {
    /// Characters per token ratio (default: 4)
    chars_per_token: f64,
    /// Safety margin multiplier (default: 1.1 = 10% extra)
    safety_margin: f64,
    /// Metadata overhead per message in tokens
    metadata_overhead: u32,
    /// Flat cost per image part
    image_tokens: u32,
    /// Flat cost per audio part
    audio_tokens: u32,
}

impl HeuristicTokenCounter {
    /// Create a new heuristic counter with custom text parameters.
    pub fn new(chars_per_token: f64, safety_margin: f64, metadata_overhead: u32) -> Self {
        Self {
            chars_per_token,
            safety_margin,
            metadata_overhead,
            image_tokens: 85,
            audio_tokens: 200,
        }
    }

    /// Create with default parameters (chars/4 + 10% margin + 10 metadata overhead).
    pub fn with_defaults() -> Self {
        Self::new(4.0, 1.1, 10)
    }

    pub fn with_media_costs(mut self, image_tokens: u32, audio_tokens: u32) -> Self {
        self.image_tokens = image_tokens;
        self.audio_tokens = audio_tokens;
        self
    }
}

impl Default for HeuristicTokenCounter {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl TokenCounter for HeuristicTokenCounter {
    fn count_text(&self, text: &str) -> u32 {
        if text.is_empty() {
            return 0;
        }

        let char_count = text.chars().count() as f64;
        let base_tokens = char_count / self.chars_per_token;
        let adjusted_tokens = base_tokens * self.safety_margin;

        adjusted_tokens.ceil() as u32
    }

    fn count_message(&self, message: &ChatMessage) -> u32 {
        let content_tokens = message
            .content
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => self.count_text(text),
                ContentPart::Image { .. } => self.image_tokens,
                ContentPart::Audio { .. } => self.audio_tokens,
            })
            .fold(0u32, |acc, x| acc.saturating_add(x));

        let name_tokens = message
            .name
            .as_deref()
            .map(|name| self.count_text(name))
            .unwrap_or(0);

        content_tokens
            .saturating_add(name_tokens)
            .saturating_add(self.metadata_overhead)
    }
}

/// Arc-wrapped token counter for easy sharing.
pub type SharedTokenCounter = Arc<dyn TokenCounter>;
