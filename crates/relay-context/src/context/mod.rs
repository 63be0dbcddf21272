//! Token-budget context management.
//!
//! When a conversation estimate crosses `trigger_threshold × context window`,
//! the oldest user/assistant pairs are replaced by LLM summaries until the
//! estimate fits. Whatever still does not fit is cut from the newest user
//! message, then from the largest remaining turns.

mod pairs;
mod retry;
mod summarizer;
mod truncate;

use std::cmp::Reverse;
use std::sync::Arc;

use relay_core::{ChatMessage, ContextSettings, ModelLimitsRegistry, Role, SharedTokenCounter};

use crate::error::ContextError;

pub use pairs::{identify_pairs, ConversationPair};
pub use retry::RetryPolicy;
pub use summarizer::{
    render_transcript, summary_message, LlmSummarizer, Summarizer, SummaryResult, SUMMARY_PREFIX,
};
pub use truncate::truncate_to_fit;

#[derive(Debug, Clone, PartialEq)]
pub struct ContextConfig {
    pub enabled: bool,
    pub trigger_threshold: f64,
    pub min_unsummarized_pairs: usize,
    pub max_pairs_per_batch: usize,
    pub truncation_marker: String,
    pub retry: RetryPolicy,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self::from(&ContextSettings::default())
    }
}

impl From<&ContextSettings> for ContextConfig {
    fn from(settings: &ContextSettings) -> Self {
        Self {
            enabled: settings.enabled,
            trigger_threshold: settings.trigger_threshold.clamp(0.0, 1.0),
            min_unsummarized_pairs: settings.min_unsummarized_pairs,
            max_pairs_per_batch: settings.max_pairs_per_batch.max(1),
            truncation_marker: settings.truncation_marker.clone(),
            retry: RetryPolicy::from(&settings.retry),
        }
    }
}

/// Result of [`ContextManager::manage_context`].
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedContext {
    pub messages: Vec<ChatMessage>,
    pub was_summarized: bool,
    pub summaries_count: usize,
    pub was_truncated: bool,
    pub tokens_used: u32,
}

pub struct ContextManager {
    config: ContextConfig,
    counter: SharedTokenCounter,
    limits: ModelLimitsRegistry,
    summarizer: Arc<dyn Summarizer>,
}

impl ContextManager {
    pub fn new(
        config: ContextConfig,
        counter: SharedTokenCounter,
        limits: ModelLimitsRegistry,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self {
            config,
            counter,
            limits,
            summarizer,
        }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Token budget for `model`: the trigger fraction of its context window.
    pub fn budget_for(&self, model: &str) -> u32 {
        let window = self.limits.context_window(model);
        (window as f64 * self.config.trigger_threshold).floor() as u32
    }

    /// Fit chronological `messages` into `model`'s budget.
    ///
    /// Never fails: summarizer errors end summarization and leave the rest
    /// to truncation.
    pub async fn manage_context(&self, messages: Vec<ChatMessage>, model: &str) -> ManagedContext {
        let total = self.counter.count_messages(&messages);
        let budget = self.budget_for(model);

        if !self.config.enabled || total <= budget {
            return ManagedContext {
                messages,
                was_summarized: false,
                summaries_count: 0,
                was_truncated: false,
                tokens_used: total,
            };
        }

        tracing::info!(
            model,
            tokens = total,
            budget,
            messages = messages.len(),
            "Conversation over budget, compressing context"
        );

        let mut messages = messages;
        let summaries_count = self.summarize_until_fits(&mut messages, budget).await;

        let mut was_truncated = false;
        if self.counter.count_messages(&messages) > budget {
            was_truncated = self.truncate_to_budget(&mut messages, budget);
        }

        let tokens_used = self.counter.count_messages(&messages);
        tracing::info!(
            model,
            tokens = tokens_used,
            budget,
            summaries = summaries_count,
            truncated = was_truncated,
            "Context compression finished"
        );

        ManagedContext {
            messages,
            was_summarized: summaries_count > 0,
            summaries_count,
            was_truncated,
            tokens_used,
        }
    }

    /// Replace the oldest eligible pairs batch by batch. Returns the number
    /// of summaries inserted.
    async fn summarize_until_fits(&self, messages: &mut Vec<ChatMessage>, budget: u32) -> usize {
        let mut summaries = 0;

        loop {
            if self.counter.count_messages(messages) <= budget {
                break;
            }

            let pairs = identify_pairs(messages, self.counter.as_ref());
            let eligible = pairs.len().saturating_sub(self.config.min_unsummarized_pairs);
            if eligible == 0 {
                tracing::debug!(pairs = pairs.len(), "No pairs left to summarize");
                break;
            }

            let batch = contiguous_batch(&pairs[..eligible], self.config.max_pairs_per_batch);
            let (Some(first), Some(last)) = (batch.first(), batch.last()) else {
                break;
            };
            let range = first.user_index..=last.assistant_index;

            let outcome = self.summarize_batch(&messages[range.clone()], batch).await;
            match outcome {
                Ok(result) => {
                    tracing::debug!(
                        pairs = batch.len(),
                        original_tokens = result.original_tokens,
                        summary_tokens = result.summary_tokens,
                        "Replaced pairs with summary"
                    );
                    messages.splice(range, std::iter::once(result.message));
                    summaries += 1;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Summarization stopped, falling back to truncation");
                    break;
                }
            }
        }

        summaries
    }

    async fn summarize_batch(
        &self,
        slice: &[ChatMessage],
        batch: &[ConversationPair],
    ) -> Result<SummaryResult, ContextError> {
        let transcript = render_transcript(slice);
        let summarizer = self.summarizer.as_ref();
        let summary = self
            .config
            .retry
            .run(|_| summarizer.summarize(&transcript))
            .await?;

        let message = summary_message(&summary);
        let result = SummaryResult {
            original_tokens: batch
                .iter()
                .fold(0u32, |acc, p| acc.saturating_add(p.original_tokens)),
            summary_tokens: self.counter.count_message(&message),
            message,
        };

        if !result.saves_tokens() {
            return Err(ContextError::NoSavings {
                original_tokens: result.original_tokens,
                summary_tokens: result.summary_tokens,
            });
        }
        Ok(result)
    }

    /// Cut message text until the total fits `budget`. The newest user
    /// message goes first, then the other non-system messages from largest
    /// to smallest, newest first on ties.
    fn truncate_to_budget(&self, messages: &mut [ChatMessage], budget: u32) -> bool {
        let newest_user = messages.iter().rposition(|m| m.role == Role::User);
        let mut order: Vec<(usize, u32)> = messages
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.is_system())
            .map(|(i, m)| (i, self.counter.count_text(&m.text())))
            .filter(|(_, tokens)| *tokens > 0)
            .collect();
        if order.is_empty() {
            tracing::warn!("Over budget but no message text to truncate");
            return false;
        }
        order.sort_by_key(|&(i, tokens)| (Some(i) != newest_user, Reverse(tokens), Reverse(i)));

        let mut truncated = false;
        for (index, _) in order {
            if self.counter.count_messages(messages) <= budget {
                break;
            }
            truncated |= self.truncate_message(messages, index, budget);
        }
        truncated
    }

    /// Shrink `messages[index]` towards the budget. Text is only ever
    /// replaced by something shorter, so a short message is left alone
    /// rather than swapped for the marker.
    fn truncate_message(&self, messages: &mut [ChatMessage], index: usize, budget: u32) -> bool {
        let original = messages[index].text();
        let original_chars = original.chars().count();
        let marker = self.config.truncation_marker.as_str();
        let mut allowed_tokens = self.allowed_text_tokens(messages, index, budget);
        let mut changed = false;

        // A pluggable counter may round differently from the char ratio, so
        // shrink the allowance until the result fits.
        for _ in 0..4 {
            let current = messages[index].text();
            let current_chars = current.chars().count();
            let tokens_per_char =
                self.counter.count_text(&current).max(1) as f64 / current_chars.max(1) as f64;

            let candidate = truncate_to_fit(&original, allowed_tokens, tokens_per_char, marker);
            if candidate.chars().count() >= current_chars {
                break;
            }
            messages[index].set_text(candidate);
            changed = true;

            let total = self.counter.count_messages(messages);
            if total <= budget || messages[index].text() == marker {
                break;
            }
            allowed_tokens = allowed_tokens.saturating_sub(total - budget);
        }

        if changed {
            tracing::debug!(
                index,
                role = ?messages[index].role,
                original_chars,
                truncated_chars = messages[index].text().chars().count(),
                "Truncated message to fit budget"
            );
        }
        changed
    }

    /// Tokens left for the text of `messages[index]` once everything else,
    /// including that message's own overhead and media, is paid for.
    fn allowed_text_tokens(&self, messages: &[ChatMessage], index: usize, budget: u32) -> u32 {
        let total = self.counter.count_messages(messages);
        let text_tokens = self.counter.count_text(&messages[index].text());
        budget.saturating_sub(total.saturating_sub(text_tokens))
    }
}

/// Oldest run of up to `max` pairs with no gap between them.
fn contiguous_batch(pairs: &[ConversationPair], max: usize) -> &[ConversationPair] {
    let mut len = pairs.len().min(1);
    while len < pairs.len().min(max) && pairs[len - 1].is_followed_by(&pairs[len]) {
        len += 1;
    }
    &pairs[..len]
}
