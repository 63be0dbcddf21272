use relay_core::{ChatMessage, Role, TokenCounter};

/// A user message and the assistant reply that immediately follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversationPair {
    pub user_index: usize,
    pub assistant_index: usize,
    pub original_tokens: u32,
}

impl ConversationPair {
    /// True when `next` starts right after this pair.
    pub fn is_followed_by(&self, next: &ConversationPair) -> bool {
        next.user_index == self.assistant_index + 1
    }
}

/// Scan chronological `messages` for user/assistant pairs, oldest first.
///
/// System messages (including earlier summaries) and a user message without
/// an immediate assistant reply are left unpaired.
pub fn identify_pairs(messages: &[ChatMessage], counter: &dyn TokenCounter) -> Vec<ConversationPair> {
    let mut pairs = Vec::new();
    let mut i = 0;

    while i + 1 < messages.len() {
        if messages[i].role == Role::User && messages[i + 1].role == Role::Assistant {
            pairs.push(ConversationPair {
                user_index: i,
                assistant_index: i + 1,
                original_tokens: counter
                    .count_message(&messages[i])
                    .saturating_add(counter.count_message(&messages[i + 1])),
            });
            i += 2;
        } else {
            i += 1;
        }
    }

    pairs
}
