//! Conversation chain reconstruction.
//!
//! Starting from an incoming message, walk parent links backwards through
//! the node cache, populating and linking nodes on first sight. Cached nodes
//! are followed by reference alone; the platform is only asked for a raw
//! message when its node still needs work.

mod fanout;
mod parent;
mod processor;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use relay_core::{
    resolve_node, ChainSettings, ChatMessage, ChatPlatform, NodeIssue, NodeRef, NodeStore,
    PlatformMessage, RenderOptions, SharedNodeStorage,
};

pub use fanout::{FanOut, FanOutResult};
pub use parent::{ParentLookup, ParentResolver};
pub use processor::{
    AttachmentContent, AttachmentFetcher, ContentProcessor, DefaultContentProcessor,
    ProcessOptions, UrlAttachmentFetcher,
};

pub const CYCLE_WARNING: &str = "⚠️ Conversation loop detected, older history ignored";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainFlags {
    pub max_messages: usize,
    pub max_images: usize,
    pub max_text: usize,
    pub accept_images: bool,
    pub accept_usernames: bool,
    pub force_search: bool,
    pub deny_search: bool,
}

impl Default for ChainFlags {
    fn default() -> Self {
        Self::from(&ChainSettings::default())
    }
}

impl From<&ChainSettings> for ChainFlags {
    fn from(settings: &ChainSettings) -> Self {
        Self {
            max_messages: settings.max_messages,
            max_images: settings.max_images,
            max_text: settings.max_text,
            accept_images: settings.accept_images,
            accept_usernames: settings.accept_usernames,
            force_search: false,
            deny_search: false,
        }
    }
}

impl ChainFlags {
    fn render_options(&self) -> RenderOptions {
        RenderOptions {
            accept_images: self.accept_images,
            accept_usernames: self.accept_usernames,
            max_images: self.max_images,
            max_text: self.max_text,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainResult {
    /// Newest first; the starting message leads.
    pub messages: Vec<ChatMessage>,
    /// User-visible warnings, deduplicated in first-seen order.
    pub warnings: Vec<String>,
}

impl ChainResult {
    /// Oldest first, as the context manager and the LLM expect.
    pub fn chronological(&self) -> Vec<ChatMessage> {
        self.messages.iter().rev().cloned().collect()
    }

    fn warn(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }
}

fn history_truncated_warning(count: usize) -> String {
    format!(
        "⚠️ Only using last {count} message{}",
        if count == 1 { "" } else { "s" }
    )
}

struct Step {
    node_ref: NodeRef,
    raw: Option<PlatformMessage>,
}

pub struct ChainBuilder {
    store: Arc<NodeStore>,
    storage: SharedNodeStorage,
    platform: Arc<dyn ChatPlatform>,
    processor: Arc<dyn ContentProcessor>,
    resolver: ParentResolver,
    lookup_timeout: Duration,
}

impl ChainBuilder {
    pub fn new(
        store: Arc<NodeStore>,
        storage: SharedNodeStorage,
        platform: Arc<dyn ChatPlatform>,
        processor: Arc<dyn ContentProcessor>,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            resolver: ParentResolver::new(platform.clone(), lookup_timeout),
            store,
            storage,
            platform,
            processor,
            lookup_timeout,
        }
    }

    pub fn store(&self) -> &Arc<NodeStore> {
        &self.store
    }

    /// Walk back from `start` and collect up to `flags.max_messages`
    /// content-bearing messages.
    ///
    /// Never fails. Loops, unreachable parents and the message cap end the
    /// walk with a warning.
    pub async fn build_conversation_chain(
        &self,
        start: &PlatformMessage,
        flags: &ChainFlags,
    ) -> ChainResult {
        let max_messages = flags.max_messages.max(1);
        let render = flags.render_options();
        let mut options = ProcessOptions {
            is_current: true,
            bot_user_id: self.platform.bot_user_id().to_string(),
            accept_usernames: flags.accept_usernames,
            force_search: flags.force_search,
            deny_search: flags.deny_search,
        };

        let mut result = ChainResult::default();
        let mut visited: HashSet<String> = HashSet::new();
        let mut current = Some(Step {
            node_ref: start.node_ref(),
            raw: Some(start.clone()),
        });

        while let Some(step) = current.take() {
            if result.messages.len() >= max_messages {
                result.warn(history_truncated_warning(result.messages.len()));
                break;
            }

            let id = step.node_ref.message_id.clone();
            if !visited.insert(id.clone()) {
                tracing::warn!(message_id = %id, "Cycle in reply chain");
                result.warn(CYCLE_WARNING);
                break;
            }

            let handle = resolve_node(&self.store, self.storage.as_ref(), &id).await;

            let needs_raw = {
                let node = handle.lock().await;
                node.needs_processing() || !node.parent_resolved
            };
            let raw = match step.raw {
                Some(raw) => Some(raw),
                None if needs_raw => match self.fetch_raw(&step.node_ref).await {
                    Some(raw) => Some(raw),
                    None => {
                        result.warn(NodeIssue::ParentFetchFailed.to_string());
                        break;
                    }
                },
                None => None,
            };

            let mut node = handle.lock().await;
            let mut changed = false;
            let mut next_raw = None;

            if let Some(raw) = raw.as_ref() {
                if node.needs_processing() {
                    if let Err(err) = self.processor.process(raw, &mut node, &options).await {
                        tracing::warn!(message_id = %id, error = %err, "Content processing failed");
                        node.has_bad_attachments = true;
                    }
                    changed = true;
                }

                if !node.parent_resolved {
                    let lookup = self.resolver.resolve(raw).await;
                    node.parent = lookup.parent.as_ref().map(PlatformMessage::node_ref);
                    node.fetch_parent_failed = lookup.failed;
                    node.parent_resolved = true;
                    next_raw = lookup.parent;
                    changed = true;
                }
            }

            let rendered = node.to_chat_message(&render);
            let parent = node.parent.clone();
            let snapshot = changed.then(|| node.clone());
            drop(node);

            if let Some(snapshot) = snapshot {
                if let Err(err) = self.storage.save_node(&id, &snapshot).await {
                    tracing::warn!(message_id = %id, error = %err, "Failed to persist node");
                }
            }

            for issue in &rendered.issues {
                result.warn(issue.to_string());
            }
            if let Some(message) = rendered.message {
                result.messages.push(message);
            }

            options.is_current = false;
            current = parent.map(|node_ref| Step {
                node_ref,
                raw: next_raw,
            });
        }

        tracing::debug!(
            start_id = %start.id,
            messages = result.messages.len(),
            warnings = result.warnings.len(),
            "Conversation chain built"
        );
        result
    }

    async fn fetch_raw(&self, node_ref: &NodeRef) -> Option<PlatformMessage> {
        let call = self
            .platform
            .fetch_message(&node_ref.channel_id, &node_ref.message_id);
        match tokio::time::timeout(self.lookup_timeout, call).await {
            Ok(Ok(message)) => message,
            Ok(Err(err)) => {
                tracing::warn!(message_id = %node_ref.message_id, error = %err, "Failed to fetch message");
                None
            }
            Err(_) => {
                tracing::warn!(message_id = %node_ref.message_id, "Message fetch timed out");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_warning_pluralizes() {
        assert_eq!(history_truncated_warning(1), "⚠️ Only using last 1 message");
        assert_eq!(history_truncated_warning(25), "⚠️ Only using last 25 messages");
    }

    #[test]
    fn warnings_are_deduplicated_in_order() {
        let mut result = ChainResult::default();
        result.warn("b");
        result.warn("a");
        result.warn("b");
        assert_eq!(result.warnings, vec!["b", "a"]);
    }

    #[test]
    fn chronological_reverses() {
        let result = ChainResult {
            messages: vec![ChatMessage::user("new"), ChatMessage::assistant("old")],
            warnings: vec![],
        };
        let chronological = result.chronological();
        assert_eq!(chronological[0].text(), "old");
        assert_eq!(chronological[1].text(), "new");
    }
}
