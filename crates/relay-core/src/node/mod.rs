//! Per-message content records.
//!
//! A [`MsgNode`] is created empty the first time a message is referenced and
//! populated exactly once by the content processor. An empty node is the
//! "not yet processed" sentinel.

pub mod store;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::{
    AudioRef, ChatMessage, DocumentRef, GeneratedImage, GroundingMetadata, ImageRef, Role,
};

pub type MessageId = String;
pub type ChannelId = String;
pub type UserId = String;

/// Weak reference to another message, resolved lazily by id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

impl NodeRef {
    pub fn new(channel_id: impl Into<ChannelId>, message_id: impl Into<MessageId>) -> Self {
        Self {
            channel_id: channel_id.into(),
            message_id: message_id.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MsgNode {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audio_files: Vec<AudioRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pdf_files: Vec<DocumentRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generated_images: Vec<GeneratedImage>,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeRef>,
    /// Set once parent resolution ran, even when it found nothing.
    #[serde(default)]
    pub parent_resolved: bool,
    #[serde(default)]
    pub has_bad_attachments: bool,
    #[serde(default)]
    pub fetch_parent_failed: bool,
    #[serde(default)]
    pub web_search_performed: bool,
    #[serde(default)]
    pub search_result_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_metadata: Option<GroundingMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl MsgNode {
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            role: Role::Assistant,
            parent_resolved: true,
            created_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// True until the content processor has run. Attachment-only messages
    /// count as processed so they are not re-enriched on every walk.
    pub fn needs_processing(&self) -> bool {
        self.text.is_empty()
            && self.images.is_empty()
            && self.audio_files.is_empty()
            && self.pdf_files.is_empty()
            && self.generated_images.is_empty()
    }

    pub fn has_visible_content(&self) -> bool {
        !self.text.is_empty() || !self.images.is_empty() || !self.audio_files.is_empty()
    }

    /// Build the content-bearing message for this node, applying the
    /// per-message caps in `options`.
    pub fn to_chat_message(&self, options: &RenderOptions) -> RenderedNode {
        let mut issues = Vec::new();

        let mut text = self.text.clone();
        if options.max_text > 0 && text.chars().count() > options.max_text {
            text = text.chars().take(options.max_text).collect();
            issues.push(NodeIssue::TextTruncated {
                max_text: options.max_text,
            });
        }

        let images: Vec<ImageRef> = if self.images.is_empty() {
            Vec::new()
        } else if !options.accept_images || options.max_images == 0 {
            issues.push(NodeIssue::ImagesUnsupported);
            Vec::new()
        } else if self.images.len() > options.max_images {
            issues.push(NodeIssue::TooManyImages {
                max_images: options.max_images,
            });
            self.images[..options.max_images].to_vec()
        } else {
            self.images.clone()
        };

        if self.has_bad_attachments {
            issues.push(NodeIssue::BadAttachments);
        }
        if self.fetch_parent_failed {
            issues.push(NodeIssue::ParentFetchFailed);
        }

        let mut message = ChatMessage::new(self.role, text)
            .with_images(images)
            .with_audio(self.audio_files.iter().cloned());

        if options.accept_usernames && self.role == Role::User {
            if let Some(user_id) = self.user_id.as_ref().filter(|id| !id.is_empty()) {
                message = message.with_name(user_id.clone());
            }
        }

        let message = if message.has_visible_content() {
            Some(message)
        } else {
            None
        };

        RenderedNode { message, issues }
    }
}

/// Per-message caps applied when a node is turned into a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub accept_images: bool,
    pub accept_usernames: bool,
    pub max_images: usize,
    /// Maximum characters of text per message, 0 for unlimited.
    pub max_text: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            accept_images: true,
            accept_usernames: false,
            max_images: 5,
            max_text: 100_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedNode {
    pub message: Option<ChatMessage>,
    pub issues: Vec<NodeIssue>,
}

/// Degradations found while rendering a node; displayed as user warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeIssue {
    TextTruncated { max_text: usize },
    TooManyImages { max_images: usize },
    ImagesUnsupported,
    BadAttachments,
    ParentFetchFailed,
}

impl fmt::Display for NodeIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeIssue::TextTruncated { max_text } => {
                write!(f, "⚠️ Max {max_text} characters per message")
            }
            NodeIssue::TooManyImages { max_images } => write!(
                f,
                "⚠️ Max {max_images} image{} per message",
                if *max_images == 1 { "" } else { "s" }
            ),
            NodeIssue::ImagesUnsupported => write!(f, "⚠️ Can't see images"),
            NodeIssue::BadAttachments => write!(f, "⚠️ Unsupported attachments"),
            NodeIssue::ParentFetchFailed => {
                write!(f, "⚠️ Couldn't fetch the full conversation history")
            }
        }
    }
}
