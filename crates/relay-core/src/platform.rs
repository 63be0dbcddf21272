//! Narrow interface to the chat platform.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PlatformError;
use crate::message::GeneratedImage;
use crate::node::{ChannelId, MessageId, NodeRef, UserId};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Author {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub is_bot: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    pub id: String,
    pub url: String,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Default,
    Reply,
    ThreadStarter,
    /// Joins, pins and other platform notices.
    System,
}

/// Set when the message lives in a thread spawned from another channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThreadInfo {
    pub parent_channel_id: ChannelId,
    pub starter_message_id: MessageId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlatformMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub author: Author,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<NodeRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<ThreadInfo>,
    #[serde(default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub mentions_bot: bool,
    #[serde(default)]
    pub is_dm: bool,
    pub created_at: DateTime<Utc>,
}

impl PlatformMessage {
    pub fn new(
        channel_id: impl Into<ChannelId>,
        id: impl Into<MessageId>,
        author: Author,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            channel_id: channel_id.into(),
            author,
            content: content.into(),
            attachments: Vec::new(),
            reference: None,
            thread: None,
            kind: MessageKind::Default,
            mentions_bot: false,
            is_dm: false,
            created_at: Utc::now(),
        }
    }

    pub fn replying_to(mut self, parent: NodeRef) -> Self {
        self.reference = Some(parent);
        self.kind = MessageKind::Reply;
        self
    }

    pub fn node_ref(&self) -> NodeRef {
        NodeRef::new(self.channel_id.clone(), self.id.clone())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseAction {
    /// Download the full response as a text file.
    Download,
    /// View the response rendered outside the chat.
    View,
    /// Regenerate the response.
    Retry,
}

/// Content for a send or edit call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OutgoingMessage {
    pub content: String,
    /// Visible warnings shown alongside the content.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ResponseAction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<GeneratedImage>,
    /// Content is still being generated.
    #[serde(default)]
    pub streaming: bool,
}

impl OutgoingMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_annotations(mut self, annotations: Vec<String>) -> Self {
        self.annotations = annotations;
        self
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }
}

#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Id of the bot account, used to recognise its own messages.
    fn bot_user_id(&self) -> &str;

    async fn fetch_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<Option<PlatformMessage>, PlatformError>;

    /// The message posted in `channel_id` immediately before `before`.
    async fn fetch_previous_message(
        &self,
        channel_id: &str,
        before: &str,
    ) -> Result<Option<PlatformMessage>, PlatformError>;

    async fn send_message(
        &self,
        channel_id: &str,
        reply_to: Option<&str>,
        message: OutgoingMessage,
    ) -> Result<PlatformMessage, PlatformError>;

    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        message: OutgoingMessage,
    ) -> Result<(), PlatformError>;
}
