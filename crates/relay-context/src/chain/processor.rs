//! Populating a node from its raw platform message.

use std::sync::Arc;

use async_trait::async_trait;
use relay_core::{Attachment, AudioRef, DocumentRef, ImageRef, MsgNode, PlatformMessage, Role};

use super::fanout::FanOut;
use crate::error::ChainError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOptions {
    /// The message that triggered this chain, as opposed to history.
    pub is_current: bool,
    pub bot_user_id: String,
    pub accept_usernames: bool,
    pub force_search: bool,
    pub deny_search: bool,
}

/// Fills an empty node with the message's content. Called with the node
/// lock held, at most once per node.
#[async_trait]
pub trait ContentProcessor: Send + Sync {
    async fn process(
        &self,
        message: &PlatformMessage,
        node: &mut MsgNode,
        options: &ProcessOptions,
    ) -> Result<(), ChainError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttachmentContent {
    /// Extracted text, appended to the node text.
    Text(String),
    Image(ImageRef),
    Audio(AudioRef),
    Document {
        document: DocumentRef,
        text: Option<String>,
    },
}

#[async_trait]
pub trait AttachmentFetcher: Send + Sync {
    async fn fetch(&self, attachment: &Attachment) -> Result<AttachmentContent, ChainError>;
}

/// Passes media through by URL without downloading. Anything that needs its
/// bytes read, such as plain text files, is reported as unsupported.
#[derive(Debug, Clone, Default)]
pub struct UrlAttachmentFetcher;

fn content_type_of(attachment: &Attachment) -> String {
    if let Some(content_type) = &attachment.content_type {
        return content_type.to_ascii_lowercase();
    }
    let extension = attachment
        .filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "pdf" => "application/pdf",
        "txt" | "md" => "text/plain",
        _ => "application/octet-stream",
    }
    .to_string()
}

#[async_trait]
impl AttachmentFetcher for UrlAttachmentFetcher {
    async fn fetch(&self, attachment: &Attachment) -> Result<AttachmentContent, ChainError> {
        let content_type = content_type_of(attachment);
        if content_type.starts_with("image/") {
            Ok(AttachmentContent::Image(
                ImageRef::new(&attachment.url).with_mime_type(content_type),
            ))
        } else if content_type.starts_with("audio/") {
            Ok(AttachmentContent::Audio(AudioRef {
                url: attachment.url.clone(),
                mime_type: Some(content_type),
            }))
        } else if content_type == "application/pdf" {
            Ok(AttachmentContent::Document {
                document: DocumentRef {
                    url: attachment.url.clone(),
                    filename: attachment.filename.clone(),
                },
                text: None,
            })
        } else {
            Err(ChainError::UnsupportedAttachment {
                filename: attachment.filename.clone(),
                content_type,
            })
        }
    }
}

/// Text from the message body plus attachments fetched concurrently.
pub struct DefaultContentProcessor {
    fetcher: Arc<dyn AttachmentFetcher>,
}

impl DefaultContentProcessor {
    pub fn new(fetcher: Arc<dyn AttachmentFetcher>) -> Self {
        Self { fetcher }
    }

    fn message_text(message: &PlatformMessage, role: Role, options: &ProcessOptions) -> String {
        let mut text = message.content.as_str();
        if role == Role::User && !options.bot_user_id.is_empty() {
            let mention = format!("<@{}>", options.bot_user_id);
            text = text.strip_prefix(mention.as_str()).unwrap_or(text);
        }
        let text = text.trim();

        let name = message.author.name.as_str();
        let prefix_name = role == Role::User
            && !options.accept_usernames
            && !message.is_dm
            && !name.is_empty()
            && !text.is_empty();
        if prefix_name {
            format!("{name}: {text}")
        } else {
            text.to_string()
        }
    }
}

impl Default for DefaultContentProcessor {
    fn default() -> Self {
        Self::new(Arc::new(UrlAttachmentFetcher))
    }
}

#[async_trait]
impl ContentProcessor for DefaultContentProcessor {
    async fn process(
        &self,
        message: &PlatformMessage,
        node: &mut MsgNode,
        options: &ProcessOptions,
    ) -> Result<(), ChainError> {
        let role = if message.author.id == options.bot_user_id {
            Role::Assistant
        } else {
            Role::User
        };

        let mut group = FanOut::new();
        for attachment in &message.attachments {
            let fetcher = self.fetcher.clone();
            group.push(async move { fetcher.fetch(attachment).await });
        }
        let (contents, errors) = group.join().await.partition();

        for err in &errors {
            tracing::warn!(message_id = %message.id, error = %err, "Attachment skipped");
        }

        let mut text_parts = vec![Self::message_text(message, role, options)];
        for content in contents {
            match content {
                AttachmentContent::Text(text) => text_parts.push(text),
                AttachmentContent::Image(image) => node.images.push(image),
                AttachmentContent::Audio(audio) => node.audio_files.push(audio),
                AttachmentContent::Document { document, text } => {
                    if let Some(text) = text {
                        text_parts.push(text);
                    }
                    node.pdf_files.push(document);
                }
            }
        }

        node.text = text_parts
            .into_iter()
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        node.role = role;
        node.user_id = (role == Role::User).then(|| message.author.id.clone());
        node.username = Some(message.author.name.clone()).filter(|n| !n.is_empty());
        node.has_bad_attachments = !errors.is_empty();
        node.created_at = Some(message.created_at);

        tracing::debug!(
            message_id = %message.id,
            role = ?role,
            chars = node.text.len(),
            images = node.images.len(),
            bad_attachments = node.has_bad_attachments,
            "Node populated"
        );
        Ok(())
    }
}
