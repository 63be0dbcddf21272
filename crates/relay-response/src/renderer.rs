//! Turns streamed text into platform messages.
//!
//! Content accumulates in a buffer that mirrors the message currently being
//! written. When the buffer reaches the platform limit (less room for the
//! streaming marker) that message is finalized and a new one is started as
//! a reply to it. Edits are throttled to `edit_delay`, except for the first
//! content, splits and the final edit.

use std::sync::Arc;

use relay_core::{
    ChannelId, ChatPlatform, GeneratedImage, MessageId, OutgoingMessage, PlatformError,
    ResponseAction,
};
use tokio::time::Instant;

use crate::config::StreamConfig;
use crate::split::split_chars;
use crate::state::ResponseState;

pub struct MessageRenderer {
    platform: Arc<dyn ChatPlatform>,
    channel_id: ChannelId,
    reply_to: MessageId,
    config: StreamConfig,
    annotations: Vec<String>,
    /// Finalized messages, oldest first.
    finished: Vec<MessageId>,
    /// Message the buffer is shown in. `None` until the first send when no
    /// placeholder was given.
    current: Option<MessageId>,
    buffer: String,
    buffer_chars: usize,
    full_text: String,
    last_edit: Option<Instant>,
    state: ResponseState,
}

impl MessageRenderer {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        channel_id: impl Into<ChannelId>,
        reply_to: impl Into<MessageId>,
        config: StreamConfig,
    ) -> Self {
        Self {
            platform,
            channel_id: channel_id.into(),
            reply_to: reply_to.into(),
            config,
            annotations: Vec::new(),
            finished: Vec::new(),
            current: None,
            buffer: String::new(),
            buffer_chars: 0,
            full_text: String::new(),
            last_edit: None,
            state: ResponseState::Streaming,
        }
    }

    /// Reuse an already posted progress message for the first content.
    pub fn with_placeholder(mut self, message_id: impl Into<MessageId>) -> Self {
        self.current = Some(message_id.into());
        self
    }

    /// Warnings shown on the first response message.
    pub fn with_annotations(mut self, annotations: Vec<String>) -> Self {
        self.annotations = annotations;
        self
    }

    pub fn state(&self) -> ResponseState {
        self.state
    }

    pub fn enter(&mut self, state: ResponseState) {
        if self.state != state {
            tracing::trace!(from = %self.state, to = %state, "Response state changed");
            self.state = state;
        }
    }

    /// Everything pushed so far, across all messages.
    pub fn text(&self) -> &str {
        &self.full_text
    }

    pub fn has_content(&self) -> bool {
        !self.full_text.is_empty()
    }

    /// Ids of every message holding part of the response, oldest first.
    pub fn message_ids(&self) -> Vec<MessageId> {
        self.finished
            .iter()
            .chain(self.current.iter())
            .cloned()
            .collect()
    }

    /// Append streamed text, splitting and editing as needed.
    pub async fn push(&mut self, text: &str) -> Result<(), PlatformError> {
        if text.is_empty() {
            return Ok(());
        }
        let mut force = self.full_text.is_empty();
        self.full_text.push_str(text);

        let capacity = self.config.content_capacity();
        let mut rest = text;
        while !rest.is_empty() {
            let room = capacity.saturating_sub(self.buffer_chars);
            if room == 0 {
                self.split().await?;
                force = true;
                continue;
            }
            let (head, tail) = split_chars(rest, room);
            self.buffer.push_str(head);
            self.buffer_chars += head.chars().count();
            rest = tail;
        }

        if force || self.edit_due() {
            self.refresh().await?;
        }
        self.enter(ResponseState::Streaming);
        Ok(())
    }

    /// Final edit of the last message: no marker, plus footer, actions and
    /// generated files.
    pub async fn complete(
        &mut self,
        footer: Option<String>,
        files: Vec<GeneratedImage>,
    ) -> Result<(), PlatformError> {
        let mut message = self.outgoing(self.buffer.clone());
        message.footer = footer;
        message.actions = vec![
            ResponseAction::Download,
            ResponseAction::View,
            ResponseAction::Retry,
        ];
        message.files = files;
        self.deliver(message).await?;
        self.enter(ResponseState::Completed);
        Ok(())
    }

    /// Show a terminal error. Edits the current message when the notice
    /// fits behind its content, otherwise posts the notice separately.
    pub async fn fail(&mut self, notice: &str) -> Result<(), PlatformError> {
        self.enter(ResponseState::Error);

        let combined = if self.buffer.is_empty() {
            notice.to_string()
        } else {
            format!("{}\n\n{notice}", self.buffer)
        };

        if self.current.is_some() && combined.chars().count() > self.config.max_message_chars {
            let message = self.outgoing(self.buffer.clone());
            self.deliver(message).await?;
            self.retire_current();
            let message = self.outgoing(notice.to_string());
            return self.deliver(message).await;
        }

        let message = self.outgoing(combined);
        self.deliver(message).await
    }

    async fn split(&mut self) -> Result<(), PlatformError> {
        self.enter(ResponseState::SplittingNewMessage);
        let message = self.outgoing(self.buffer.clone());
        self.deliver(message).await?;
        self.retire_current();
        tracing::debug!(
            messages = self.finished.len(),
            "Response split into a new message"
        );
        Ok(())
    }

    fn retire_current(&mut self) {
        if let Some(id) = self.current.take() {
            self.finished.push(id);
        }
        self.buffer.clear();
        self.buffer_chars = 0;
    }

    /// Show the buffer with the streaming marker. Failed edits are logged
    /// and left for the next edit to catch up.
    async fn refresh(&mut self) -> Result<(), PlatformError> {
        let content = format!("{}{}", self.buffer, self.config.streaming_marker);
        let message = self.outgoing(content).streaming(true);
        match self.deliver(message).await {
            Err(err) if self.current.is_some() => {
                tracing::warn!(error = %err, "Streaming edit failed");
                Ok(())
            }
            other => other,
        }
    }

    fn edit_due(&self) -> bool {
        self.last_edit
            .map_or(true, |at| at.elapsed() >= self.config.edit_delay)
    }

    fn outgoing(&self, content: String) -> OutgoingMessage {
        let message = OutgoingMessage::text(content);
        if self.finished.is_empty() {
            message.with_annotations(self.annotations.clone())
        } else {
            message
        }
    }

    /// Edit the current message, or send a new one replying to the previous
    /// response message.
    async fn deliver(&mut self, message: OutgoingMessage) -> Result<(), PlatformError> {
        match self.current.clone() {
            Some(id) => {
                self.enter(ResponseState::EditingMessage);
                self.platform
                    .edit_message(&self.channel_id, &id, message)
                    .await?;
            }
            None => {
                let reply_to = self.finished.last().unwrap_or(&self.reply_to).clone();
                let sent = self
                    .platform
                    .send_message(&self.channel_id, Some(&reply_to), message)
                    .await?;
                self.current = Some(sent.id);
            }
        }
        self.last_edit = Some(Instant::now());
        Ok(())
    }
}
