#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use relay_core::{
    Author, ChatPlatform, MsgNode, OutgoingMessage, PlatformError, PlatformMessage,
};
use relay_context::{ChainError, ContentProcessor, DefaultContentProcessor, ProcessOptions};

pub const BOT_ID: &str = "bot";
pub const CHANNEL: &str = "general";

pub fn user(id: &str) -> Author {
    Author {
        id: id.to_string(),
        name: format!("user{id}"),
        is_bot: false,
    }
}

pub fn bot() -> Author {
    Author {
        id: BOT_ID.to_string(),
        name: "relay".to_string(),
        is_bot: true,
    }
}

/// In-memory chat platform. Messages are kept in posting order per channel.
#[derive(Default)]
pub struct FakePlatform {
    messages: Mutex<HashMap<String, PlatformMessage>>,
    order: Mutex<HashMap<String, Vec<String>>>,
    pub fetch_calls: AtomicUsize,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&self, message: PlatformMessage) -> PlatformMessage {
        self.order
            .lock()
            .entry(message.channel_id.clone())
            .or_default()
            .push(message.id.clone());
        self.messages
            .lock()
            .insert(message.id.clone(), message.clone());
        message
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    fn bot_user_id(&self) -> &str {
        BOT_ID
    }

    async fn fetch_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<Option<PlatformMessage>, PlatformError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .messages
            .lock()
            .get(message_id)
            .filter(|m| m.channel_id == channel_id)
            .cloned())
    }

    async fn fetch_previous_message(
        &self,
        channel_id: &str,
        before: &str,
    ) -> Result<Option<PlatformMessage>, PlatformError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let order = self.order.lock();
        let Some(ids) = order.get(channel_id) else {
            return Ok(None);
        };
        let Some(pos) = ids.iter().position(|id| id == before) else {
            return Ok(None);
        };
        let previous = pos.checked_sub(1).map(|p| ids[p].clone());
        Ok(previous.and_then(|id| self.messages.lock().get(&id).cloned()))
    }

    async fn send_message(
        &self,
        _channel_id: &str,
        _reply_to: Option<&str>,
        _message: OutgoingMessage,
    ) -> Result<PlatformMessage, PlatformError> {
        Err(PlatformError::Forbidden("read-only fake".into()))
    }

    async fn edit_message(
        &self,
        _channel_id: &str,
        _message_id: &str,
        _message: OutgoingMessage,
    ) -> Result<(), PlatformError> {
        Err(PlatformError::Forbidden("read-only fake".into()))
    }
}

/// Wraps the default processor and counts invocations.
#[derive(Default)]
pub struct CountingProcessor {
    inner: DefaultContentProcessor,
    pub calls: AtomicUsize,
}

impl CountingProcessor {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentProcessor for CountingProcessor {
    async fn process(
        &self,
        message: &PlatformMessage,
        node: &mut MsgNode,
        options: &ProcessOptions,
    ) -> Result<(), ChainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.process(message, node, options).await
    }
}
