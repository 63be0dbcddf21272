#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use parking_lot::Mutex;
use relay_core::{
    Author, ChatMessage, ChatPlatform, OutgoingMessage, PlatformError, PlatformMessage,
};
use relay_llm::{LLMChunk, LLMError, LLMProvider, LLMStream};

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

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Send {
        id: String,
        reply_to: Option<String>,
        message: OutgoingMessage,
    },
    Edit {
        id: String,
        message: OutgoingMessage,
    },
}

impl Call {
    pub fn id(&self) -> &str {
        match self {
            Call::Send { id, .. } | Call::Edit { id, .. } => id,
        }
    }

    pub fn message(&self) -> &OutgoingMessage {
        match self {
            Call::Send { message, .. } | Call::Edit { message, .. } => message,
        }
    }
}

/// Chat platform that records every send and edit and serves sent
/// messages back through `fetch_message`.
#[derive(Default)]
pub struct RecordingPlatform {
    calls: Mutex<Vec<Call>>,
    messages: Mutex<HashMap<String, PlatformMessage>>,
    next_id: AtomicUsize,
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&self, message: PlatformMessage) -> PlatformMessage {
        self.messages
            .lock()
            .insert(message.id.clone(), message.clone());
        message
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn sends(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Send { .. }))
            .collect()
    }

    pub fn edits(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Edit { .. }))
            .collect()
    }

    /// Latest state of message `id`.
    pub fn latest(&self, id: &str) -> Option<OutgoingMessage> {
        self.calls()
            .into_iter()
            .rev()
            .find(|c| c.id() == id)
            .map(|c| c.message().clone())
    }
}

#[async_trait]
impl ChatPlatform for RecordingPlatform {
    fn bot_user_id(&self) -> &str {
        BOT_ID
    }

    async fn fetch_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<Option<PlatformMessage>, PlatformError> {
        Ok(self
            .messages
            .lock()
            .get(message_id)
            .filter(|m| m.channel_id == channel_id)
            .cloned())
    }

    async fn fetch_previous_message(
        &self,
        _channel_id: &str,
        _before: &str,
    ) -> Result<Option<PlatformMessage>, PlatformError> {
        Ok(None)
    }

    async fn send_message(
        &self,
        channel_id: &str,
        reply_to: Option<&str>,
        message: OutgoingMessage,
    ) -> Result<PlatformMessage, PlatformError> {
        let id = format!("r{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut sent = PlatformMessage::new(channel_id, id.clone(), bot(), message.content.clone());
        if let Some(parent) = reply_to {
            sent = sent.replying_to(relay_core::NodeRef::new(channel_id, parent));
        }
        self.messages.lock().insert(id.clone(), sent.clone());
        self.calls.lock().push(Call::Send {
            id,
            reply_to: reply_to.map(str::to_string),
            message,
        });
        Ok(sent)
    }

    async fn edit_message(
        &self,
        _channel_id: &str,
        message_id: &str,
        message: OutgoingMessage,
    ) -> Result<(), PlatformError> {
        if let Some(stored) = self.messages.lock().get_mut(message_id) {
            stored.content = message.content.clone();
        }
        self.calls.lock().push(Call::Edit {
            id: message_id.to_string(),
            message,
        });
        Ok(())
    }
}

/// What one `chat_stream` call does.
pub enum Script {
    /// Fail before any chunk.
    Fail(LLMError),
    Chunks(Vec<relay_llm::Result<LLMChunk>>),
    /// Each token after a delay.
    Paced(Vec<(Duration, String)>),
    /// Never yields.
    Stall,
}

/// Provider that plays one script per call and records what it was asked.
#[derive(Default)]
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<(String, Vec<ChatMessage>)>>,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn models(&self) -> Vec<String> {
        self.requests.lock().iter().map(|(m, _)| m.clone()).collect()
    }

    pub fn requests(&self) -> Vec<(String, Vec<ChatMessage>)> {
        self.requests.lock().clone()
    }
}

pub fn tokens(parts: &[&str]) -> Script {
    let mut chunks: Vec<relay_llm::Result<LLMChunk>> = parts
        .iter()
        .map(|p| Ok(LLMChunk::Token(p.to_string())))
        .collect();
    chunks.push(Ok(LLMChunk::Done {
        finish_reason: Some("stop".to_string()),
    }));
    Script::Chunks(chunks)
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        model: &str,
    ) -> relay_llm::Result<LLMStream> {
        self.requests
            .lock()
            .push((model.to_string(), messages.to_vec()));
        let script = self.scripts.lock().pop_front().unwrap_or(Script::Stall);
        match script {
            Script::Fail(err) => Err(err),
            Script::Chunks(chunks) => Ok(Box::pin(stream::iter(chunks))),
            Script::Paced(items) => Ok(Box::pin(stream::iter(items).then(
                |(delay, text)| async move {
                    tokio::time::sleep(delay).await;
                    Ok(LLMChunk::Token(text))
                },
            ))),
            Script::Stall => Ok(Box::pin(stream::pending::<relay_llm::Result<LLMChunk>>())),
        }
    }
}
