//! Lightweight parent lookup for messages that are not yet linked.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use relay_core::{ChatPlatform, MessageKind, PlatformError, PlatformMessage};

use crate::error::ChainError;

/// Outcome of a parent lookup. `failed` means a parent should exist but
/// could not be fetched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParentLookup {
    pub parent: Option<PlatformMessage>,
    pub failed: bool,
}

impl ParentLookup {
    fn found(parent: PlatformMessage) -> Self {
        Self {
            parent: Some(parent),
            failed: false,
        }
    }

    fn none() -> Self {
        Self::default()
    }

    fn failed() -> Self {
        Self {
            parent: None,
            failed: true,
        }
    }
}

pub struct ParentResolver {
    platform: Arc<dyn ChatPlatform>,
    timeout: Duration,
}

impl ParentResolver {
    pub fn new(platform: Arc<dyn ChatPlatform>, timeout: Duration) -> Self {
        Self { platform, timeout }
    }

    /// Find the message `message` continues, trying in order:
    ///
    /// 1. the explicit reply reference
    /// 2. the previous message in the channel, when it comes from the same
    ///    author (or from the bot in a DM) and `message` does not mention the bot
    /// 3. the starter message of the thread `message` lives in
    pub async fn resolve(&self, message: &PlatformMessage) -> ParentLookup {
        if let Some(reference) = &message.reference {
            return match self
                .with_deadline(self.platform.fetch_message(&reference.channel_id, &reference.message_id))
                .await
            {
                Ok(Some(parent)) => ParentLookup::found(parent),
                Ok(None) => {
                    tracing::debug!(message_id = %message.id, parent_id = %reference.message_id, "Referenced message no longer exists");
                    ParentLookup::failed()
                }
                Err(err) => {
                    tracing::warn!(message_id = %message.id, parent_id = %reference.message_id, error = %err, "Failed to fetch referenced message");
                    ParentLookup::failed()
                }
            };
        }

        if !message.mentions_bot {
            match self
                .with_deadline(self.platform.fetch_previous_message(&message.channel_id, &message.id))
                .await
            {
                Ok(Some(previous)) if self.is_continuation(message, &previous) => {
                    return ParentLookup::found(previous);
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::debug!(message_id = %message.id, error = %err, "Previous message lookup failed");
                }
            }
        }

        if let Some(thread) = &message.thread {
            return match self
                .with_deadline(
                    self.platform
                        .fetch_message(&thread.parent_channel_id, &thread.starter_message_id),
                )
                .await
            {
                Ok(Some(starter)) => ParentLookup::found(starter),
                Ok(None) => ParentLookup::none(),
                Err(err) => {
                    tracing::warn!(message_id = %message.id, error = %err, "Failed to fetch thread starter");
                    ParentLookup::failed()
                }
            };
        }

        ParentLookup::none()
    }

    fn is_continuation(&self, message: &PlatformMessage, previous: &PlatformMessage) -> bool {
        if !matches!(previous.kind, MessageKind::Default | MessageKind::Reply) {
            return false;
        }
        let expected_author = if message.is_dm {
            self.platform.bot_user_id()
        } else {
            message.author.id.as_str()
        };
        previous.author.id == expected_author
    }

    async fn with_deadline<T>(
        &self,
        call: impl Future<Output = Result<T, PlatformError>>,
    ) -> Result<T, ChainError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ChainError::Timeout(self.timeout)),
        }
    }
}
