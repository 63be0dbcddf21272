//! End-to-end handling of one inbound message.

use std::sync::Arc;

use async_trait::async_trait;
use relay_context::{
    ChainBuilder, ChainFlags, ContentProcessor, ContextConfig, ContextManager, LlmSummarizer,
};
use relay_core::{
    ChatPlatform, ConfigHandle, ModelLimitsRegistry, NodeStore, OutgoingMessage, PlatformMessage,
    SharedNodeStorage, SharedTokenCounter,
};
use relay_llm::SharedLLMProvider;

use crate::config::StreamConfig;
use crate::controller::{ResponseController, ResponseOutcome, ResponseRequest};
use crate::error::ResponseError;
use crate::worker::JobHandler;

pub const PLACEHOLDER_TEXT: &str = "⏳ Thinking...";

/// Chain reconstruction, context fitting and response streaming for one
/// message. Each message works against a single configuration snapshot.
pub struct ConversationPipeline {
    config: ConfigHandle,
    platform: Arc<dyn ChatPlatform>,
    provider: SharedLLMProvider,
    store: Arc<NodeStore>,
    storage: SharedNodeStorage,
    processor: Arc<dyn ContentProcessor>,
    counter: SharedTokenCounter,
}

impl ConversationPipeline {
    pub fn new(
        config: ConfigHandle,
        platform: Arc<dyn ChatPlatform>,
        provider: SharedLLMProvider,
        store: Arc<NodeStore>,
        storage: SharedNodeStorage,
        processor: Arc<dyn ContentProcessor>,
        counter: SharedTokenCounter,
    ) -> Self {
        Self {
            config,
            platform,
            provider,
            store,
            storage,
            processor,
            counter,
        }
    }

    pub async fn process(&self, message: PlatformMessage) -> Result<ResponseOutcome, ResponseError> {
        let config = self.config.snapshot();
        let model = config.models.primary.clone();

        let chain = ChainBuilder::new(
            self.store.clone(),
            self.storage.clone(),
            self.platform.clone(),
            self.processor.clone(),
            config.chain.lookup_timeout(),
        )
        .build_conversation_chain(&message, &ChainFlags::from(&config.chain))
        .await;

        let summarizer_model = config
            .context
            .summarizer_model
            .clone()
            .unwrap_or_else(|| model.clone());
        let summarizer = LlmSummarizer::new(self.provider.clone(), summarizer_model)
            .with_timeout(config.context.summary_timeout());
        let manager = ContextManager::new(
            ContextConfig::from(&config.context),
            self.counter.clone(),
            ModelLimitsRegistry::with_overrides(&config.models.limits),
            Arc::new(summarizer),
        );
        let managed = manager.manage_context(chain.chronological(), &model).await;

        tracing::debug!(
            message_id = %message.id,
            chain = chain.messages.len(),
            warnings = chain.warnings.len(),
            tokens = managed.tokens_used,
            summarized = managed.was_summarized,
            truncated = managed.was_truncated,
            "Context ready"
        );

        let placeholder = self
            .platform
            .send_message(
                &message.channel_id,
                Some(&message.id),
                OutgoingMessage::text(PLACEHOLDER_TEXT)
                    .with_annotations(chain.warnings.clone())
                    .streaming(true),
            )
            .await?;

        let controller = ResponseController::new(
            self.platform.clone(),
            self.provider.clone(),
            self.store.clone(),
            self.storage.clone(),
            StreamConfig::from(&config.stream),
        );
        controller
            .generate_response(ResponseRequest {
                original: message,
                model,
                fallback_model: config.models.fallback.clone(),
                messages: managed.messages,
                warnings: chain.warnings,
                placeholder: Some(placeholder.id),
            })
            .await
    }
}

#[async_trait]
impl JobHandler<PlatformMessage> for ConversationPipeline {
    async fn handle(&self, message: PlatformMessage) {
        let message_id = message.id.clone();
        match self.process(message).await {
            Ok(outcome) => tracing::debug!(
                message_id = %message_id,
                model = %outcome.model,
                fallback_used = outcome.fallback_used,
                "Message handled"
            ),
            Err(err) => tracing::error!(message_id = %message_id, error = %err, "Message handling failed"),
        }
    }
}
