//! Streaming response generation with a single model fallback.

mod attempt;

use std::sync::Arc;

use relay_core::{
    ChatMessage, ChatPlatform, GeneratedImage, MessageId, MsgNode, NodeStore, PlatformMessage,
    SharedNodeStorage,
};
use relay_llm::{FailureKind, LLMError, SharedLLMProvider, TokenUsage};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::StreamConfig;
use crate::error::ResponseError;
use crate::renderer::MessageRenderer;
use crate::state::ResponseState;
use attempt::{consume_attempt, AttemptError, AttemptOutput};

/// Everything needed to answer one message.
#[derive(Debug, Clone)]
pub struct ResponseRequest {
    /// The message being answered. Response nodes use it as their parent.
    pub original: PlatformMessage,
    pub model: String,
    pub fallback_model: Option<String>,
    /// Chronological context for the model.
    pub messages: Vec<ChatMessage>,
    /// Shown as annotations on the first response message.
    pub warnings: Vec<String>,
    /// Already posted progress message that the first content replaces.
    pub placeholder: Option<MessageId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseOutcome {
    /// Model that produced the delivered answer.
    pub model: String,
    pub fallback_used: bool,
    pub text: String,
    /// Platform messages holding the response, oldest first.
    pub message_ids: Vec<MessageId>,
    pub usage: Option<TokenUsage>,
    pub images: Vec<GeneratedImage>,
    pub finish_reason: Option<String>,
}

pub struct ResponseController {
    platform: Arc<dyn ChatPlatform>,
    provider: SharedLLMProvider,
    store: Arc<NodeStore>,
    storage: SharedNodeStorage,
    config: StreamConfig,
}

impl ResponseController {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        provider: SharedLLMProvider,
        store: Arc<NodeStore>,
        storage: SharedNodeStorage,
        config: StreamConfig,
    ) -> Self {
        Self {
            platform,
            provider,
            store,
            storage,
            config,
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Stream an answer to `request.original` onto the platform.
    ///
    /// A fallback-eligible failure (timeout, overload, server error, empty
    /// stream) on the first model is retried once against
    /// `request.fallback_model`; content already shown and images already
    /// generated stay, and the retry appends after them. Any other failure, or a second one, is shown
    /// to the user and returned.
    pub async fn generate_response(
        &self,
        request: ResponseRequest,
    ) -> Result<ResponseOutcome, ResponseError> {
        let span = tracing::info_span!(
            "response",
            response_id = %Uuid::new_v4(),
            message_id = %request.original.id,
        );
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: ResponseRequest) -> Result<ResponseOutcome, ResponseError> {
        let mut renderer = MessageRenderer::new(
            self.platform.clone(),
            request.original.channel_id.clone(),
            request.original.id.clone(),
            self.config.clone(),
        )
        .with_annotations(request.warnings.clone());
        if let Some(placeholder) = &request.placeholder {
            renderer = renderer.with_placeholder(placeholder.clone());
        }

        let mut model = request.model.clone();
        let mut fallback_used = false;
        let mut output = AttemptOutput::default();

        loop {
            renderer.enter(ResponseState::Streaming);
            tracing::info!(
                model = %model,
                messages = request.messages.len(),
                fallback_used,
                "Streaming response"
            );

            let attempt = consume_attempt(
                self.provider.as_ref(),
                &model,
                &request.messages,
                &mut renderer,
                &mut output,
                &self.config,
            )
            .await;

            let error = match attempt {
                Ok(()) => {
                    return self
                        .complete(&request, renderer, model, fallback_used, output)
                        .await;
                }
                Err(AttemptError::Platform(err)) => {
                    renderer.enter(ResponseState::Error);
                    tracing::error!(error = %err, "Platform rejected response delivery");
                    return Err(err.into());
                }
                Err(AttemptError::Llm(err)) => err,
            };

            let fallback = request
                .fallback_model
                .as_deref()
                .filter(|fallback| *fallback != model);
            match fallback {
                Some(fallback) if !fallback_used && error.is_fallback_eligible() => {
                    tracing::warn!(
                        model = %model,
                        fallback,
                        kind = ?error.kind(),
                        error = %error,
                        "Retrying response on fallback model"
                    );
                    renderer.enter(ResponseState::FallbackRetry);
                    model = fallback.to_string();
                    fallback_used = true;
                }
                _ => {
                    tracing::error!(
                        model = %model,
                        kind = ?error.kind(),
                        error = %error,
                        "Response failed"
                    );
                    if let Err(err) = renderer.fail(&failure_notice(&error)).await {
                        tracing::warn!(error = %err, "Failed to show error message");
                    }
                    return Err(ResponseError::Stream {
                        model,
                        source: error,
                    });
                }
            }
        }
    }

    async fn complete(
        &self,
        request: &ResponseRequest,
        mut renderer: MessageRenderer,
        model: String,
        fallback_used: bool,
        output: AttemptOutput,
    ) -> Result<ResponseOutcome, ResponseError> {
        let footer = completion_footer(&model, output.usage.as_ref());
        renderer
            .complete(Some(footer), output.images.clone())
            .await?;

        let outcome = ResponseOutcome {
            model,
            fallback_used,
            text: renderer.text().to_string(),
            message_ids: renderer.message_ids(),
            usage: output.usage,
            images: output.images,
            finish_reason: output.finish_reason,
        };
        self.persist(&request.original, &outcome).await;

        tracing::info!(
            model = %outcome.model,
            chars = outcome.text.chars().count(),
            messages = outcome.message_ids.len(),
            finish_reason = ?outcome.finish_reason,
            "Response completed"
        );
        Ok(outcome)
    }

    /// One node per response message, each holding the full text.
    async fn persist(&self, original: &PlatformMessage, outcome: &ResponseOutcome) {
        let mut node = MsgNode::assistant(outcome.text.clone());
        node.parent = Some(original.node_ref());
        node.generated_images = outcome.images.clone();

        for id in &outcome.message_ids {
            self.store.set(id, node.clone());
            if let Err(err) = self.storage.save_node(id, &node).await {
                tracing::warn!(node_id = %id, error = %err, "Failed to persist response node");
            }
        }
    }
}

fn completion_footer(model: &str, usage: Option<&TokenUsage>) -> String {
    match usage {
        Some(usage) => format!(
            "{model} · {} prompt + {} completion tokens",
            usage.prompt_tokens, usage.completion_tokens
        ),
        None => model.to_string(),
    }
}

fn failure_notice(error: &LLMError) -> String {
    match error.kind() {
        FailureKind::Timeout => "❌ The model took too long to respond".to_string(),
        FailureKind::RateLimited => {
            "❌ The model provider is rate limiting requests, try again shortly".to_string()
        }
        FailureKind::Overloaded | FailureKind::ServerError => {
            "❌ The model provider is unavailable right now".to_string()
        }
        FailureKind::EmptyResponse => "❌ The model returned an empty response".to_string(),
        FailureKind::Auth => "❌ Authentication with the model provider failed".to_string(),
        _ => format!("❌ Response failed: {error}"),
    }
}
