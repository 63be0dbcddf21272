//! One pass over a model stream, guarded by the response watchdog.

use futures::StreamExt;
use relay_core::{ChatMessage, GeneratedImage, PlatformError};
use relay_llm::{LLMChunk, LLMError, LLMProvider, TokenUsage};
use tokio::time::{sleep_until, Instant};

use crate::config::StreamConfig;
use crate::renderer::MessageRenderer;

#[derive(Debug, Default)]
pub(crate) struct AttemptOutput {
    pub usage: Option<TokenUsage>,
    pub images: Vec<GeneratedImage>,
    pub finish_reason: Option<String>,
}

#[derive(Debug)]
pub(crate) enum AttemptError {
    Llm(LLMError),
    Platform(PlatformError),
}

/// Stream `model`'s answer into `renderer`, collecting images and usage
/// into `output`.
///
/// `output` is shared across attempts so images from a failed attempt stay
/// with the response. The watchdog allows `first_content_timeout` until the
/// first content chunk and `response_timeout` for the whole attempt. A
/// stream that ends without content fails with [`LLMError::EmptyResponse`].
pub(crate) async fn consume_attempt(
    provider: &dyn LLMProvider,
    model: &str,
    messages: &[ChatMessage],
    renderer: &mut MessageRenderer,
    output: &mut AttemptOutput,
    config: &StreamConfig,
) -> Result<(), AttemptError> {
    let started = Instant::now();
    let overall_deadline = started + config.response_timeout;
    let first_content_deadline = (started + config.first_content_timeout).min(overall_deadline);
    output.finish_reason = None;

    let mut stream = tokio::select! {
        opened = provider.chat_stream(messages, model) => opened.map_err(AttemptError::Llm)?,
        _ = sleep_until(first_content_deadline) => {
            tracing::warn!(model, "Watchdog fired before the stream opened");
            return Err(AttemptError::Llm(LLMError::Timeout));
        }
    };

    let mut content_received = false;

    loop {
        let deadline = if content_received {
            overall_deadline
        } else {
            first_content_deadline
        };
        let next = tokio::select! {
            next = stream.next() => next,
            _ = sleep_until(deadline) => {
                tracing::warn!(model, content_received, "Watchdog fired, abandoning stream");
                return Err(AttemptError::Llm(LLMError::Timeout));
            }
        };
        let Some(chunk) = next else {
            break;
        };

        let chunk = chunk.map_err(AttemptError::Llm)?;
        content_received |= chunk.is_content();
        match chunk {
            LLMChunk::Token(text) => {
                if !text.is_empty() {
                    renderer
                        .push(&text)
                        .await
                        .map_err(AttemptError::Platform)?;
                }
            }
            LLMChunk::Image(image) => output.images.push(image),
            LLMChunk::Usage(usage) => output.usage = Some(usage),
            LLMChunk::Done { finish_reason } => {
                output.finish_reason = finish_reason;
                break;
            }
        }
    }

    if !content_received {
        return Err(AttemptError::Llm(LLMError::EmptyResponse));
    }
    Ok(())
}
