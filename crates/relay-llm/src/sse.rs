//! Shared SSE -> [`LLMStream`] adapter.

use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Response;

use crate::error::{LLMError, Result};
use crate::provider::LLMStream;
use crate::types::LLMChunk;

fn to_stream_error(err: LLMError) -> LLMError {
    match err {
        // Auth and transport failures cannot happen mid-stream; anything
        // reported as such by a handler is provider text.
        LLMError::Auth(_) | LLMError::Network(_) | LLMError::EmptyResponse => {
            LLMError::Stream(err.to_string())
        }
        other => other,
    }
}

/// Convert an SSE HTTP [`Response`] into an [`LLMStream`].
///
/// `handler` receives the SSE event name and data payload for each event and
/// returns the chunks to emit, possibly none. A handler error is emitted as a
/// stream item; the stream keeps going afterwards.
pub fn llm_stream_from_sse<H>(response: Response, mut handler: H) -> LLMStream
where
    H: FnMut(&str, &str) -> Result<Vec<LLMChunk>> + Send + 'static,
{
    let stream = response
        .bytes_stream()
        .eventsource()
        .map(move |event| match event {
            Ok(event) => match handler(event.event.as_str(), event.data.as_str()) {
                Ok(chunks) => chunks.into_iter().map(Ok).collect::<Vec<_>>(),
                Err(err) => vec![Err(to_stream_error(err))],
            },
            Err(err) => {
                log::warn!("SSE transport error: {}", err);
                vec![Err(LLMError::Stream(err.to_string()))]
            }
        })
        .flat_map(futures::stream::iter);

    Box::pin(stream)
}
