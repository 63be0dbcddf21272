//! OpenAI-compatible request serialization and stream chunk parsing.

use relay_core::{AudioRef, ChatMessage, ContentPart, GeneratedImage, Role};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{LLMError, Result};
use crate::types::{LLMChunk, TokenUsage};

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Split a `data:<mime>;base64,<payload>` URL.
fn parse_data_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    let mime = meta.strip_suffix(";base64")?;
    Some((mime, payload))
}

fn audio_part(audio: &AudioRef) -> Option<Value> {
    let Some((mime, data)) = parse_data_url(&audio.url) else {
        log::debug!("Skipping audio part without inline data: {}", audio.url);
        return None;
    };
    let format = mime.rsplit('/').next().unwrap_or("wav");
    Some(json!({
        "type": "input_audio",
        "input_audio": { "data": data, "format": format },
    }))
}

/// Convert messages to the OpenAI `messages` array.
///
/// Text-only messages use a plain string `content`; anything with media uses
/// the content-part array form.
pub fn messages_to_openai_compat_json(messages: &[ChatMessage]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| {
            let text_only = m
                .content
                .iter()
                .all(|part| matches!(part, ContentPart::Text { .. }));

            let content = if text_only {
                json!(m.text())
            } else {
                let parts: Vec<Value> = m
                    .content
                    .iter()
                    .filter_map(|part| match part {
                        ContentPart::Text { text } => Some(json!({ "type": "text", "text": text })),
                        ContentPart::Image { image } => Some(json!({
                            "type": "image_url",
                            "image_url": { "url": image.url },
                        })),
                        ContentPart::Audio { audio } => audio_part(audio),
                    })
                    .collect();
                json!(parts)
            };

            let mut msg = json!({
                "role": role_str(m.role),
                "content": content,
            });

            if let Some(name) = &m.name {
                msg["name"] = json!(name);
            }

            msg
        })
        .collect()
}

/// Build a streaming chat request body.
pub fn build_openai_compat_body(model: &str, messages: &[ChatMessage]) -> Value {
    json!({
        "model": model,
        "messages": messages_to_openai_compat_json(messages),
        "stream": true,
        "stream_options": { "include_usage": true },
    })
}

// --- streaming chunk parsing ---

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    delta: Delta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
    /// Inline generated images, as emitted by image-capable gateways.
    #[serde(default)]
    images: Vec<DeltaImage>,
}

#[derive(Debug, Deserialize)]
struct DeltaImage {
    image_url: ImageUrl,
}

#[derive(Debug, Deserialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<Value>,
}

fn chunks_from(chunk: StreamChunk) -> Result<Vec<LLMChunk>> {
    if let Some(error) = chunk.error {
        // Mid-stream errors keep their HTTP-like code when the gateway sends one.
        if let Some(status) = error.code.as_ref().and_then(Value::as_u64) {
            return Err(LLMError::Http {
                status: status as u16,
                message: error.message,
            });
        }
        return Err(LLMError::Api(error.message));
    }

    let mut out = Vec::new();

    if let Some(choice) = chunk.choices.into_iter().next() {
        if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
            out.push(LLMChunk::Token(content));
        }
        for image in choice.delta.images {
            match parse_data_url(&image.image_url.url) {
                Some((mime, data)) => out.push(LLMChunk::Image(GeneratedImage {
                    mime_type: mime.to_string(),
                    data: data.to_string(),
                })),
                None => log::debug!("Ignoring non-inline generated image"),
            }
        }
        if let Some(reason) = choice.finish_reason {
            out.push(LLMChunk::Done {
                finish_reason: Some(reason),
            });
        }
    }

    if let Some(usage) = chunk.usage {
        out.push(LLMChunk::Usage(TokenUsage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }));
    }

    Ok(out)
}

/// Parse one SSE `data:` payload.
///
/// - `"[DONE]"` and blank payloads yield nothing
/// - Invalid JSON is an error
pub fn parse_openai_compat_sse_data(data: &str) -> Result<Vec<LLMChunk>> {
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Ok(Vec::new());
    }

    let chunk: StreamChunk = serde_json::from_str(data)?;
    chunks_from(chunk)
}
