pub mod error;
pub mod openai;
pub mod openai_compat;
pub mod provider;
pub mod sse;
pub mod types;

pub use error::{classify_error_text, FailureKind, LLMError, Result};
pub use openai::OpenAIProvider;
pub use provider::{collect_text, LLMProvider, LLMStream, SharedLLMProvider};
pub use sse::llm_stream_from_sse;
pub use types::{LLMChunk, TokenUsage};
