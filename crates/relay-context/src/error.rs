use relay_core::PlatformError;
use relay_llm::LLMError;
use thiserror::Error;

/// Errors from populating a node during chain traversal. None of these
/// stop the walk; they degrade the node and surface as warnings.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Unsupported attachment {filename} ({content_type})")]
    UnsupportedAttachment {
        filename: String,
        content_type: String,
    },

    #[error("Lookup timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Summarization outcomes that end the summarization phase early.
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Summarizer failed after {attempts} attempt(s): {source}")]
    Summarization {
        attempts: u32,
        #[source]
        source: LLMError,
    },

    #[error("Summary did not save tokens ({summary_tokens} >= {original_tokens})")]
    NoSavings {
        original_tokens: u32,
        summary_tokens: u32,
    },
}
