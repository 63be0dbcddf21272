use relay_core::PlatformError;
use relay_llm::LLMError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResponseError {
    /// The model stream failed and no fallback was left to try.
    #[error("Response from {model} failed: {source}")]
    Stream {
        model: String,
        #[source]
        source: LLMError,
    },

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
}

impl ResponseError {
    pub fn is_stream_failure(&self) -> bool {
        matches!(self, ResponseError::Stream { .. })
    }
}

/// Why a job was not queued.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Worker queue is full, message dropped")]
    QueueFull,

    #[error("Worker pool is shut down")]
    Closed,
}
