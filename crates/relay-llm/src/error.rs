//! LLM client errors and their failure categories.
//!
//! Callers decide retry and fallback from [`FailureKind`], never from the
//! error's display text.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LLMError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Rate limited by provider")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Stream ended without content")]
    EmptyResponse,

    #[error("Request cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, LLMError>;

impl From<reqwest::Error> for LLMError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LLMError::Timeout
        } else if let Some(status) = err.status() {
            LLMError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_decode() {
            LLMError::Stream(err.to_string())
        } else {
            LLMError::Network(err.to_string())
        }
    }
}

/// Closed set of failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Timeout,
    RateLimited,
    Overloaded,
    ServerError,
    EmptyResponse,
    Client,
    Auth,
    Malformed,
    Cancelled,
}

impl FailureKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => FailureKind::Auth,
            408 | 504 => FailureKind::Timeout,
            429 => FailureKind::RateLimited,
            503 | 529 => FailureKind::Overloaded,
            500..=599 => FailureKind::ServerError,
            _ => FailureKind::Client,
        }
    }

    /// Worth retrying against the same model after a backoff.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            FailureKind::Timeout
                | FailureKind::RateLimited
                | FailureKind::Overloaded
                | FailureKind::ServerError
        )
    }

    /// Worth one attempt against the fallback model.
    pub fn is_fallback_eligible(self) -> bool {
        self.is_transient() || self == FailureKind::EmptyResponse
    }
}

impl LLMError {
    pub fn kind(&self) -> FailureKind {
        match self {
            LLMError::Http { status, .. } => FailureKind::from_status(*status),
            LLMError::Timeout => FailureKind::Timeout,
            LLMError::RateLimited { .. } => FailureKind::RateLimited,
            LLMError::Network(_) => FailureKind::ServerError,
            LLMError::Auth(_) => FailureKind::Auth,
            LLMError::Json(_) => FailureKind::Malformed,
            LLMError::EmptyResponse => FailureKind::EmptyResponse,
            LLMError::Cancelled => FailureKind::Cancelled,
            LLMError::Stream(message) | LLMError::Api(message) => classify_error_text(message),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind().is_transient()
    }

    pub fn is_fallback_eligible(&self) -> bool {
        self.kind().is_fallback_eligible()
    }

    /// Provider-requested delay before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            LLMError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Categorise an opaque error message taken off the wire.
///
/// Only used for `Stream`/`Api` errors whose payload is provider text.
/// Unrecognised text is treated as a non-retryable client failure.
pub fn classify_error_text(message: &str) -> FailureKind {
    let lower = message.to_ascii_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["timeout", "timed out", "deadline exceeded"]) {
        FailureKind::Timeout
    } else if has(&["rate limit", "rate_limit", "429", "resource exhausted", "quota"]) {
        FailureKind::RateLimited
    } else if has(&["overloaded", "503", "unavailable", "capacity"]) {
        FailureKind::Overloaded
    } else if has(&["500", "502", "internal error", "internal server error", "bad gateway"]) {
        FailureKind::ServerError
    } else if has(&["unauthorized", "invalid api key", "401", "403"]) {
        FailureKind::Auth
    } else {
        FailureKind::Client
    }
}
