use std::fmt;

/// Phase of a streamed response, reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseState {
    Streaming,
    SplittingNewMessage,
    EditingMessage,
    FallbackRetry,
    Error,
    Completed,
}

impl ResponseState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ResponseState::Error | ResponseState::Completed)
    }
}

impl fmt::Display for ResponseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResponseState::Streaming => "streaming",
            ResponseState::SplittingNewMessage => "splitting_new_message",
            ResponseState::EditingMessage => "editing_message",
            ResponseState::FallbackRetry => "fallback_retry",
            ResponseState::Error => "error",
            ResponseState::Completed => "completed",
        };
        f.write_str(name)
    }
}
