use std::time::Duration;

use relay_core::StreamSettings;

/// Delivery parameters for one streamed response.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// Platform limit on characters per message.
    pub max_message_chars: usize,
    /// Minimum interval between throttled edits.
    pub edit_delay: Duration,
    /// Suffix shown while a message is still being written.
    pub streaming_marker: String,
    pub first_content_timeout: Duration,
    pub response_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::from(&StreamSettings::default())
    }
}

impl From<&StreamSettings> for StreamConfig {
    fn from(settings: &StreamSettings) -> Self {
        Self {
            max_message_chars: settings.max_message_chars,
            edit_delay: Duration::from_millis(settings.edit_delay_ms),
            streaming_marker: settings.streaming_marker.clone(),
            first_content_timeout: Duration::from_secs(settings.first_content_timeout_secs),
            response_timeout: Duration::from_secs(settings.response_timeout_secs),
        }
    }
}

impl StreamConfig {
    /// Characters available to content while the streaming marker is shown.
    /// Never less than one so splitting always makes progress.
    pub fn content_capacity(&self) -> usize {
        self.max_message_chars
            .saturating_sub(self.streaming_marker.chars().count())
            .max(1)
    }
}
