//! Exponential backoff for summarizer calls.

use std::future::Future;
use std::time::Duration;

use relay_core::RetrySettings;
use relay_llm::LLMError;

use crate::error::ContextError;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            multiplier: settings.multiplier,
            max_delay: Duration::from_millis(settings.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let delay = Duration::from_secs_f64(
            self.initial_delay.as_secs_f64() * self.multiplier.powi(retry as i32),
        );
        delay.min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or the
    /// attempt budget is spent. A provider `retry_after` hint stretches the
    /// backoff up to `max_delay`.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, ContextError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, LLMError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let backoff = self.delay_for(attempt - 1);
                    let delay = err
                        .retry_after()
                        .map_or(backoff, |hint| hint.max(backoff))
                        .min(self.max_delay);
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Summarizer call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(source) => {
                    return Err(ContextError::Summarization {
                        attempts: attempt,
                        source,
                    })
                }
            }
        }
    }
}
