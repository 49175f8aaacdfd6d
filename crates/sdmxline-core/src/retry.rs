//! Retry with exponential backoff for remote fetches

use std::time::Duration;

use crate::stream::http_config;

/// Backoff policy: `base * 2^attempt` between attempts, at most `max_retries` retries.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub max_retries: u32,
    pub base: Duration,
}

impl Backoff {
    /// Policy from the global [`HttpConfig`](crate::stream::HttpConfig) (1s base: 2s, 4s, 8s, ...)
    pub fn from_config() -> Self {
        Self {
            max_retries: http_config().max_retries,
            base: Duration::from_secs(1),
        }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        self.base * 2u32.saturating_pow(attempt)
    }
}

/// Retry a fallible fetch with exponential backoff.
///
/// `should_retry` inspects each outcome; a retryable outcome is retried until
/// the budget runs out, after which that last outcome is returned as is.
/// This lets HTTP 5xx responses come back as `Ok` once retries are exhausted
/// so the caller can classify them.
pub fn retry_with_backoff<T, E: std::fmt::Display>(
    label: &str,
    backoff: Backoff,
    mut attempt_fn: impl FnMut() -> Result<T, E>,
    should_retry: impl Fn(&Result<T, E>) -> bool,
) -> Result<T, E> {
    let mut attempt = 0u32;
    loop {
        let outcome = attempt_fn();
        if attempt >= backoff.max_retries || !should_retry(&outcome) {
            if let Err(e) = &outcome {
                if attempt > 0 {
                    log::error!("{label}: failed permanently after {attempt} retries: {e}");
                }
            }
            return outcome;
        }
        attempt += 1;
        let delay = backoff.delay(attempt);
        match &outcome {
            Err(e) => log::debug!(
                "{label}: attempt {attempt}/{} failed: {e}, retrying in {delay:?}",
                backoff.max_retries
            ),
            Ok(_) => log::debug!(
                "{label}: attempt {attempt}/{} got a retryable response, retrying in {delay:?}",
                backoff.max_retries
            ),
        }
        std::thread::sleep(delay);
    }
}
