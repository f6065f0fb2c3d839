use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Bounded retry with pure exponential backoff (no jitter).
#[derive(Debug, Clone, Copy)]
pub struct ExponentialRetrier {
    max_attempts: u32,
    initial_delay: Duration,
}

impl ExponentialRetrier {
    /// `max_attempts` counts the first call; a value of 0 still runs once.
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
        }
    }

    /// Run `operation` until it succeeds or attempts run out, doubling the
    /// delay after every failure. Returns the last error on exhaustion.
    pub async fn retry<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut delay = self.initial_delay;
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_attempts => {
                    warn!(
                        "Failed: {}. Retrying in {}ms... ({} retries left)",
                        err,
                        delay.as_millis(),
                        self.max_attempts - attempt
                    );
                    sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
