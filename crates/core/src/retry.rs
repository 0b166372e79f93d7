//! Bounded retry with exponential backoff for startup connections.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    /// Total attempts, including the first. Zero is treated as one.
    pub attempts: u32,
    /// Delay after the first failure; doubled after each further failure.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Run `op` until it succeeds or `backoff.attempts` are used up, sleeping
/// between failures. Returns the last error when every attempt fails.
///
/// `target` names what is being connected to in the warning logs.
pub async fn with_backoff<T, E, F, Fut>(target: &str, backoff: Backoff, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = backoff.attempts.max(1);
    let mut delay = backoff.initial_delay;

    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts => {
                tracing::warn!(
                    target_name = target,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Connection attempt failed, retrying",
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(backoff.max_delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
