//! Bounded retry with exponential backoff, full jitter and an overall deadline.

use std::future::Future;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::error::LlmError;

/// Errors that know whether another attempt could succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Returned through `From` when the overall retry budget elapses.
#[derive(Debug, Clone)]
pub struct RetryTimeout {
    pub operation: String,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Values below 1 behave as 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
    /// Budget for all attempts and sleeps combined.
    pub overall_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter: true,
            overall_timeout: Some(Duration::from_secs(60)),
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            overall_timeout: None,
            ..Self::default()
        }
    }

    /// Upper bound of the sleep after the given (zero-based) failed attempt.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    fn delay(&self, attempt: u32) -> Duration {
        let cap = self.backoff(attempt);
        if !self.jitter || cap.is_zero() {
            return cap;
        }
        let cap_ms = u64::try_from(cap.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::thread_rng().gen_range(0..=cap_ms))
    }

    /// Run `f` until it succeeds, fails with a non-retryable error, or the
    /// attempt/time budget is exhausted. The last error is returned.
    ///
    /// # Errors
    ///
    /// Returns the final error from `f`, or `E::from(RetryTimeout)` when the
    /// overall timeout elapses first.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut f: F) -> Result<T, E>
    where
        E: Retryable + From<RetryTimeout> + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let start = Instant::now();
        let attempts = self.max_attempts.max(1);

        let attempt_loop = async {
            let mut attempt = 0;
            loop {
                match f().await {
                    Ok(value) => return Ok(value),
                    Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                        let delay = self.delay(attempt);
                        tracing::warn!(
                            operation,
                            attempt = attempt + 1,
                            max_attempts = attempts,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            "retrying after error: {e}"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        match self.overall_timeout {
            Some(budget) => tokio::time::timeout(budget, attempt_loop)
                .await
                .unwrap_or_else(|_| {
                    Err(E::from(RetryTimeout {
                        operation: operation.to_owned(),
                        elapsed: start.elapsed(),
                    }))
                }),
            None => attempt_loop.await,
        }
    }
}

impl Retryable for LlmError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::RateLimited | Self::Unavailable { .. } | Self::Timeout(_) => true,
            _ => false,
        }
    }
}

impl From<RetryTimeout> for LlmError {
    fn from(t: RetryTimeout) -> Self {
        Self::Timeout(t.elapsed)
    }
}
