//! Bounded retry with exponential backoff and jitter.
//!
//! Every backend call in the pipeline goes through the same
//! [`RetryPolicy`] — retry behaviour is a property of the run, not of any
//! one operation. Only transient errors are retried; every other error
//! class aborts immediately and propagates to the caller.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::BetError;

/// Retry strategy applied uniformly to backend operations.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff_base: f64,
    base_delay: Duration,
    max_jitter: Duration,
}

impl RetryPolicy {
    /// Policy with the standard one-second delay unit and half-second
    /// jitter window.
    pub fn new(max_retries: u32, backoff_base: f64) -> Self {
        Self::with_delays(
            max_retries,
            backoff_base,
            Duration::from_secs(1),
            Duration::from_millis(500),
        )
    }

    /// Fully parameterised policy. Tests use millisecond delay units to
    /// keep backoff waits negligible.
    pub fn with_delays(
        max_retries: u32,
        backoff_base: f64,
        base_delay: Duration,
        max_jitter: Duration,
    ) -> Self {
        Self {
            max_retries,
            backoff_base,
            base_delay,
            max_jitter,
        }
    }

    /// Deterministic part of the delay before retry `attempt` (1-based):
    /// `base_delay × backoff_base^attempt`. Strictly increasing for any
    /// backoff base above 1.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_base.powi(attempt as i32);
        Duration::from_secs_f64(self.base_delay.as_secs_f64() * factor)
    }

    /// Uniform random jitter in `[0, max_jitter)`.
    fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
    }

    /// Run `op` until it succeeds, fails fatally, or the retry budget is
    /// spent. Performs at most `max_retries + 1` attempts; exhaustion
    /// surfaces the last transient cause as [`BetError::RetriesExhausted`].
    pub async fn execute<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, BetError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BetError>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => {
                    debug!(op = label, attempt, "Operation succeeded");
                    return Ok(value);
                }
                Err(e) if e.is_transient() => {
                    if attempt > self.max_retries {
                        warn!(op = label, attempts = attempt, error = %e, "Retry budget spent");
                        return Err(BetError::RetriesExhausted {
                            attempts: attempt,
                            last: e.to_string(),
                        });
                    }
                    let delay = self.delay_for(attempt) + self.jitter();
                    warn!(
                        op = label,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    debug!(op = label, attempt, kind = e.kind(), "Fatal error, not retrying");
                    return Err(e);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
