//! Retry decisions and backoff delays
//!
//! The policy is advisory: it answers "retry?" and "how long to wait?", the
//! pipeline does the sleeping and the reissuing.

use std::time::Duration;

use backstop_domain::{AppError, JitterMode, RetryConfig};
use rand::Rng;

/// Exponential backoff policy over a fixed [`RetryConfig`].
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Whether a request that failed with `error` after `retry_count`
    /// retries should be attempted again.
    ///
    /// Always false once `retry_count` reaches `max_retries`; otherwise true
    /// iff the error kind is in the retryable set.
    pub fn should_retry(&self, error: &AppError, retry_count: u32) -> bool {
        if retry_count >= self.config.max_retries {
            return false;
        }
        self.config.retryable_kinds.contains(&error.kind)
    }

    /// Deterministic delay before retry number `retry_count + 1`:
    /// `base_delay * 2^retry_count`, saturating instead of overflowing.
    pub fn compute_delay(&self, retry_count: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry_count);
        Duration::from_millis(self.config.base_delay_ms.saturating_mul(factor))
    }

    /// Delay actually slept by the pipeline.
    ///
    /// With [`JitterMode::None`] this is exactly [`Self::compute_delay`].
    /// With [`JitterMode::Decorrelated`] the delay is drawn from
    /// `[base, 3 * previous]`, capped at three times the exponential delay.
    pub fn backoff_delay(&self, retry_count: u32, previous: Option<Duration>) -> Duration {
        let exponential = self.compute_delay(retry_count);
        match self.config.jitter {
            JitterMode::None => exponential,
            JitterMode::Decorrelated => {
                let base = self.config.base_delay_ms;
                let previous = previous.map_or(base, duration_millis);
                let cap = duration_millis(exponential).saturating_mul(3);
                let upper = previous.saturating_mul(3).max(base).min(cap);
                if upper <= base {
                    return Duration::from_millis(base);
                }
                Duration::from_millis(rand::thread_rng().gen_range(base..=upper))
            }
        }
    }
}

/// Whole milliseconds, saturating at `u64::MAX`.
pub fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
