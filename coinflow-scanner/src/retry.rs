//! Bounded retry policy for listing pages.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per page, including the first request.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Build a new session with a new identity and proxy between attempts.
    pub rotate_identity: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            base_delay_ms: 1000,
            max_delay_ms: 5000,
            rotate_identity: true,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    ///
    /// Exponential from `base_delay_ms`, capped at `max_delay_ms`, plus up to
    /// 10% jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponential = 2u64.saturating_pow(attempt - 1);
        let capped = self
            .base_delay_ms
            .saturating_mul(exponential)
            .min(self.max_delay_ms);

        let jitter_range = capped / 10;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..jitter_range)
        } else {
            0
        };

        Duration::from_millis(capped + jitter)
    }
}

/// Whether a response must be retried: non-2xx status or a rate-limit body.
pub fn is_unsuccessful(status: u16, body: &str) -> bool {
    !(200..=299).contains(&status) || body.trim_start().starts_with("Too")
}
