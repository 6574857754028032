//! Retry policy for remote ledger calls.
//!
//! Only idempotent methods are retried, and only when the request never
//! produced a response body (connection refused, timeout, reset).

use rand::Rng;
use reqwest::Method;
use std::time::Duration;

use crate::config::RetryConfig;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        let max_attempts = if config.enabled {
            config.max_attempts.max(1)
        } else {
            1
        };
        Self {
            max_attempts,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Number of attempts allowed for `method`.
    pub fn attempts_for(&self, method: &Method) -> u32 {
        if is_idempotent(method) {
            self.max_attempts
        } else {
            1
        }
    }

    /// Delay before attempt number `attempt` (1-based retry count).
    ///
    /// Doubles from `base_delay_ms`, capped at `max_delay_ms`, plus up to
    /// 10% jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
        let capped = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);

        let jitter = match capped / 10 {
            0 => 0,
            range => rand::thread_rng().gen_range(0..range),
        };
        Duration::from_millis(capped + jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Whether a transport error is worth another attempt.
pub fn is_retryable(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout() || error.is_request()
}

fn is_idempotent(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}
