//! Retry eligibility and delay policy.
//!
//! # Rules
//! - Fatal kinds are never retried; their delay is zero
//! - `RateLimited` is retried at most once, after `retry_after` verbatim
//! - `NetworkError`: exponential backoff, base 1s, cap 10s
//! - `ServerError`: exponential backoff, base 2s, cap 30s
//! - `Unknown`: flat 3s
//! - Everything non-fatal is bounded by the caller's attempt cap

use std::time::Duration;

use crate::config::RetryConfig;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::classifier::{Classification, ErrorKind, DEFAULT_RETRY_AFTER_SECS};

/// Retry policy derived from configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    network_base: Duration,
    network_cap: Duration,
    server_base: Duration,
    server_cap: Duration,
    unknown_delay: Duration,
    jitter_ratio: f64,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            network_base: Duration::from_millis(config.network_base_ms),
            network_cap: Duration::from_millis(config.network_cap_ms),
            server_base: Duration::from_millis(config.server_base_ms),
            server_cap: Duration::from_millis(config.server_cap_ms),
            unknown_delay: Duration::from_millis(config.unknown_delay_ms),
            jitter_ratio: config.jitter_ratio,
        }
    }

    /// Whether another attempt may follow `attempts_made` failed attempts.
    pub fn should_retry(&self, classification: &Classification, attempts_made: u32) -> bool {
        if classification.is_fatal {
            return false;
        }
        match classification.kind {
            ErrorKind::RateLimited => attempts_made < 2 && attempts_made < self.max_attempts,
            _ => attempts_made < self.max_attempts,
        }
    }

    /// Delay before the retry that follows `attempts_made` failed attempts.
    pub fn retry_delay(&self, classification: &Classification, attempts_made: u32) -> Duration {
        if classification.is_fatal {
            return Duration::ZERO;
        }
        match classification.kind {
            ErrorKind::RateLimited => Duration::from_secs(
                classification.retry_after_secs.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
            ),
            ErrorKind::NetworkError => calculate_backoff(
                attempts_made,
                self.network_base,
                self.network_cap,
                self.jitter_ratio,
            ),
            ErrorKind::ServerError => calculate_backoff(
                attempts_made,
                self.server_base,
                self.server_cap,
                self.jitter_ratio,
            ),
            _ => self.unknown_delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&RetryConfig::default())
    }
}
