//! Exponential backoff with optional jitter.

use rand::Rng;
use std::time::Duration;

/// Calculate the delay before retry `attempt` (1-based).
///
/// `base * 2^(attempt-1)`, capped at `max`. `jitter_ratio` adds up to that
/// fraction of the capped delay on top; `0.0` keeps the delay deterministic.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration, jitter_ratio: f64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponential_base = 2u32.saturating_pow(attempt - 1);
    let capped_delay = base.saturating_mul(exponential_base).min(max);

    if jitter_ratio <= 0.0 {
        return capped_delay;
    }

    let jitter_range = (capped_delay.as_millis() as f64 * jitter_ratio) as u64;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    capped_delay + Duration::from_millis(jitter)
}
