//! Result caching.
//!
//! Successes live for the long TTL, failures for the short one, so a broken
//! address is not hot-looped and a working one respects the rate limits.

pub mod result_cache;

pub use result_cache::{CacheEntry, CacheStats, ResultCache};
