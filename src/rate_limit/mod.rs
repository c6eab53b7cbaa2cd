//! Outbound rate limiting.
//!
//! # Design Decisions
//! - One global queue, one worker: predictable call spacing over throughput
//! - Gaps are enforced globally and per provider name
//! - Throttling pushes the provider's window into the future, so the
//!   ordinary gap calculation produces the escalation

pub mod limiter;
pub mod window;

pub use limiter::RateLimiter;
pub use window::RateWindow;
