//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Provider call:
//!     → timeouts.rs (every call has a deadline)
//!     → On failure: classifier.rs (typed kind + retry hint)
//!     → retries.rs (eligible? how long to wait?)
//!     → backoff.rs (exponential delay, optional jitter)
//! ```
//!
//! # Design Decisions
//! - Classification is a pure function of the raw failure
//! - Fatal kinds are never retried
//! - Delays are deterministic unless jitter is configured

pub mod backoff;
pub mod classifier;
pub mod retries;
pub mod timeouts;

pub use classifier::{classify, Classification, ErrorKind};
pub use retries::RetryPolicy;
