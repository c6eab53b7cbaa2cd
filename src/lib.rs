//! Balance aggregation and monitoring engine.
//!
//! Turns `(network, address)` queries into reliable, de-duplicated, cached
//! results over unreliable, rate-limited public endpoints, and re-queries a
//! watch list on a timer to record history and raise change alerts.

pub mod admin;
pub mod cache;
pub mod config;
pub mod engine;
pub mod lifecycle;
pub mod monitor;
pub mod notifications;
pub mod observability;
pub mod portfolio;
pub mod providers;
pub mod rate_limit;
pub mod resilience;
pub mod scheduler;
pub mod types;

pub use config::EngineConfig;
pub use engine::{BalanceEngine, EngineParts};
pub use lifecycle::Shutdown;
pub use resilience::ErrorKind;
pub use types::{Network, Query, QueryResult};
