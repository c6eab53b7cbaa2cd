//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → EngineConfig (validated, immutable)
//!     → handed to BalanceEngine::from_config
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → new EngineConfig sent over a channel
//!     → daemon reconciles the watch list
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Only the watch list is hot-reloaded; engine tuning needs a restart

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, CacheConfig, EndpointConfig, EngineConfig, LogFormat, MonitorConfig,
    NetworkConfig, ObservabilityConfig, ProviderKind, RateLimitConfig, RetryConfig,
    SchedulerConfig, WatchConfig,
};
