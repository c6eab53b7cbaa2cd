//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the engine.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the balance engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Outbound call spacing.
    pub rate_limit: RateLimitConfig,

    /// Result cache TTLs and sweeping.
    pub cache: CacheConfig,

    /// Queueing, batching and bulk fan-out.
    pub scheduler: SchedulerConfig,

    /// Retry attempt cap and backoff tuning.
    pub retries: RetryConfig,

    /// Watch-list defaults and ring buffer sizes.
    pub monitor: MonitorConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,

    /// Networks and their redundant endpoints.
    pub networks: Vec<NetworkConfig>,

    /// Entities to watch at startup.
    pub watch: Vec<WatchConfig>,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Minimum gap between any two outbound calls.
    pub min_global_gap_ms: u64,

    /// Minimum gap between two calls to the same provider.
    pub min_provider_gap_ms: u64,

    /// Extra stall applied to a provider after it throttles us.
    pub cooldown_ms: u64,
}

impl RateLimitConfig {
    pub fn min_global_gap(&self) -> Duration {
        Duration::from_millis(self.min_global_gap_ms)
    }

    pub fn min_provider_gap(&self) -> Duration {
        Duration::from_millis(self.min_provider_gap_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_global_gap_ms: 5_000,
            min_provider_gap_ms: 15_000,
            cooldown_ms: 120_000,
        }
    }
}

/// Result cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL for successful results in seconds.
    pub success_ttl_secs: u64,

    /// TTL for failed results in seconds.
    pub failure_ttl_secs: u64,

    /// Interval between physical sweeps in seconds (0 disables sweeping).
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            success_ttl_secs: 300,
            failure_ttl_secs: 30,
            sweep_interval_secs: 300,
        }
    }
}

/// Batch scheduler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Items drained per batch.
    pub batch_size: usize,

    /// Delay between items of one batch in milliseconds.
    pub inter_item_delay_ms: u64,

    /// Delay between batches in milliseconds.
    pub inter_batch_delay_ms: u64,

    /// Concurrent calls allowed on the bulk path.
    pub bulk_concurrency: usize,

    /// Pause between bulk inner batches in milliseconds.
    pub bulk_pause_ms: u64,

    /// Deadline for a single provider call in seconds.
    pub request_timeout_secs: u64,

    /// Deadline for an endpoint connectivity probe in seconds.
    pub probe_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: 3,
            inter_item_delay_ms: 1_500,
            inter_batch_delay_ms: 3_000,
            bulk_concurrency: 10,
            bulk_pause_ms: 250,
            request_timeout_secs: 10,
            probe_timeout_secs: 5,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts per endpoint for transient failures.
    pub max_attempts: u32,

    /// Backoff base for network errors in milliseconds.
    pub network_base_ms: u64,

    /// Backoff cap for network errors in milliseconds.
    pub network_cap_ms: u64,

    /// Backoff base for server errors in milliseconds.
    pub server_base_ms: u64,

    /// Backoff cap for server errors in milliseconds.
    pub server_cap_ms: u64,

    /// Flat delay for unclassified errors in milliseconds.
    pub unknown_delay_ms: u64,

    /// Fraction of each backoff added as random jitter (0 disables).
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            network_base_ms: 1_000,
            network_cap_ms: 10_000,
            server_base_ms: 2_000,
            server_cap_ms: 30_000,
            unknown_delay_ms: 3_000,
            jitter_ratio: 0.0,
        }
    }
}

/// Monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// History entries kept per watched entity.
    pub history_capacity: usize,

    /// Alerts kept across all entities.
    pub alert_capacity: usize,

    /// Check interval used when a watch entry gives none.
    pub default_interval_minutes: u64,

    /// Alert threshold used when a watch entry gives none.
    pub default_threshold_percent: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            history_capacity: 100,
            alert_capacity: 50,
            default_interval_minutes: 5,
            default_threshold_percent: 5.0,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Which adapter speaks to a network's endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Evm,
    Solana,
    Esplora,
}

/// A network and its redundant endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// Network identifier used in queries (e.g. "ethereum").
    pub id: String,

    /// Native unit symbol (e.g. "ETH").
    pub symbol: String,

    /// Decimal places of the native unit.
    pub decimals: u8,

    /// Adapter kind.
    pub kind: ProviderKind,

    /// Expected EVM chain id, verified during probing.
    #[serde(default)]
    pub chain_id: Option<u64>,

    /// Static USD price of the native unit.
    #[serde(default)]
    pub usd_price: Option<f64>,

    /// Allow the bulk fan-out path (defaults to true for EVM).
    #[serde(default)]
    pub bulk: Option<bool>,

    /// Endpoints, tried in ascending priority order.
    pub endpoints: Vec<EndpointConfig>,
}

impl NetworkConfig {
    pub fn bulk_enabled(&self) -> bool {
        self.bulk.unwrap_or(self.kind == ProviderKind::Evm)
    }
}

/// One provider endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Endpoint URL.
    pub url: String,

    /// Lower values are tried first.
    #[serde(default)]
    pub priority: u32,

    /// Rate-limit key; defaults to the URL host.
    #[serde(default)]
    pub name: Option<String>,
}

/// A watch-list entry.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WatchConfig {
    pub network: String,
    pub address: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub check_interval_minutes: Option<u64>,
    #[serde(default)]
    pub alert_threshold_percent: Option<f64>,
}
