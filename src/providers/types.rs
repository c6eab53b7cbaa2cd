//! Provider-facing types and error definitions.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::types::{Network, TokenBalance};

/// Raw failures reported by a provider adapter.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Http {
        status: u16,
        body: String,
        /// Seconds from a `Retry-After` header, if any.
        retry_after: Option<u64>,
    },

    /// Connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Call exceeded its deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Timeout reported by the HTTP client itself, deadline unknown.
    #[error("request timed out: {0}")]
    TimedOut(String),

    /// Provider-level error message (JSON-RPC error object, API error field).
    #[error("{0}")]
    Rpc(String),

    /// Request refused by a cross-origin or security policy.
    #[error("blocked by security policy: {0}")]
    Blocked(String),

    /// Response did not have the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ProviderError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            ProviderError::Http { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::TimedOut(e.to_string())
        } else if e.is_connect() || e.is_request() {
            ProviderError::Connect(e.to_string())
        } else if let Some(status) = e.status() {
            ProviderError::Http { status: status.as_u16(), body: e.to_string(), retry_after: None }
        } else if e.is_decode() {
            ProviderError::Decode(e.to_string())
        } else {
            ProviderError::Rpc(e.to_string())
        }
    }
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Canonical balance shape every adapter produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Balance {
    /// Base units as a decimal string.
    pub raw: String,
    pub display: f64,
    pub tokens: Vec<TokenBalance>,
}

/// A provider-specific balance source for one network.
#[async_trait]
pub trait BalanceProvider: Send + Sync {
    /// Cheap connectivity probe (chain id, health, tip height).
    async fn probe(&self) -> ProviderResult<()>;

    /// Fetch the balance of `address`.
    async fn fetch_balance(&self, address: &str) -> ProviderResult<Balance>;
}

/// One redundant endpoint serving a network.
#[derive(Clone)]
pub struct ProviderEndpoint {
    pub network: Network,
    pub url: String,
    /// Lower values are tried first.
    pub priority: u32,
    /// Name keyed by the rate limiter (usually the endpoint host).
    pub name: String,
    pub client: Arc<dyn BalanceProvider>,
}

impl fmt::Debug for ProviderEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderEndpoint")
            .field("network", &self.network)
            .field("url", &self.url)
            .field("priority", &self.priority)
            .field("name", &self.name)
            .finish()
    }
}

/// Errors returned by the provider registry.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("no endpoints configured for network {0}")]
    UnknownNetwork(Network),

    #[error("all endpoints for {network} failed: {last_error}")]
    Exhausted { network: Network, last_error: ProviderError },
}

/// Convert base units to a display amount with `decimals` places.
pub fn to_display(raw: u128, decimals: u8) -> f64 {
    raw as f64 / 10f64.powi(decimals as i32)
}
