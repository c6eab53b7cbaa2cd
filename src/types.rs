//! Query and result value types shared by every subsystem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::resilience::classifier::ErrorKind;

/// Identifier of a blockchain network (e.g. `"ethereum"`, `"solana"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Network(pub String);

impl Network {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Network {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for Network {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The unit of work. Network and address together form the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    pub network: Network,
    pub address: String,
}

impl Query {
    pub fn new(network: impl Into<Network>, address: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.network, self.address)
    }
}

/// A non-native holding reported alongside the native balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub symbol: String,
    pub amount: f64,
    pub usd_value: Option<f64>,
}

/// Outcome of one completed query.
///
/// `error_kind` is present iff the attempt failed; failed results carry a
/// zero balance and the user-facing message for the kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub network: Network,
    pub address: String,
    /// Balance in base units, as a decimal string.
    pub raw_balance: String,
    pub display_balance: f64,
    pub unit_symbol: String,
    pub usd_value: Option<f64>,
    pub observed_at: DateTime<Utc>,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
    #[serde(default)]
    pub tokens: Vec<TokenBalance>,
}

impl QueryResult {
    /// Build a failed result for `query`.
    pub fn failed(query: &Query, unit_symbol: &str, kind: ErrorKind, message: String) -> Self {
        Self {
            network: query.network.clone(),
            address: query.address.clone(),
            raw_balance: "0".to_string(),
            display_balance: 0.0,
            unit_symbol: unit_symbol.to_string(),
            usd_value: None,
            observed_at: Utc::now(),
            error_kind: Some(kind),
            error_message: Some(message),
            tokens: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error_kind.is_none()
    }

    pub fn query(&self) -> Query {
        Query::new(self.network.clone(), self.address.clone())
    }

    /// Native USD value plus the USD value of every priced token.
    pub fn total_usd_value(&self) -> f64 {
        let tokens: f64 = self.tokens.iter().filter_map(|t| t.usd_value).sum();
        self.usd_value.unwrap_or(0.0) + tokens
    }
}
