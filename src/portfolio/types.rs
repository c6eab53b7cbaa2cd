//! Portfolio value types.

use serde::{Deserialize, Serialize};

use crate::types::{Network, Query};

/// A wallet as supplied by the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletRecord {
    pub id: String,
    pub network: Network,
    pub address: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub last_known_balance: Option<f64>,
}

impl WalletRecord {
    pub fn query(&self) -> Query {
        Query::new(self.network.clone(), self.address.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub network: Network,
    pub total_value: f64,
    pub wallet_count: usize,
    pub share_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSummary {
    pub symbol: String,
    pub total_value: f64,
    pub total_amount: f64,
    pub holder_count: usize,
}

/// Derived view, recomputed on demand and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub total_value: f64,
    pub wallet_count: usize,
    /// Descending by value.
    pub networks: Vec<NetworkSummary>,
    /// Descending by value, at most ten.
    pub top_tokens: Vec<TokenSummary>,
    /// 0 to 100.
    pub diversification_score: u32,
}
