//! Esplora REST adapter for Bitcoin-style UTXO chains.

use async_trait::async_trait;
use serde::Deserialize;

use crate::providers::http::{send_json, send_text};
use crate::providers::types::{to_display, Balance, BalanceProvider, ProviderError, ProviderResult};

#[derive(Debug, Deserialize)]
struct AddressInfo {
    chain_stats: TxoStats,
}

#[derive(Debug, Deserialize)]
struct TxoStats {
    funded_txo_sum: u64,
    spent_txo_sum: u64,
}

/// Balance source for Esplora-compatible explorers.
#[derive(Debug, Clone)]
pub struct EsploraProvider {
    client: reqwest::Client,
    base_url: String,
    decimals: u8,
}

impl EsploraProvider {
    pub fn new(client: reqwest::Client, base_url: &str, decimals: u8) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            decimals,
        }
    }
}

#[async_trait]
impl BalanceProvider for EsploraProvider {
    async fn probe(&self) -> ProviderResult<()> {
        let height = send_text(self.client.get(format!("{}/blocks/tip/height", self.base_url))).await?;
        height
            .trim()
            .parse::<u64>()
            .map(|_| ())
            .map_err(|e| ProviderError::Decode(format!("tip height: {}", e)))
    }

    async fn fetch_balance(&self, address: &str) -> ProviderResult<Balance> {
        let url = format!("{}/address/{}", self.base_url, address);
        let info: AddressInfo = match send_json(self.client.get(url)).await {
            Ok(info) => info,
            // Esplora answers malformed addresses with a plain 400
            Err(ProviderError::Http { status: 400, body, .. }) => {
                return Err(ProviderError::Rpc(format!("invalid address: {}", body.trim())));
            }
            Err(e) => return Err(e),
        };

        let sats = info.chain_stats.funded_txo_sum.saturating_sub(info.chain_stats.spent_txo_sum);
        Ok(Balance {
            raw: sats.to_string(),
            display: to_display(sats as u128, self.decimals),
            tokens: Vec::new(),
        })
    }
}
