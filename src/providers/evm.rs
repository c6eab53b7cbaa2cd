//! EVM JSON-RPC adapter.
//!
//! # Responsibilities
//! - Connect to a JSON-RPC endpoint through alloy
//! - Probe connectivity with `eth_chainId` (and verify it when configured)
//! - Fetch native balances with `eth_getBalance`
//! - Translate transport errors into `ProviderError`

use alloy::primitives::utils::format_units;
use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::transports::{RpcError, TransportErrorKind};
use async_trait::async_trait;
use std::sync::Arc;

use crate::providers::types::{Balance, BalanceProvider, ProviderError, ProviderResult};

/// Balance source backed by an alloy HTTP provider.
#[derive(Clone)]
pub struct EvmProvider {
    provider: Arc<dyn Provider + Send + Sync>,
    decimals: u8,
    expected_chain_id: Option<u64>,
}

impl EvmProvider {
    /// Create a provider for `url`. No network traffic happens here.
    pub fn new(url: &str, decimals: u8, expected_chain_id: Option<u64>) -> ProviderResult<Self> {
        let parsed: url::Url = url
            .parse()
            .map_err(|e| ProviderError::Rpc(format!("invalid RPC URL '{}': {}", url, e)))?;
        let provider = Arc::new(ProviderBuilder::new().connect_http(parsed)) as Arc<dyn Provider + Send + Sync>;

        Ok(Self {
            provider,
            decimals,
            expected_chain_id,
        })
    }
}

#[async_trait]
impl BalanceProvider for EvmProvider {
    async fn probe(&self) -> ProviderResult<()> {
        let chain_id = self.provider.get_chain_id().await.map_err(map_rpc_error)?;
        match self.expected_chain_id {
            Some(expected) if expected != chain_id => Err(ProviderError::Rpc(format!(
                "chain id mismatch: expected {}, got {}",
                expected, chain_id
            ))),
            _ => Ok(()),
        }
    }

    async fn fetch_balance(&self, address: &str) -> ProviderResult<Balance> {
        let address: Address = address
            .parse()
            .map_err(|e| ProviderError::Rpc(format!("invalid address: {}", e)))?;

        let wei = self.provider.get_balance(address).await.map_err(map_rpc_error)?;
        let display = format_units(wei, self.decimals)
            .map_err(|e| ProviderError::Decode(e.to_string()))?
            .parse::<f64>()
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        Ok(Balance {
            raw: wei.to_string(),
            display,
            tokens: Vec::new(),
        })
    }
}

fn map_rpc_error(error: RpcError<TransportErrorKind>) -> ProviderError {
    match &error {
        RpcError::Transport(TransportErrorKind::HttpError(http)) => ProviderError::Http {
            status: http.status,
            body: http.body.clone(),
            retry_after: None,
        },
        RpcError::Transport(_) => ProviderError::Connect(error.to_string()),
        RpcError::ErrorResp(payload) => ProviderError::Rpc(payload.message.to_string()),
        RpcError::DeserError { .. } => ProviderError::Decode(error.to_string()),
        _ => ProviderError::Rpc(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_url() {
        let result = EvmProvider::new("not a url", 18, None);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_invalid_address_is_reported_before_any_call() {
        let provider = EvmProvider::new("http://127.0.0.1:1", 18, None).unwrap();
        let err = provider.fetch_balance("nope").await.unwrap_err();
        assert!(err.to_string().contains("invalid address"));
    }

    #[tokio::test]
    async fn test_unreachable_probe_fails() {
        // Port 1 is never listening; the probe should fail, not panic.
        let provider = EvmProvider::new("http://127.0.0.1:1", 18, Some(1)).unwrap();
        assert!(provider.probe().await.is_err());
    }
}
