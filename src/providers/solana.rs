//! Solana JSON-RPC adapter (`getBalance`, `getHealth`).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::providers::http::send_json;
use crate::providers::types::{to_display, Balance, BalanceProvider, ProviderError, ProviderResult};

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct BalanceValue {
    value: u64,
}

impl<T> RpcResponse<T> {
    fn into_result(self) -> ProviderResult<T> {
        if let Some(error) = self.error {
            return Err(match error.code {
                // -32005 is the node's "too many requests" code
                -32005 => ProviderError::Http { status: 429, body: error.message, retry_after: None },
                // getBalance takes only the address, so bad params mean a bad address
                -32602 => ProviderError::Rpc(format!("invalid address: {}", error.message)),
                _ => ProviderError::Rpc(error.message),
            });
        }
        self.result
            .ok_or_else(|| ProviderError::Decode("response had neither result nor error".into()))
    }
}

/// Balance source for Solana-compatible JSON-RPC nodes.
#[derive(Debug, Clone)]
pub struct SolanaProvider {
    client: reqwest::Client,
    url: String,
    decimals: u8,
}

impl SolanaProvider {
    pub fn new(client: reqwest::Client, url: &str, decimals: u8) -> Self {
        Self {
            client,
            url: url.to_string(),
            decimals,
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> ProviderResult<T> {
        let body = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });
        let response: RpcResponse<T> = send_json(self.client.post(&self.url).json(&body)).await?;
        response.into_result()
    }
}

#[async_trait]
impl BalanceProvider for SolanaProvider {
    async fn probe(&self) -> ProviderResult<()> {
        let health: String = self.call("getHealth", json!([])).await?;
        if health == "ok" {
            Ok(())
        } else {
            Err(ProviderError::Rpc(format!("node unhealthy: {}", health)))
        }
    }

    async fn fetch_balance(&self, address: &str) -> ProviderResult<Balance> {
        let balance: BalanceValue = self.call("getBalance", json!([address])).await?;
        Ok(Balance {
            raw: balance.value.to_string(),
            display: to_display(balance.value as u128, self.decimals),
            tokens: Vec::new(),
        })
    }
}
