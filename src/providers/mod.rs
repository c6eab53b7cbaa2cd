//! Provider integration subsystem.
//!
//! # Data Flow
//! ```text
//! EngineConfig.networks
//!     → build_registry (one adapter per endpoint)
//!     → registry.rs (priority order, probing, known-good endpoint)
//!     → evm.rs / solana.rs / esplora.rs (provider payload → Balance)
//! ```
//!
//! # Design Decisions
//! - Provider field names never leave the adapter modules
//! - Every adapter yields the same canonical `Balance`
//! - Constructing an adapter performs no network traffic

pub mod esplora;
pub mod evm;
pub mod http;
pub mod prices;
pub mod registry;
pub mod solana;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{EngineConfig, NetworkConfig, ProviderKind};
use crate::types::Network;

pub use prices::{PriceSource, StaticPrices};
pub use registry::{NetworkProfile, ProviderRegistry};
pub use types::{
    Balance, BalanceProvider, ProviderEndpoint, ProviderError, ProviderResult, RegistryError,
};

/// Build the registry and the static price table from configuration.
pub fn build_registry(config: &EngineConfig) -> ProviderResult<(ProviderRegistry, StaticPrices)> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.scheduler.request_timeout_secs))
        .user_agent(concat!("balance-engine/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ProviderError::Connect(format!("failed to build HTTP client: {}", e)))?;

    let mut registry = ProviderRegistry::new(Duration::from_secs(config.scheduler.probe_timeout_secs));
    let mut prices = HashMap::new();

    for network_cfg in &config.networks {
        let network = Network::from(network_cfg.id.as_str());
        let mut endpoints = Vec::with_capacity(network_cfg.endpoints.len());

        for endpoint_cfg in &network_cfg.endpoints {
            let client = build_client(network_cfg, &endpoint_cfg.url, &http)?;
            let name = endpoint_cfg
                .name
                .clone()
                .unwrap_or_else(|| endpoint_name(&endpoint_cfg.url));
            endpoints.push(ProviderEndpoint {
                network: network.clone(),
                url: endpoint_cfg.url.clone(),
                priority: endpoint_cfg.priority,
                name,
                client,
            });
        }

        if let Some(price) = network_cfg.usd_price {
            prices.insert(network.clone(), price);
        }

        registry.register(
            NetworkProfile {
                network,
                symbol: network_cfg.symbol.clone(),
                decimals: network_cfg.decimals,
                bulk: network_cfg.bulk_enabled(),
            },
            endpoints,
        );
    }

    tracing::info!(networks = config.networks.len(), "Provider registry built");
    Ok((registry, StaticPrices::new(prices)))
}

fn build_client(
    network: &NetworkConfig,
    url: &str,
    http: &reqwest::Client,
) -> ProviderResult<Arc<dyn BalanceProvider>> {
    let client: Arc<dyn BalanceProvider> = match network.kind {
        ProviderKind::Evm => Arc::new(evm::EvmProvider::new(url, network.decimals, network.chain_id)?),
        ProviderKind::Solana => Arc::new(solana::SolanaProvider::new(http.clone(), url, network.decimals)),
        ProviderKind::Esplora => Arc::new(esplora::EsploraProvider::new(http.clone(), url, network.decimals)),
    };
    Ok(client)
}

/// Rate-limit key for an endpoint: its host, or the raw URL when unparsable.
pub fn endpoint_name(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}
