//! Per-network endpoint registry with known-good tracking.
//!
//! # Responsibilities
//! - Hold each network's endpoints ordered by priority
//! - Probe endpoints in order and remember the first that answers
//! - Forget the known-good endpoint when it fails
//!
//! # Design Decisions
//! - One async probe lock per network; probing one network never blocks another
//! - The known-good map is read without holding any lock across an await

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::observability::metrics;
use crate::providers::types::{ProviderEndpoint, ProviderError, RegistryError};
use crate::resilience::timeouts::with_timeout;
use crate::types::Network;

/// Static description of a network the registry serves.
#[derive(Debug, Clone)]
pub struct NetworkProfile {
    pub network: Network,
    pub symbol: String,
    pub decimals: u8,
    /// Providers for this network tolerate parallel reads.
    pub bulk: bool,
}

struct NetworkEntry {
    profile: NetworkProfile,
    endpoints: Vec<Arc<ProviderEndpoint>>,
    probe_lock: Mutex<()>,
}

/// Ordered endpoint lists per network.
pub struct ProviderRegistry {
    networks: HashMap<Network, NetworkEntry>,
    known_good: DashMap<Network, Arc<ProviderEndpoint>>,
    probe_timeout: Duration,
}

impl ProviderRegistry {
    pub fn new(probe_timeout: Duration) -> Self {
        Self {
            networks: HashMap::new(),
            known_good: DashMap::new(),
            probe_timeout,
        }
    }

    /// Register a network and its endpoints. Endpoints are stably sorted by priority.
    pub fn register(&mut self, profile: NetworkProfile, mut endpoints: Vec<ProviderEndpoint>) {
        endpoints.sort_by_key(|e| e.priority);
        tracing::debug!(
            network = %profile.network,
            endpoints = endpoints.len(),
            bulk = profile.bulk,
            "Registered network"
        );
        let network = profile.network.clone();
        self.networks.insert(
            network,
            NetworkEntry {
                profile,
                endpoints: endpoints.into_iter().map(Arc::new).collect(),
                probe_lock: Mutex::new(()),
            },
        );
    }

    /// Return a working endpoint for `network`.
    pub async fn acquire(&self, network: &Network) -> Result<Arc<ProviderEndpoint>, RegistryError> {
        self.acquire_excluding(network, &[]).await
    }

    /// Return a working endpoint whose URL is not in `tried`.
    pub async fn acquire_excluding(
        &self,
        network: &Network,
        tried: &[String],
    ) -> Result<Arc<ProviderEndpoint>, RegistryError> {
        let entry = self
            .networks
            .get(network)
            .ok_or_else(|| RegistryError::UnknownNetwork(network.clone()))?;

        if let Some(good) = self.known_good_untried(network, tried) {
            return Ok(good);
        }

        let _probe = entry.probe_lock.lock().await;

        // Another caller may have finished probing while we waited.
        if let Some(good) = self.known_good_untried(network, tried) {
            return Ok(good);
        }

        let mut last_error = None;
        for endpoint in entry.endpoints.iter().filter(|e| !tried.contains(&e.url)) {
            match with_timeout(self.probe_timeout, endpoint.client.probe()).await {
                Ok(()) => {
                    tracing::info!(network = %network, url = %endpoint.url, "Endpoint probe succeeded");
                    metrics::record_probe(network.as_str(), true);
                    self.known_good.insert(network.clone(), endpoint.clone());
                    return Ok(endpoint.clone());
                }
                Err(e) => {
                    tracing::warn!(network = %network, url = %endpoint.url, error = %e, "Endpoint probe failed, trying next");
                    metrics::record_probe(network.as_str(), false);
                    last_error = Some(e);
                }
            }
        }

        Err(RegistryError::Exhausted {
            network: network.clone(),
            last_error: last_error
                .unwrap_or_else(|| ProviderError::Connect("no untried endpoints remain".to_string())),
        })
    }

    /// Forget the known-good endpoint for `network`.
    pub fn invalidate(&self, network: &Network) {
        if let Some((_, endpoint)) = self.known_good.remove(network) {
            tracing::debug!(network = %network, url = %endpoint.url, "Invalidated known-good endpoint");
        }
    }

    /// Currently remembered endpoint, if any.
    pub fn known_good(&self, network: &Network) -> Option<Arc<ProviderEndpoint>> {
        self.known_good.get(network).map(|r| r.value().clone())
    }

    pub fn profile(&self, network: &Network) -> Option<&NetworkProfile> {
        self.networks.get(network).map(|e| &e.profile)
    }

    pub fn endpoints(&self, network: &Network) -> &[Arc<ProviderEndpoint>] {
        self.networks
            .get(network)
            .map(|e| e.endpoints.as_slice())
            .unwrap_or(&[])
    }

    pub fn supports_bulk(&self, network: &Network) -> bool {
        self.networks.get(network).is_some_and(|e| e.profile.bulk)
    }

    pub fn networks(&self) -> Vec<Network> {
        let mut all: Vec<Network> = self.networks.keys().cloned().collect();
        all.sort();
        all
    }

    fn known_good_untried(&self, network: &Network, tried: &[String]) -> Option<Arc<ProviderEndpoint>> {
        self.known_good
            .get(network)
            .map(|r| r.value().clone())
            .filter(|e| !tried.contains(&e.url))
    }
}
