//! Shared fixtures for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use balance_engine::config::EngineConfig;
use balance_engine::notifications::MemorySink;
use balance_engine::providers::{
    Balance, BalanceProvider, NetworkProfile, ProviderEndpoint, ProviderError, ProviderRegistry,
    ProviderResult, StaticPrices,
};
use balance_engine::{BalanceEngine, EngineParts};

pub const NETWORK: &str = "ethereum";
pub const ETH_USD: f64 = 2000.0;

pub fn balance(display: f64) -> Balance {
    Balance {
        raw: format!("{}", (display * 1e18) as u128),
        display,
        tokens: Vec::new(),
    }
}

pub fn http_error(status: u16) -> ProviderError {
    ProviderError::Http { status, body: String::new(), retry_after: None }
}

/// A provider that plays back a script, then repeats a fallback outcome.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<ProviderResult<Balance>>>,
    fallback: ProviderResult<Balance>,
    latency: Duration,
    calls: AtomicUsize,
    call_times: Mutex<Vec<Instant>>,
    addresses: Mutex<Vec<String>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(script: Vec<ProviderResult<Balance>>, fallback: ProviderResult<Balance>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
            call_times: Mutex::new(Vec::new()),
            addresses: Mutex::new(Vec::new()),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
        }
    }

    pub fn ok(display: f64) -> Self {
        Self::new(Vec::new(), Ok(balance(display)))
    }

    pub fn failing(error: ProviderError) -> Self {
        Self::new(Vec::new(), Err(error))
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().clone()
    }

    /// Addresses in the order their calls started.
    pub fn addresses(&self) -> Vec<String> {
        self.addresses.lock().clone()
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BalanceProvider for ScriptedProvider {
    async fn probe(&self) -> ProviderResult<()> {
        Ok(())
    }

    async fn fetch_balance(&self, address: &str) -> ProviderResult<Balance> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().push(Instant::now());
        self.addresses.lock().push(address.to_string());
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(running, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.running.fetch_sub(1, Ordering::SeqCst);
        let next = self.script.lock().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

/// One endpoint to register: URL, priority and the provider behind it.
pub struct MockEndpoint {
    pub url: &'static str,
    pub priority: u32,
    pub provider: Arc<ScriptedProvider>,
}

pub fn endpoint(url: &'static str, priority: u32, provider: Arc<ScriptedProvider>) -> MockEndpoint {
    MockEndpoint { url, priority, provider }
}

/// Build an engine serving `ethereum` from `endpoints`.
pub fn engine_with(
    endpoints: Vec<MockEndpoint>,
    bulk: bool,
    config: EngineConfig,
) -> (Arc<BalanceEngine>, Arc<MemorySink>) {
    let mut registry = ProviderRegistry::new(Duration::from_secs(config.scheduler.probe_timeout_secs));
    registry.register(
        NetworkProfile { network: NETWORK.into(), symbol: "ETH".into(), decimals: 18, bulk },
        endpoints
            .into_iter()
            .map(|e| ProviderEndpoint {
                network: NETWORK.into(),
                url: e.url.to_string(),
                priority: e.priority,
                name: e.url.to_string(),
                client: e.provider,
            })
            .collect(),
    );

    let sink = Arc::new(MemorySink::new());
    let prices = StaticPrices::new(HashMap::from([(NETWORK.into(), ETH_USD)]));
    let engine = BalanceEngine::new(EngineParts {
        registry,
        prices: Arc::new(prices),
        sink: sink.clone(),
        config,
    });
    (Arc::new(engine), sink)
}

/// Single-endpoint serial engine with default tuning.
pub fn single(provider: Arc<ScriptedProvider>) -> (Arc<BalanceEngine>, Arc<MemorySink>) {
    engine_with(vec![endpoint("http://primary", 0, provider)], false, EngineConfig::default())
}

/// Configuration with every politeness delay removed, for tests on real time.
pub fn fast_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.rate_limit.min_global_gap_ms = 0;
    config.rate_limit.min_provider_gap_ms = 0;
    config.rate_limit.cooldown_ms = 0;
    config.scheduler.inter_item_delay_ms = 0;
    config.scheduler.inter_batch_delay_ms = 0;
    config.scheduler.bulk_pause_ms = 0;
    config.retries.network_base_ms = 1;
    config.retries.network_cap_ms = 1;
    config.retries.server_base_ms = 1;
    config.retries.server_cap_ms = 1;
    config.retries.unknown_delay_ms = 1;
    config
}
