//! The engine facade.
//!
//! # Responsibilities
//! - Own every piece of mutable state (cache, queues, rate windows, watch list)
//! - Expose the collaborator-facing operations
//! - Run the periodic cache sweep until shutdown
//!
//! # Design Decisions
//! - Explicitly constructed and injectable: no process-wide singletons
//! - Two engines never share state

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use uuid::Uuid;

use crate::cache::{CacheStats, ResultCache};
use crate::config::{EngineConfig, WatchConfig};
use crate::lifecycle::Shutdown;
use crate::monitor::{
    Alert, AlertSubscriber, HistoryEntry, Monitor, MonitorResult, WatchOptions, WatchedEntity,
};
use crate::notifications::{LogSink, NotificationSink};
use crate::portfolio::{self, PortfolioSummary, WalletRecord};
use crate::providers::{build_registry, PriceSource, ProviderRegistry, ProviderResult};
use crate::rate_limit::RateLimiter;
use crate::resilience::RetryPolicy;
use crate::scheduler::{BatchScheduler, SchedulerParts};
use crate::types::{Network, Query, QueryResult};

/// Everything an engine is assembled from.
pub struct EngineParts {
    pub registry: ProviderRegistry,
    pub prices: Arc<dyn PriceSource>,
    pub sink: Arc<dyn NotificationSink>,
    pub config: EngineConfig,
}

/// Outcome of reconciling the configured watch list.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WatchSync {
    pub added: usize,
    pub removed: usize,
    pub failed: usize,
}

pub struct BalanceEngine {
    scheduler: BatchScheduler,
    monitor: Monitor,
    cache: ResultCache,
    shutdown: Shutdown,
    sweeper: Mutex<Option<JoinHandle<()>>>,
    /// Watches created from configuration, keyed by query.
    configured: Mutex<HashMap<Query, (WatchConfig, Uuid)>>,
}

impl BalanceEngine {
    /// Build an engine from configuration with the default log sink.
    /// Must be called inside a tokio runtime.
    pub fn from_config(config: &EngineConfig) -> ProviderResult<Self> {
        let (registry, prices) = build_registry(config)?;
        Ok(Self::new(EngineParts {
            registry,
            prices: Arc::new(prices),
            sink: Arc::new(LogSink),
            config: config.clone(),
        }))
    }

    /// Assemble an engine. Must be called inside a tokio runtime.
    pub fn new(parts: EngineParts) -> Self {
        let config = parts.config;
        let cache = ResultCache::from_config(&config.cache);
        let scheduler = BatchScheduler::new(SchedulerParts {
            registry: Arc::new(parts.registry),
            limiter: RateLimiter::from_config(&config.rate_limit),
            cache: cache.clone(),
            retry: RetryPolicy::new(&config.retries),
            prices: parts.prices,
            sink: parts.sink,
            config: config.scheduler.clone(),
        });
        let monitor = Monitor::new(Arc::new(scheduler.clone()), config.monitor.clone());
        let shutdown = Shutdown::new();

        let sweeper = (config.cache.sweep_interval_secs > 0).then(|| {
            spawn_sweeper(
                cache.clone(),
                Duration::from_secs(config.cache.sweep_interval_secs),
                &shutdown,
            )
        });

        tracing::info!(
            networks = scheduler.registry().networks().len(),
            "Balance engine ready"
        );

        Self {
            scheduler,
            monitor,
            cache,
            shutdown,
            sweeper: Mutex::new(sweeper),
            configured: Mutex::new(HashMap::new()),
        }
    }

    pub async fn query(&self, network: impl Into<Network>, address: impl Into<String>) -> QueryResult {
        self.scheduler.query(Query::new(network, address)).await
    }

    pub async fn query_many(&self, queries: Vec<Query>) -> Vec<QueryResult> {
        self.scheduler.query_many(queries).await
    }

    pub fn watch(
        &self,
        network: impl Into<Network>,
        address: impl Into<String>,
        options: WatchOptions,
    ) -> MonitorResult<WatchedEntity> {
        self.monitor.watch(network, address, options)
    }

    pub fn unwatch(&self, id: Uuid) -> bool {
        self.configured.lock().retain(|_, (_, watched)| *watched != id);
        self.monitor.unwatch(id)
    }

    pub fn list_watched(&self) -> Vec<WatchedEntity> {
        self.monitor.list_watched()
    }

    pub fn get_history(&self, id: Uuid) -> MonitorResult<Vec<HistoryEntry>> {
        self.monitor.get_history(id)
    }

    pub fn export_history_csv(&self, id: Uuid) -> MonitorResult<String> {
        self.monitor.export_history_csv(id)
    }

    pub fn get_alerts(&self, unread_only: bool) -> Vec<Alert> {
        self.monitor.get_alerts(unread_only)
    }

    pub fn acknowledge_alert(&self, id: Uuid) -> MonitorResult<()> {
        self.monitor.acknowledge_alert(id)
    }

    pub fn clear_alerts(&self) -> usize {
        self.monitor.clear_alerts()
    }

    pub fn subscribe_alerts(&self, subscriber: Arc<dyn AlertSubscriber>) {
        self.monitor.subscribe(subscriber);
    }

    pub fn get_cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        tracing::info!("Result cache cleared");
    }

    pub fn clear_queue(&self) -> usize {
        self.scheduler.clear_queue()
    }

    pub fn queue_depth(&self) -> usize {
        self.scheduler.queue_depth()
    }

    pub fn in_flight(&self) -> usize {
        self.scheduler.in_flight()
    }

    pub fn networks(&self) -> Vec<Network> {
        self.scheduler.registry().networks()
    }

    /// Fetch current results for `wallets` and summarize them.
    pub async fn summarize_portfolio(&self, wallets: &[WalletRecord]) -> PortfolioSummary {
        let queries = wallets.iter().map(WalletRecord::query).collect();
        let results = self.scheduler.query_many(queries).await;
        portfolio::summarize(wallets, &results)
    }

    /// Bring configuration-declared watches in line with `desired`. Watches
    /// created through `watch` are left alone.
    pub fn sync_watch_list(&self, desired: &[WatchConfig]) -> WatchSync {
        let mut sync = WatchSync::default();
        let wanted: HashMap<Query, &WatchConfig> = desired
            .iter()
            .map(|w| (Query::new(w.network.as_str(), w.address.as_str()), w))
            .collect();

        let mut configured = self.configured.lock();

        let stale: Vec<Query> = configured
            .iter()
            .filter(|(query, (current, _))| wanted.get(*query).map_or(true, |w| *w != current))
            .map(|(query, _)| query.clone())
            .collect();
        for query in stale {
            if let Some((_, id)) = configured.remove(&query) {
                self.monitor.unwatch(id);
                sync.removed += 1;
            }
        }

        for (query, watch) in wanted {
            if configured.contains_key(&query) {
                continue;
            }
            let options = WatchOptions {
                display_name: watch.display_name.clone(),
                check_interval_minutes: watch.check_interval_minutes,
                alert_threshold_percent: watch.alert_threshold_percent,
            };
            match self.monitor.watch(query.network.clone(), query.address.clone(), options) {
                Ok(entity) => {
                    configured.insert(query, (watch.clone(), entity.id));
                    sync.added += 1;
                }
                Err(e) => {
                    tracing::warn!(query = %query, error = %e, "Could not watch configured address");
                    sync.failed += 1;
                }
            }
        }

        tracing::info!(
            added = sync.added,
            removed = sync.removed,
            failed = sync.failed,
            "Watch list synchronized"
        );
        sync
    }

    pub fn scheduler(&self) -> &BatchScheduler {
        &self.scheduler
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// Stop the sweep task and every monitor timer. Queued queries are
    /// cancelled; in-flight ones finish.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
        self.monitor.shutdown();
        let cancelled = self.scheduler.clear_queue();
        tracing::info!(cancelled, "Balance engine stopped");
    }
}

impl Drop for BalanceEngine {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
        self.monitor.shutdown();
    }
}

fn spawn_sweeper(cache: ResultCache, period: Duration, shutdown: &Shutdown) -> JoinHandle<()> {
    let mut stop = shutdown.subscribe();
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    cache.sweep();
                }
                _ = stop.recv() => {
                    tracing::debug!("Cache sweeper stopping");
                    return;
                }
            }
        }
    })
}
