//! Query orchestration.
//!
//! # Data Flow
//! ```text
//! query(network, address)
//!     → cache hit? return
//!     → already pending? attach to the pending result
//!     → queue.rs: per-network FIFO, batched drain loop
//!     → dispatch.rs: registry endpoint → limiter → provider call
//!         → failure: classify → retry in place / fail over / give up
//!     → write-through cache, resolve every waiter
//!
//! query_many(queries)
//!     → bulk.rs: bulk-capable networks fan out under a semaphore
//!     → other networks take the serial path above
//! ```

pub mod bulk;
pub mod dispatch;
pub mod queue;

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Semaphore};

use crate::cache::ResultCache;
use crate::config::SchedulerConfig;
use crate::notifications::NotificationSink;
use crate::providers::{PriceSource, ProviderRegistry};
use crate::rate_limit::RateLimiter;
use crate::resilience::{ErrorKind, RetryPolicy};
use crate::types::{Network, Query, QueryResult};

use queue::NetworkQueue;

/// Anything that can answer a balance query. The monitor depends on this
/// rather than on the scheduler directly.
#[async_trait]
pub trait BalanceQuery: Send + Sync {
    async fn query(&self, query: Query) -> QueryResult;

    /// Whether `network` has any configured endpoints.
    fn knows_network(&self, network: &Network) -> bool;
}

/// Collaborators the scheduler is built from.
pub struct SchedulerParts {
    pub registry: Arc<ProviderRegistry>,
    pub limiter: RateLimiter,
    pub cache: ResultCache,
    pub retry: RetryPolicy,
    pub prices: Arc<dyn PriceSource>,
    pub sink: Arc<dyn NotificationSink>,
    pub config: SchedulerConfig,
}

pub(crate) struct SchedulerInner {
    pub(crate) registry: Arc<ProviderRegistry>,
    pub(crate) limiter: RateLimiter,
    pub(crate) cache: ResultCache,
    pub(crate) retry: RetryPolicy,
    pub(crate) prices: Arc<dyn PriceSource>,
    pub(crate) sink: Arc<dyn NotificationSink>,
    pub(crate) config: SchedulerConfig,
    pub(crate) bulk_permits: Semaphore,
    /// Waiters per in-flight key. Presence of a key means an attempt is
    /// queued or executing.
    pending: Mutex<HashMap<Query, Vec<oneshot::Sender<QueryResult>>>>,
    pub(crate) queues: Mutex<HashMap<Network, NetworkQueue>>,
}

/// Result of trying to take ownership of a query.
pub(crate) enum Claim {
    Hit(QueryResult),
    /// Another caller owns the attempt.
    Attached(oneshot::Receiver<QueryResult>),
    /// This caller must run the attempt.
    Owner(oneshot::Receiver<QueryResult>),
}

/// De-duplicating, cached, rate-limited query executor.
#[derive(Clone)]
pub struct BatchScheduler {
    pub(crate) inner: Arc<SchedulerInner>,
}

impl BatchScheduler {
    pub fn new(parts: SchedulerParts) -> Self {
        let permits = parts.config.bulk_concurrency.max(1);
        Self {
            inner: Arc::new(SchedulerInner {
                registry: parts.registry,
                limiter: parts.limiter,
                cache: parts.cache,
                retry: parts.retry,
                prices: parts.prices,
                sink: parts.sink,
                config: parts.config,
                bulk_permits: Semaphore::new(permits),
                pending: Mutex::new(HashMap::new()),
                queues: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Resolve one query through the serial path.
    pub async fn query(&self, query: Query) -> QueryResult {
        let rx = match self.inner.claim(&query) {
            Claim::Hit(result) => return result,
            Claim::Attached(rx) => {
                tracing::debug!(query = %query, "Attached to pending query");
                rx
            }
            Claim::Owner(rx) => {
                queue::enqueue(&self.inner, query.clone());
                rx
            }
        };
        self.inner.await_result(&query, rx).await
    }

    /// Reject every queued, not yet started item with a `Cancelled` result.
    /// Returns how many items were cancelled.
    pub fn clear_queue(&self) -> usize {
        queue::clear(&self.inner)
    }

    /// Items waiting in per-network queues.
    pub fn queue_depth(&self) -> usize {
        self.inner.queues.lock().values().map(|q| q.items.len()).sum()
    }

    /// Keys with an attempt queued or executing.
    pub fn in_flight(&self) -> usize {
        self.inner.pending.lock().len()
    }

    pub fn cache(&self) -> &ResultCache {
        &self.inner.cache
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.inner.registry
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.inner.limiter
    }
}

#[async_trait]
impl BalanceQuery for BatchScheduler {
    async fn query(&self, query: Query) -> QueryResult {
        BatchScheduler::query(self, query).await
    }

    fn knows_network(&self, network: &Network) -> bool {
        self.inner.registry.profile(network).is_some()
    }
}

impl SchedulerInner {
    /// Check the cache and the pending table under one lock, so a key that
    /// completes concurrently is seen either as cached or as pending.
    pub(crate) fn claim(&self, query: &Query) -> Claim {
        let mut pending = self.pending.lock();
        if let Some(hit) = self.cache.get(query) {
            return Claim::Hit(hit);
        }
        let (tx, rx) = oneshot::channel();
        match pending.entry(query.clone()) {
            Entry::Occupied(mut waiters) => {
                waiters.get_mut().push(tx);
                Claim::Attached(rx)
            }
            Entry::Vacant(slot) => {
                slot.insert(vec![tx]);
                Claim::Owner(rx)
            }
        }
    }

    /// Write the outcome through to the cache and resolve every waiter.
    pub(crate) fn complete(&self, query: &Query, result: QueryResult) {
        if result.error_kind != Some(ErrorKind::Cancelled) {
            self.cache.put(result.clone());
        }
        let waiters = self.pending.lock().remove(query).unwrap_or_default();
        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
    }

    pub(crate) async fn await_result(
        &self,
        query: &Query,
        rx: oneshot::Receiver<QueryResult>,
    ) -> QueryResult {
        match rx.await {
            Ok(result) => result,
            Err(_) => self.cancelled(query),
        }
    }

    pub(crate) fn unit_symbol(&self, network: &Network) -> String {
        self.registry
            .profile(network)
            .map(|p| p.symbol.clone())
            .unwrap_or_default()
    }

    pub(crate) fn cancelled(&self, query: &Query) -> QueryResult {
        QueryResult::failed(
            query,
            &self.unit_symbol(&query.network),
            ErrorKind::Cancelled,
            ErrorKind::Cancelled.user_message(None),
        )
    }
}
