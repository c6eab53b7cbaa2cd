//! Multi-query entry point.
//!
//! Networks whose providers tolerate parallel reads bypass the serial
//! limiter and fan out in inner batches of `bulk_concurrency`, separated by
//! a short pause. All other networks go through the ordinary queue.

use futures_util::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::scheduler::dispatch::Dispatch;
use crate::scheduler::{BatchScheduler, Claim};
use crate::types::{Network, Query, QueryResult};

impl BatchScheduler {
    /// Resolve every query. Results are returned in input order.
    pub async fn query_many(&self, queries: Vec<Query>) -> Vec<QueryResult> {
        let mut groups: BTreeMap<Network, Vec<(usize, Query)>> = BTreeMap::new();
        for (index, query) in queries.into_iter().enumerate() {
            groups.entry(query.network.clone()).or_default().push((index, query));
        }
        let total = groups.values().map(Vec::len).sum();

        let per_network = groups.into_iter().map(|(network, items)| async move {
            if self.inner.registry.supports_bulk(&network) {
                self.run_bulk(&network, items).await
            } else {
                let results = join_all(items.iter().map(|(_, q)| self.query(q.clone()))).await;
                items.into_iter().map(|(i, _)| i).zip(results).collect()
            }
        });

        let mut slots: Vec<Option<QueryResult>> = vec![None; total];
        for group in join_all(per_network).await {
            for (index, result) in group {
                if let Some(slot) = slots.get_mut(index) {
                    *slot = Some(result);
                }
            }
        }
        slots.into_iter().flatten().collect()
    }

    async fn run_bulk(&self, network: &Network, items: Vec<(usize, Query)>) -> Vec<(usize, QueryResult)> {
        let chunk = self.inner.config.bulk_concurrency.max(1);
        let pause = Duration::from_millis(self.inner.config.bulk_pause_ms);
        let batches = items.len().div_ceil(chunk);
        tracing::debug!(network = %network, queries = items.len(), batches, "Bulk fan-out");

        let mut out = Vec::with_capacity(items.len());
        for (n, batch) in items.chunks(chunk).enumerate() {
            if n > 0 {
                sleep(pause).await;
            }
            let results = join_all(batch.iter().map(|(_, q)| self.query_bulk(q.clone()))).await;
            out.extend(batch.iter().map(|(i, _)| *i).zip(results));
        }
        out
    }

    /// Like `query`, but the owner's attempt runs on the bulk path. The
    /// attempt is detached from the caller so a dropped caller cannot leave
    /// the key pending.
    async fn query_bulk(&self, query: Query) -> QueryResult {
        let rx = match self.inner.claim(&query) {
            Claim::Hit(result) => return result,
            Claim::Attached(rx) => rx,
            Claim::Owner(rx) => {
                let inner = Arc::clone(&self.inner);
                let owned = query.clone();
                tokio::spawn(async move {
                    let result = inner.execute(&owned, Dispatch::Bulk).await;
                    inner.complete(&owned, result);
                });
                rx
            }
        };
        self.inner.await_result(&query, rx).await
    }
}
