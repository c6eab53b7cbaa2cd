//! Per-network FIFO queues and their drain loops.
//!
//! Items are popped one at a time so that `clear` can still reject the rest
//! of a batch. Batch boundaries are counted, not materialized.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::observability::metrics;
use crate::scheduler::dispatch::Dispatch;
use crate::scheduler::SchedulerInner;
use crate::types::{Network, Query};

#[derive(Debug, Default)]
pub(crate) struct NetworkQueue {
    pub(crate) items: VecDeque<Query>,
    draining: bool,
}

/// Append `query` to its network's queue and start a drain loop if none runs.
pub(crate) fn enqueue(inner: &Arc<SchedulerInner>, query: Query) {
    let network = query.network.clone();
    let start_drain = {
        let mut queues = inner.queues.lock();
        let queue = queues.entry(network.clone()).or_default();
        queue.items.push_back(query);
        metrics::record_queue_depth(network.as_str(), queue.items.len());
        !std::mem::replace(&mut queue.draining, true)
    };

    if start_drain {
        tracing::debug!(network = %network, "Starting drain loop");
        let inner = inner.clone();
        tokio::spawn(async move {
            drain(inner, network).await;
        });
    }
}

async fn drain(inner: Arc<SchedulerInner>, network: Network) {
    let batch_size = inner.config.batch_size.max(1);
    let inter_item = Duration::from_millis(inner.config.inter_item_delay_ms);
    let inter_batch = Duration::from_millis(inner.config.inter_batch_delay_ms);
    let mut executed = 0usize;

    loop {
        let Some(query) = pop(&inner, &network) else {
            tracing::debug!(network = %network, executed, "Drain loop finished");
            return;
        };

        let result = inner.execute(&query, Dispatch::Serial).await;
        inner.complete(&query, result);
        executed += 1;

        if !has_more(&inner, &network) {
            return;
        }

        if executed % batch_size == 0 {
            sleep(inter_batch).await;
        } else {
            sleep(inter_item).await;
        }
    }
}

fn pop(inner: &SchedulerInner, network: &Network) -> Option<Query> {
    let mut queues = inner.queues.lock();
    let queue = queues.get_mut(network)?;
    let next = queue.items.pop_front();
    match next {
        Some(_) => metrics::record_queue_depth(network.as_str(), queue.items.len()),
        None => queue.draining = false,
    }
    next
}

/// Report whether work remains, releasing the drain slot when it does not.
fn has_more(inner: &SchedulerInner, network: &Network) -> bool {
    let mut queues = inner.queues.lock();
    let Some(queue) = queues.get_mut(network) else {
        return false;
    };
    if queue.items.is_empty() {
        queue.draining = false;
        false
    } else {
        true
    }
}

/// Remove every queued item and resolve it as cancelled.
pub(crate) fn clear(inner: &SchedulerInner) -> usize {
    let cancelled: Vec<Query> = {
        let mut queues = inner.queues.lock();
        queues
            .iter_mut()
            .flat_map(|(network, queue)| {
                metrics::record_queue_depth(network.as_str(), 0);
                queue.items.drain(..).collect::<Vec<_>>()
            })
            .collect()
    };

    for query in &cancelled {
        let result = inner.cancelled(query);
        inner.complete(query, result);
    }

    tracing::info!(cancelled = cancelled.len(), "Cleared queued queries");
    cancelled.len()
}
