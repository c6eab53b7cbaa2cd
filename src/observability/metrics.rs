//! Metrics collection and exposition.
//!
//! # Metrics
//! - `balance_queries_total` (counter): completed queries by network, outcome
//! - `balance_query_duration_seconds` (histogram): submit-to-result latency
//! - `balance_cache_lookups_total` (counter): cache hits and misses
//! - `balance_cache_entries` (gauge): physical cache size
//! - `balance_provider_calls_total` (counter): outbound calls by provider, result
//! - `balance_rate_limited_total` (counter): throttling responses by provider
//! - `balance_queue_depth` (gauge): queued items per network
//! - `balance_endpoint_probes_total` (counter): probes by network, result
//! - `balance_alerts_total` (counter): alerts by direction
//! - `balance_watched_entities` (gauge): current watch-list size

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tokio::time::Instant;

/// Install the Prometheus exporter with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_query(network: &str, outcome: &str, started: Instant) {
    ::metrics::counter!(
        "balance_queries_total",
        "network" => network.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    ::metrics::histogram!("balance_query_duration_seconds", "network" => network.to_string())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    ::metrics::counter!("balance_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_cache_size(entries: usize) {
    ::metrics::gauge!("balance_cache_entries").set(entries as f64);
}

pub fn record_provider_call(provider: &str, ok: bool) {
    let result = if ok { "ok" } else { "error" };
    ::metrics::counter!(
        "balance_provider_calls_total",
        "provider" => provider.to_string(),
        "result" => result
    )
    .increment(1);
}

pub fn record_rate_limited(provider: &str) {
    ::metrics::counter!("balance_rate_limited_total", "provider" => provider.to_string()).increment(1);
}

pub fn record_queue_depth(network: &str, depth: usize) {
    ::metrics::gauge!("balance_queue_depth", "network" => network.to_string()).set(depth as f64);
}

pub fn record_probe(network: &str, ok: bool) {
    let result = if ok { "ok" } else { "error" };
    ::metrics::counter!(
        "balance_endpoint_probes_total",
        "network" => network.to_string(),
        "result" => result
    )
    .increment(1);
}

pub fn record_alert(direction: &str) {
    ::metrics::counter!("balance_alerts_total", "direction" => direction.to_string()).increment(1);
}

pub fn record_watched(count: usize) {
    ::metrics::gauge!("balance_watched_entities").set(count as f64);
}
