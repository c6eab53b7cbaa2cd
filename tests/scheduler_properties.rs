//! Behavioral properties of the query path, run in virtual time.

mod common;

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use balance_engine::config::EngineConfig;
use balance_engine::providers::ProviderError;
use balance_engine::{ErrorKind, Query};
use common::*;

#[tokio::test(start_paused = true)]
async fn test_cache_coherence_within_and_after_ttl() {
    let provider = ScriptedProvider::ok(1.5).shared();
    let (engine, _) = single(provider.clone());

    let first = engine.query(NETWORK, "0xaaa").await;
    let second = engine.query(NETWORK, "0xaaa").await;
    assert!(first.is_success());
    assert_eq!(first, second);
    assert_eq!(provider.calls(), 1);
    assert_eq!(first.usd_value, Some(1.5 * ETH_USD));
    assert_eq!(first.unit_symbol, "ETH");

    tokio::time::advance(Duration::from_secs(301)).await;
    engine.query(NETWORK, "0xaaa").await;
    assert_eq!(provider.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failures_use_short_ttl_and_notify_once() {
    let provider = ScriptedProvider::failing(http_error(404)).shared();
    let (engine, sink) = single(provider.clone());

    let failed = engine.query(NETWORK, "0xbad").await;
    assert_eq!(failed.error_kind, Some(ErrorKind::NotFound));
    assert_eq!(failed.error_message.as_deref(), Some("Address not found"));

    // Served from cache inside the failure TTL
    engine.query(NETWORK, "0xbad").await;
    assert_eq!(provider.calls(), 1);
    assert_eq!(sink.received().len(), 1);

    tokio::time::advance(Duration::from_secs(31)).await;
    engine.query(NETWORK, "0xbad").await;
    assert_eq!(provider.calls(), 2);
    assert_eq!(sink.received().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_fatal_kinds_are_attempted_once() {
    for error in [http_error(404), ProviderError::Blocked("CORS preflight rejected".into())] {
        let provider = ScriptedProvider::failing(error).shared();
        let (engine, _) = single(provider.clone());

        let result = engine.query(NETWORK, "0x1").await;
        assert!(result.error_kind.is_some_and(ErrorKind::is_fatal));
        assert_eq!(provider.calls(), 1);
    }
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_queries_share_one_call() {
    let provider = ScriptedProvider::ok(3.0).with_latency(Duration::from_secs(2)).shared();
    let (engine, _) = single(provider.clone());

    let (a, b) = tokio::join!(engine.query(NETWORK, "0xdup"), engine.query(NETWORK, "0xdup"));
    assert_eq!(provider.calls(), 1);
    assert_eq!(a, b);
    assert_eq!(engine.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_transient_errors_retry_with_backoff() {
    let provider = ScriptedProvider::new(
        vec![
            Err(ProviderError::Connect("reset".into())),
            Err(ProviderError::Connect("reset".into())),
        ],
        Ok(balance(2.0)),
    )
    .shared();
    let (engine, _) = single(provider.clone());

    let start = Instant::now();
    let result = engine.query(NETWORK, "0x1").await;
    assert!(result.is_success());
    assert_eq!(provider.calls(), 3);
    // 1s then 2s of backoff, on top of the limiter's provider gap
    assert!(start.elapsed() >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_retries_are_capped() {
    let provider = ScriptedProvider::failing(http_error(503)).shared();
    let (engine, sink) = single(provider.clone());

    let result = engine.query(NETWORK, "0x1").await;
    assert_eq!(result.error_kind, Some(ErrorKind::ServerError));
    assert_eq!(provider.calls(), 3);
    assert_eq!(sink.received().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fatal_failure_fails_over_to_next_endpoint() {
    let primary = ScriptedProvider::failing(http_error(404)).shared();
    let secondary = ScriptedProvider::ok(4.0).shared();
    let (engine, _) = engine_with(
        vec![
            endpoint("http://secondary", 1, secondary.clone()),
            endpoint("http://primary", 0, primary.clone()),
        ],
        false,
        EngineConfig::default(),
    );

    let result = engine.query(NETWORK, "0x1").await;
    assert!(result.is_success());
    assert_eq!(result.display_balance, 4.0);
    assert_eq!(primary.calls(), 1);
    assert_eq!(secondary.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_transients_fail_over() {
    let primary = ScriptedProvider::failing(ProviderError::Connect("refused".into())).shared();
    let secondary = ScriptedProvider::ok(1.0).shared();
    let (engine, _) = engine_with(
        vec![
            endpoint("http://primary", 0, primary.clone()),
            endpoint("http://secondary", 1, secondary.clone()),
        ],
        false,
        EngineConfig::default(),
    );

    assert!(engine.query(NETWORK, "0x1").await.is_success());
    assert_eq!(primary.calls(), 3);
    assert_eq!(secondary.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_all_endpoints_failing_surfaces_last_kind() {
    let primary = ScriptedProvider::failing(http_error(404)).shared();
    let secondary = ScriptedProvider::failing(http_error(502)).shared();
    let (engine, sink) = engine_with(
        vec![
            endpoint("http://primary", 0, primary.clone()),
            endpoint("http://secondary", 1, secondary.clone()),
        ],
        false,
        EngineConfig::default(),
    );

    let result = engine.query(NETWORK, "0x1").await;
    assert_eq!(result.error_kind, Some(ErrorKind::ServerError));
    assert_eq!(primary.calls(), 1);
    assert_eq!(secondary.calls(), 3);
    assert_eq!(sink.received().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_calls_to_one_provider_are_spaced() {
    let provider = ScriptedProvider::ok(1.0).shared();
    let (engine, _) = single(provider.clone());

    let queries: Vec<_> = (0..4).map(|i| engine.query(NETWORK, format!("0x{}", i))).collect();
    futures_util::future::join_all(queries).await;

    let times = provider.call_times();
    assert_eq!(times.len(), 4);
    for pair in times.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_secs(15));
    }
}

#[tokio::test(start_paused = true)]
async fn test_queue_drains_in_order_with_item_and_batch_delays() {
    let provider = ScriptedProvider::ok(1.0).shared();
    let mut config = EngineConfig::default();
    config.rate_limit.min_global_gap_ms = 0;
    config.rate_limit.min_provider_gap_ms = 0;
    let (engine, _) = engine_with(vec![endpoint("http://primary", 0, provider.clone())], false, config);

    let addresses: Vec<String> = (0..7).map(|i| format!("0x{}", i)).collect();
    futures_util::future::join_all(addresses.iter().map(|a| engine.query(NETWORK, a.clone()))).await;

    assert_eq!(provider.addresses(), addresses);
    let times = provider.call_times();
    let offsets: Vec<Duration> = times.iter().map(|t| *t - times[0]).collect();
    let expected: Vec<Duration> = [0, 1_500, 3_000, 6_000, 7_500, 9_000, 12_000]
        .into_iter()
        .map(Duration::from_millis)
        .collect();
    assert_eq!(offsets, expected);
}

#[tokio::test(start_paused = true)]
async fn test_throttling_delays_next_call_by_cooldown() {
    let provider = ScriptedProvider::new(vec![Err(http_error(429))], Ok(balance(1.0))).shared();
    let (engine, _) = single(provider.clone());

    let result = engine.query(NETWORK, "0x1").await;
    assert!(result.is_success());

    let times = provider.call_times();
    assert_eq!(times.len(), 2);
    assert!(times[1] - times[0] >= Duration::from_secs(120));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_twice_gives_up() {
    let provider = ScriptedProvider::failing(http_error(429)).shared();
    let (engine, _) = single(provider.clone());

    let result = engine.query(NETWORK, "0x1").await;
    assert_eq!(result.error_kind, Some(ErrorKind::RateLimited));
    assert_eq!(result.error_message.as_deref(), Some("Rate limited — retry after 60s"));
    assert_eq!(provider.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_clear_queue_cancels_only_queued_items() {
    let provider = ScriptedProvider::ok(1.0).with_latency(Duration::from_secs(1)).shared();
    let (engine, _) = single(provider.clone());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.query(NETWORK, format!("0x{}", i)).await })
        })
        .collect();

    // Let the first item start executing
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(engine.queue_depth(), 3);
    assert_eq!(engine.clear_queue(), 3);

    let mut results = Vec::new();
    for h in handles {
        results.push(h.await.unwrap());
    }
    let cancelled = results.iter().filter(|r| r.error_kind == Some(ErrorKind::Cancelled)).count();
    let succeeded = results.iter().filter(|r| r.is_success()).count();
    assert_eq!(cancelled, 3);
    assert_eq!(succeeded, 1);
    assert_eq!(provider.calls(), 1);
    // Cancellation outcomes are never cached
    assert_eq!(engine.get_cache_stats().total, 1);
}

#[tokio::test(start_paused = true)]
async fn test_bulk_fan_out_is_bounded_and_ordered() {
    let provider = ScriptedProvider::ok(1.0).with_latency(Duration::from_secs(1)).shared();
    let (engine, _) = engine_with(
        vec![endpoint("http://primary", 0, provider.clone())],
        true,
        EngineConfig::default(),
    );

    let queries: Vec<Query> = (0..25).map(|i| Query::new(NETWORK, format!("0x{:02}", i))).collect();
    let results = engine.query_many(queries.clone()).await;

    assert_eq!(results.len(), 25);
    for (query, result) in queries.iter().zip(&results) {
        assert_eq!(&result.query(), query);
        assert!(result.is_success());
    }
    assert_eq!(provider.calls(), 25);
    assert!(provider.max_concurrency() <= 10);
    assert!(provider.max_concurrency() > 1);
}

#[tokio::test(start_paused = true)]
async fn test_query_many_mixes_networks_and_unknowns() {
    let provider = ScriptedProvider::ok(2.0).shared();
    let (engine, _) = single(provider.clone());

    let results = engine
        .query_many(vec![
            Query::new("dogecoin", "D1"),
            Query::new(NETWORK, "0x1"),
            Query::new(NETWORK, "0x1"),
        ])
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].error_kind, Some(ErrorKind::Unknown));
    assert!(results[1].is_success());
    assert_eq!(results[1], results[2]);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_bulk_caller_still_resolves_key() {
    let provider = ScriptedProvider::ok(1.0).with_latency(Duration::from_secs(5)).shared();
    let (engine, _) = engine_with(
        vec![endpoint("http://primary", 0, provider.clone())],
        true,
        EngineConfig::default(),
    );

    let caller = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.query_many(vec![Query::new(NETWORK, "0xabc")]).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    caller.abort();
    assert!(caller.await.unwrap_err().is_cancelled());

    let later = tokio::time::timeout(Duration::from_secs(60), engine.query(NETWORK, "0xabc"))
        .await
        .expect("key stayed pending after its caller was dropped");
    assert!(later.is_success());
    assert_eq!(provider.calls(), 1);
    assert_eq!(engine.in_flight(), 0);
}
