//! Execution of a single query against the provider registry.
//!
//! # Policy
//! - Transient failures are retried in place on the same endpoint
//! - A fatal failure, or exhausted retries, invalidates the endpoint and
//!   moves on to the next untried one
//! - The final failure carries the last classification seen

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use crate::observability::metrics;
use crate::providers::{Balance, NetworkProfile, ProviderEndpoint, ProviderError, RegistryError};
use crate::resilience::timeouts::with_timeout;
use crate::resilience::{classify, Classification, ErrorKind};
use crate::scheduler::SchedulerInner;
use crate::types::{Query, QueryResult};

/// How a provider call is gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dispatch {
    /// Through the global rate limiter.
    Serial,
    /// Directly, under the bulk semaphore.
    Bulk,
}

impl SchedulerInner {
    pub(crate) async fn execute(&self, query: &Query, dispatch: Dispatch) -> QueryResult {
        let started = Instant::now();
        let network = &query.network;

        let Some(profile) = self.registry.profile(network).cloned() else {
            tracing::warn!(query = %query, "Query for unconfigured network");
            return self.fail(query, "", Classification::new(ErrorKind::Unknown), started);
        };

        let mut tried: Vec<String> = Vec::new();
        let mut last: Option<Classification> = None;

        loop {
            let endpoint = match self.registry.acquire_excluding(network, &tried).await {
                Ok(endpoint) => endpoint,
                Err(RegistryError::Exhausted { last_error, .. }) => {
                    let classification = last.unwrap_or_else(|| classify(&last_error));
                    return self.fail(query, &profile.symbol, classification, started);
                }
                Err(RegistryError::UnknownNetwork(_)) => {
                    return self.fail(query, &profile.symbol, Classification::new(ErrorKind::Unknown), started);
                }
            };
            tried.push(endpoint.url.clone());

            match self.attempt(&endpoint, query, dispatch).await {
                Ok(balance) => {
                    let result = self.succeed(query, &profile, balance);
                    metrics::record_query(network.as_str(), "success", started);
                    return result;
                }
                Err(classification) => {
                    tracing::warn!(
                        network = %network,
                        url = %endpoint.url,
                        kind = %classification.kind,
                        "Endpoint failed, trying next"
                    );
                    self.registry.invalidate(network);
                    last = Some(classification);
                }
            }
        }
    }

    /// Retry loop on one endpoint.
    async fn attempt(
        &self,
        endpoint: &Arc<ProviderEndpoint>,
        query: &Query,
        dispatch: Dispatch,
    ) -> Result<Balance, Classification> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let outcome = self.call(endpoint, &query.address, dispatch).await;
            metrics::record_provider_call(&endpoint.name, outcome.is_ok());

            let error = match outcome {
                Ok(balance) => return Ok(balance),
                Err(e) => e,
            };

            let classification = classify(&error);
            if !self.retry.should_retry(&classification, attempts) {
                tracing::debug!(
                    query = %query,
                    provider = %endpoint.name,
                    attempt = attempts,
                    kind = %classification.kind,
                    error = %error,
                    "Giving up on endpoint"
                );
                return Err(classification);
            }

            let delay = self.retry.retry_delay(&classification, attempts);
            tracing::info!(
                query = %query,
                provider = %endpoint.name,
                attempt = attempts,
                delay = ?delay,
                kind = %classification.kind,
                "Retrying query"
            );
            sleep(delay).await;
        }
    }

    async fn call(
        &self,
        endpoint: &Arc<ProviderEndpoint>,
        address: &str,
        dispatch: Dispatch,
    ) -> Result<Balance, ProviderError> {
        let deadline = Duration::from_secs(self.config.request_timeout_secs);
        match dispatch {
            Dispatch::Serial => {
                let client = endpoint.client.clone();
                let address = address.to_string();
                self.limiter
                    .schedule(&endpoint.name, move || async move {
                        with_timeout(deadline, client.fetch_balance(&address)).await
                    })
                    .await
            }
            Dispatch::Bulk => {
                let _permit = self
                    .bulk_permits
                    .acquire()
                    .await
                    .map_err(|_| ProviderError::Rpc("bulk dispatch closed".to_string()))?;
                with_timeout(deadline, endpoint.client.fetch_balance(address)).await
            }
        }
    }

    fn succeed(&self, query: &Query, profile: &NetworkProfile, balance: Balance) -> QueryResult {
        let usd_value = self
            .prices
            .usd_price(&query.network)
            .map(|price| price * balance.display);
        QueryResult {
            network: query.network.clone(),
            address: query.address.clone(),
            raw_balance: balance.raw,
            display_balance: balance.display,
            unit_symbol: profile.symbol.clone(),
            usd_value,
            observed_at: Utc::now(),
            error_kind: None,
            error_message: None,
            tokens: balance.tokens,
        }
    }

    /// Build the final failure and report it once.
    fn fail(
        &self,
        query: &Query,
        symbol: &str,
        classification: Classification,
        started: Instant,
    ) -> QueryResult {
        let message = classification.user_message();
        tracing::warn!(query = %query, kind = %classification.kind, "Query failed");
        self.sink.notify(query, classification.kind, &message);
        metrics::record_query(query.network.as_str(), &classification.kind.to_string(), started);
        QueryResult::failed(query, symbol, classification.kind, message)
    }
}
