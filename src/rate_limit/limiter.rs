//! Serial outbound-call limiter.
//!
//! # Data Flow
//! ```text
//! schedule(provider, work)
//!     → global FIFO queue
//!     → single worker: sleep max(global gap, provider gap)
//!     → run work, record timestamps
//!     → throttled? penalize provider, pause draining for cooldown
//!     → more queued? sleep global gap again
//! ```

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{sleep, Instant};

use crate::config::RateLimitConfig;
use crate::observability::metrics;
use crate::providers::ProviderError;
use crate::rate_limit::window::RateWindow;
use crate::resilience::classifier::{classify, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobOutcome {
    Completed,
    Throttled,
}

struct Job {
    provider: String,
    run: Box<dyn FnOnce() -> BoxFuture<'static, JobOutcome> + Send>,
}

struct LimiterState {
    queue: VecDeque<Job>,
    draining: bool,
    window: RateWindow,
}

struct LimiterInner {
    state: Mutex<LimiterState>,
    min_global_gap: Duration,
    min_provider_gap: Duration,
    cooldown: Duration,
}

/// Global single-concurrency limiter for provider calls.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<LimiterInner>,
}

impl RateLimiter {
    pub fn new(min_global_gap: Duration, min_provider_gap: Duration, cooldown: Duration) -> Self {
        Self {
            inner: Arc::new(LimiterInner {
                state: Mutex::new(LimiterState {
                    queue: VecDeque::new(),
                    draining: false,
                    window: RateWindow::new(),
                }),
                min_global_gap,
                min_provider_gap,
                cooldown,
            }),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.min_global_gap(), config.min_provider_gap(), config.cooldown())
    }

    /// Queue `work` against `provider` and wait for its result.
    ///
    /// A `RateLimited` failure stalls `provider` for the cooldown and pauses
    /// the whole queue for the same period.
    pub async fn schedule<T, F, Fut>(&self, provider: &str, work: F) -> Result<T, ProviderError>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ProviderError>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job = Job {
            provider: provider.to_string(),
            run: Box::new(move || {
                Box::pin(async move {
                    let result = work().await;
                    let throttled = matches!(
                        &result,
                        Err(e) if classify(e).kind == ErrorKind::RateLimited
                    );
                    let _ = tx.send(result);
                    if throttled {
                        JobOutcome::Throttled
                    } else {
                        JobOutcome::Completed
                    }
                })
            }),
        };

        self.enqueue(job);

        rx.await
            .unwrap_or_else(|_| Err(ProviderError::Rpc("rate limiter dropped the request".to_string())))
    }

    /// Number of jobs waiting for the worker.
    pub fn pending(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Last recorded call time for `provider` (may be in the future after throttling).
    pub fn last_call(&self, provider: &str) -> Option<Instant> {
        self.inner.state.lock().window.last_call(provider)
    }

    fn enqueue(&self, job: Job) {
        let start_worker = {
            let mut state = self.inner.state.lock();
            state.queue.push_back(job);
            !std::mem::replace(&mut state.draining, true)
        };

        if start_worker {
            let inner = self.inner.clone();
            tokio::spawn(async move {
                drain(inner).await;
            });
        }
    }
}

async fn drain(inner: Arc<LimiterInner>) {
    tracing::debug!("Rate limiter worker started");
    loop {
        let (job, wait) = {
            let mut state = inner.state.lock();
            let Some(job) = state.queue.pop_front() else {
                state.draining = false;
                tracing::debug!("Rate limiter queue drained, worker exiting");
                return;
            };
            let wait = state.window.wait_for(
                &job.provider,
                Instant::now(),
                inner.min_global_gap,
                inner.min_provider_gap,
            );
            (job, wait)
        };

        if !wait.is_zero() {
            tracing::debug!(provider = %job.provider, wait_ms = wait.as_millis() as u64, "Spacing outbound call");
            sleep(wait).await;
        }

        let provider = job.provider;
        let outcome = (job.run)().await;

        let more_work = {
            let mut state = inner.state.lock();
            let now = Instant::now();
            match outcome {
                JobOutcome::Completed => state.window.record(&provider, now),
                JobOutcome::Throttled => state.window.penalize(&provider, now, now + inner.cooldown),
            }
            !state.queue.is_empty()
        };

        match outcome {
            JobOutcome::Throttled => {
                tracing::warn!(
                    provider = %provider,
                    cooldown_ms = inner.cooldown.as_millis() as u64,
                    "Provider throttled us, pausing queue"
                );
                metrics::record_rate_limited(&provider);
                sleep(inner.cooldown).await;
            }
            JobOutcome::Completed if more_work => sleep(inner.min_global_gap).await,
            JobOutcome::Completed => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn limiter() -> RateLimiter {
        RateLimiter::new(Duration::from_secs(5), Duration::from_secs(15), Duration::from_secs(120))
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_call_runs_immediately() {
        let limiter = limiter();
        let start = Instant::now();
        let value = limiter.schedule("p", || async { Ok::<_, ProviderError>(42) }).await.unwrap();
        assert_eq!(value, 42);
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(limiter.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifo_order_across_providers() {
        let limiter = limiter();
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for (i, provider) in ["a", "b", "a", "c"].into_iter().enumerate() {
            let limiter = limiter.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                limiter
                    .schedule(provider, move || async move {
                        order.lock().push(i);
                        Ok::<_, ProviderError>(())
                    })
                    .await
            }));
            tokio::task::yield_now().await;
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_are_returned_to_caller() {
        let limiter = limiter();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let err = limiter
            .schedule("p", move || async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ProviderError::Connect("refused".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Connect(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
