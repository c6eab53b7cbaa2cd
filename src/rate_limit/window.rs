//! Call-spacing bookkeeping.

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Last-call timestamps, globally and per provider name.
///
/// A provider timestamp may lie in the future after throttling; the next gap
/// calculation then stalls that provider until it has passed.
#[derive(Debug, Default)]
pub struct RateWindow {
    global_last: Option<Instant>,
    provider_last: HashMap<String, Instant>,
}

impl RateWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// `max(0, global_gap - since_global, provider_gap - since_provider)`.
    pub fn wait_for(
        &self,
        provider: &str,
        now: Instant,
        global_gap: Duration,
        provider_gap: Duration,
    ) -> Duration {
        let wait_global = self
            .global_last
            .map(|last| (last + global_gap).saturating_duration_since(now))
            .unwrap_or(Duration::ZERO);
        let wait_provider = self
            .provider_last
            .get(provider)
            .map(|last| (*last + provider_gap).saturating_duration_since(now))
            .unwrap_or(Duration::ZERO);
        wait_global.max(wait_provider)
    }

    /// Record a completed call at `at`.
    pub fn record(&mut self, provider: &str, at: Instant) {
        self.global_last = Some(at);
        self.provider_last.insert(provider.to_string(), at);
    }

    /// Record a throttled call at `at` and push the provider's last-call
    /// time out to `until`.
    pub fn penalize(&mut self, provider: &str, at: Instant, until: Instant) {
        self.global_last = Some(at);
        self.provider_last.insert(provider.to_string(), until);
    }

    pub fn last_call(&self, provider: &str) -> Option<Instant> {
        self.provider_last.get(provider).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GLOBAL: Duration = Duration::from_secs(5);
    const PROVIDER: Duration = Duration::from_secs(15);

    #[tokio::test(start_paused = true)]
    async fn test_first_call_is_free() {
        let window = RateWindow::new();
        assert_eq!(window.wait_for("a", Instant::now(), GLOBAL, PROVIDER), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_gap_dominates() {
        let mut window = RateWindow::new();
        let t0 = Instant::now();
        window.record("a", t0);

        let t1 = t0 + Duration::from_secs(2);
        assert_eq!(window.wait_for("a", t1, GLOBAL, PROVIDER), Duration::from_secs(13));
        // Other providers only see the global gap
        assert_eq!(window.wait_for("b", t1, GLOBAL, PROVIDER), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_penalty_stalls_provider() {
        let mut window = RateWindow::new();
        let t0 = Instant::now();
        window.penalize("a", t0, t0 + Duration::from_secs(120));
        assert_eq!(window.wait_for("a", t0, GLOBAL, PROVIDER), Duration::from_secs(135));
        assert_eq!(window.wait_for("b", t0, GLOBAL, PROVIDER), GLOBAL);
        assert_eq!(window.last_call("a"), Some(t0 + Duration::from_secs(120)));
    }
}
