//! Periodic balance monitoring.
//!
//! # Responsibilities
//! - One cancellable timer task per watched entity
//! - History ring buffer per entity, fed by successful checks
//! - Percent-change alerting with synchronous subscriber notification
//!
//! # State Machine
//! ```text
//! Idle → Checking → Idle   (result recorded)
//!                 → gone   (removed mid-flight, result discarded)
//! ```

pub mod alerts;
pub mod entity;
pub mod history;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use uuid::Uuid;

use crate::config::MonitorConfig;
use crate::observability::metrics;
use crate::scheduler::BalanceQuery;
use crate::types::{Network, QueryResult};

pub use alerts::{Alert, AlertDirection, AlertLog, AlertSubscriber};
pub use entity::{WatchOptions, WatchState, WatchedEntity};
pub use history::{HistoryBuffer, HistoryEntry};

/// Longest accepted check interval: one week.
pub const MAX_CHECK_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

/// Errors returned by monitor operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MonitorError {
    #[error("no watched entity with id {0}")]
    UnknownEntity(Uuid),

    #[error("no alert with id {0}")]
    UnknownAlert(Uuid),

    #[error("network {0} is not configured")]
    UnknownNetwork(Network),

    #[error("invalid watch options: {0}")]
    InvalidOptions(String),
}

pub type MonitorResult<T> = Result<T, MonitorError>;

struct MonitorInner {
    source: Arc<dyn BalanceQuery>,
    config: MonitorConfig,
    entities: DashMap<Uuid, WatchedEntity>,
    history: DashMap<Uuid, HistoryBuffer>,
    timers: Mutex<HashMap<Uuid, JoinHandle<()>>>,
    alerts: Mutex<AlertLog>,
    subscribers: RwLock<Vec<Arc<dyn AlertSubscriber>>>,
}

/// Watch-list owner.
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<MonitorInner>,
}

impl Monitor {
    pub fn new(source: Arc<dyn BalanceQuery>, config: MonitorConfig) -> Self {
        let alert_capacity = config.alert_capacity;
        Self {
            inner: Arc::new(MonitorInner {
                source,
                config,
                entities: DashMap::new(),
                history: DashMap::new(),
                timers: Mutex::new(HashMap::new()),
                alerts: Mutex::new(AlertLog::new(alert_capacity)),
                subscribers: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Start watching `address`. The first check runs immediately.
    pub fn watch(
        &self,
        network: impl Into<Network>,
        address: impl Into<String>,
        options: WatchOptions,
    ) -> MonitorResult<WatchedEntity> {
        let network = network.into();
        let address = address.into();
        if !self.inner.source.knows_network(&network) {
            return Err(MonitorError::UnknownNetwork(network));
        }

        let interval_minutes = options
            .check_interval_minutes
            .unwrap_or(self.inner.config.default_interval_minutes);
        let threshold = options
            .alert_threshold_percent
            .unwrap_or(self.inner.config.default_threshold_percent);
        if interval_minutes == 0 {
            return Err(MonitorError::InvalidOptions(
                "check interval must be at least one minute".to_string(),
            ));
        }
        if interval_minutes > MAX_CHECK_INTERVAL_MINUTES {
            return Err(MonitorError::InvalidOptions(format!(
                "check interval must be at most {} minutes",
                MAX_CHECK_INTERVAL_MINUTES
            )));
        }
        if threshold.is_nan() || threshold <= 0.0 {
            return Err(MonitorError::InvalidOptions(
                "alert threshold must be positive".to_string(),
            ));
        }

        let entity = WatchedEntity {
            id: Uuid::new_v4(),
            network,
            address,
            display_name: options.display_name,
            check_interval_minutes: interval_minutes,
            alert_threshold_percent: threshold,
            last_result: None,
            state: WatchState::Idle,
            last_checked_at: None,
            created_at: Utc::now(),
        };
        let id = entity.id;

        self.inner.entities.insert(id, entity.clone());
        self.inner
            .history
            .insert(id, HistoryBuffer::new(self.inner.config.history_capacity));

        let handle = spawn_timer(
            Arc::downgrade(&self.inner),
            id,
            Duration::from_secs(interval_minutes * 60),
        );
        self.inner.timers.lock().insert(id, handle);

        tracing::info!(
            entity = %id,
            network = %entity.network,
            address = %entity.address,
            interval_minutes,
            threshold,
            "Watching address"
        );
        metrics::record_watched(self.inner.entities.len());
        Ok(entity)
    }

    /// Stop watching `id`, cancel its timer and discard its history. Alerts
    /// already raised are kept.
    pub fn unwatch(&self, id: Uuid) -> bool {
        if let Some(handle) = self.inner.timers.lock().remove(&id) {
            handle.abort();
        }
        let removed = self.inner.entities.remove(&id).is_some();
        self.inner.history.remove(&id);
        if removed {
            tracing::info!(entity = %id, "Stopped watching");
            metrics::record_watched(self.inner.entities.len());
        }
        removed
    }

    pub fn get(&self, id: Uuid) -> Option<WatchedEntity> {
        self.inner.entities.get(&id).map(|e| e.value().clone())
    }

    /// Entities in creation order.
    pub fn list_watched(&self) -> Vec<WatchedEntity> {
        let mut all: Vec<WatchedEntity> = self.inner.entities.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        all
    }

    /// History oldest first.
    pub fn get_history(&self, id: Uuid) -> MonitorResult<Vec<HistoryEntry>> {
        self.inner
            .history
            .get(&id)
            .map(|h| h.to_vec())
            .ok_or(MonitorError::UnknownEntity(id))
    }

    pub fn export_history_csv(&self, id: Uuid) -> MonitorResult<String> {
        let entity = self.get(id).ok_or(MonitorError::UnknownEntity(id))?;
        let entries = self.get_history(id)?;
        Ok(history::export_csv(&entity, &entries))
    }

    /// Alerts newest first.
    pub fn get_alerts(&self, unread_only: bool) -> Vec<Alert> {
        self.inner.alerts.lock().list(unread_only)
    }

    pub fn acknowledge_alert(&self, id: Uuid) -> MonitorResult<()> {
        if self.inner.alerts.lock().acknowledge(id) {
            Ok(())
        } else {
            Err(MonitorError::UnknownAlert(id))
        }
    }

    pub fn clear_alerts(&self) -> usize {
        self.inner.alerts.lock().clear()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn AlertSubscriber>) {
        self.inner.subscribers.write().push(subscriber);
    }

    /// Run one check of `id` now, outside its timer.
    pub async fn check_now(&self, id: Uuid) -> MonitorResult<QueryResult> {
        self.inner.check(id).await.ok_or(MonitorError::UnknownEntity(id))
    }

    /// Cancel every timer. Entities and history stay readable.
    pub fn shutdown(&self) {
        let timers: Vec<(Uuid, JoinHandle<()>)> = self.inner.timers.lock().drain().collect();
        for (_, handle) in &timers {
            handle.abort();
        }
        tracing::info!(timers = timers.len(), "Monitor timers cancelled");
    }
}

fn spawn_timer(inner: Weak<MonitorInner>, id: Uuid, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(inner) = inner.upgrade() else {
                return;
            };
            if inner.check(id).await.is_none() {
                return;
            }
        }
    })
}

impl MonitorInner {
    /// One check. `None` if the entity no longer exists.
    async fn check(&self, id: Uuid) -> Option<QueryResult> {
        let query = {
            let mut entity = self.entities.get_mut(&id)?;
            entity.state = WatchState::Checking;
            entity.query()
        };

        tracing::debug!(entity = %id, query = %query, "Checking watched address");
        let result = self.source.query(query).await;
        self.record(id, &result)?;
        Some(result)
    }

    /// Record a check result. `None` if the entity was removed mid-flight.
    fn record(&self, id: Uuid, result: &QueryResult) -> Option<()> {
        let alert = {
            let Some(mut entity) = self.entities.get_mut(&id) else {
                tracing::debug!(entity = %id, "Entity removed during check, result discarded");
                return None;
            };
            entity.state = WatchState::Idle;
            entity.last_checked_at = Some(Utc::now());
            entity.last_result = Some(result.clone());

            if !result.is_success() {
                return Some(());
            }

            let mut history = self.history.get_mut(&id)?;
            let previous = history.latest().map(|h| h.result.display_balance);
            let (change_percent, change_amount) = history::change(previous, result.display_balance);
            history.push(HistoryEntry {
                entity_id: id,
                result: result.clone(),
                change_percent,
                change_amount,
            });

            if change_percent.abs() >= entity.alert_threshold_percent {
                Some(build_alert(&entity, previous.unwrap_or(0.0), result, change_percent))
            } else {
                None
            }
        };

        if let Some(alert) = alert {
            self.raise(alert);
        }
        Some(())
    }

    fn raise(&self, alert: Alert) {
        tracing::info!(
            entity = %alert.entity_id,
            direction = %alert.direction,
            change_percent = alert.change_percent,
            "{}", alert.message
        );
        metrics::record_alert(&alert.direction.to_string());
        self.alerts.lock().push(alert.clone());

        let subscribers = self.subscribers.read().clone();
        for subscriber in &subscribers {
            subscriber.on_alert(&alert);
        }
    }
}

fn build_alert(entity: &WatchedEntity, previous: f64, result: &QueryResult, change_percent: f64) -> Alert {
    let direction = if change_percent >= 0.0 {
        AlertDirection::Increase
    } else {
        AlertDirection::Decrease
    };
    let verb = match direction {
        AlertDirection::Increase => "increased",
        AlertDirection::Decrease => "decreased",
    };
    Alert {
        id: Uuid::new_v4(),
        entity_id: entity.id,
        direction,
        change_percent,
        message: format!(
            "{} balance {} by {:.2}% (from {} to {} {})",
            entity.label(),
            verb,
            change_percent.abs(),
            previous,
            result.display_balance,
            result.unit_symbol
        ),
        created_at: Utc::now(),
        acknowledged: false,
    }
}
