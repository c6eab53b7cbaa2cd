//! Alerts and their subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertDirection {
    Increase,
    Decrease,
}

impl fmt::Display for AlertDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertDirection::Increase => f.write_str("increase"),
            AlertDirection::Decrease => f.write_str("decrease"),
        }
    }
}

/// A threshold crossing on one watched entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub entity_id: Uuid,
    pub direction: AlertDirection,
    pub change_percent: f64,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub acknowledged: bool,
}

/// Notified synchronously, in registration order, for every new alert.
pub trait AlertSubscriber: Send + Sync {
    fn on_alert(&self, alert: &Alert);
}

impl<F> AlertSubscriber for F
where
    F: Fn(&Alert) + Send + Sync,
{
    fn on_alert(&self, alert: &Alert) {
        self(alert)
    }
}

/// Alerts shared across entities, bounded; the oldest is evicted first.
#[derive(Debug)]
pub struct AlertLog {
    alerts: VecDeque<Alert>,
    capacity: usize,
}

impl AlertLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            alerts: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, alert: Alert) {
        if self.alerts.len() == self.capacity {
            self.alerts.pop_front();
        }
        self.alerts.push_back(alert);
    }

    /// Newest first.
    pub fn list(&self, unread_only: bool) -> Vec<Alert> {
        self.alerts
            .iter()
            .rev()
            .filter(|a| !unread_only || !a.acknowledged)
            .cloned()
            .collect()
    }

    /// Mark `id` acknowledged. Returns false if no such alert is kept.
    pub fn acknowledge(&mut self, id: Uuid) -> bool {
        match self.alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                alert.acknowledged = true;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) -> usize {
        let n = self.alerts.len();
        self.alerts.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(pct: f64) -> Alert {
        Alert {
            id: Uuid::new_v4(),
            entity_id: Uuid::new_v4(),
            direction: if pct >= 0.0 { AlertDirection::Increase } else { AlertDirection::Decrease },
            change_percent: pct,
            message: String::new(),
            created_at: Utc::now(),
            acknowledged: false,
        }
    }

    #[test]
    fn test_capacity_and_order() {
        let mut log = AlertLog::new(2);
        log.push(alert(1.0));
        log.push(alert(2.0));
        log.push(alert(3.0));
        let pcts: Vec<f64> = log.list(false).iter().map(|a| a.change_percent).collect();
        assert_eq!(pcts, vec![3.0, 2.0]);
    }

    #[test]
    fn test_acknowledge_filters_unread() {
        let mut log = AlertLog::new(10);
        let a = alert(6.0);
        let id = a.id;
        log.push(a);
        log.push(alert(-7.0));

        assert!(log.acknowledge(id));
        assert!(!log.acknowledge(Uuid::new_v4()));
        assert_eq!(log.list(true).len(), 1);
        assert_eq!(log.list(false).len(), 2);
        assert_eq!(log.clear(), 2);
        assert!(log.is_empty());
    }
}
