//! Watched entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Network, Query, QueryResult};

/// Check state of a watched entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WatchState {
    #[default]
    Idle,
    Checking,
}

/// Options supplied when starting to watch an address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatchOptions {
    pub display_name: Option<String>,
    /// Falls back to the monitor's default interval.
    pub check_interval_minutes: Option<u64>,
    /// Falls back to the monitor's default threshold.
    pub alert_threshold_percent: Option<f64>,
}

/// A `(network, address)` pair under periodic monitoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchedEntity {
    pub id: Uuid,
    pub network: Network,
    pub address: String,
    pub display_name: Option<String>,
    pub check_interval_minutes: u64,
    pub alert_threshold_percent: f64,
    pub last_result: Option<QueryResult>,
    pub state: WatchState,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl WatchedEntity {
    pub fn query(&self) -> Query {
        Query::new(self.network.clone(), self.address.clone())
    }

    /// Display name, or `network:address` when none was given.
    pub fn label(&self) -> String {
        self.display_name
            .clone()
            .unwrap_or_else(|| format!("{}:{}", self.network, self.address))
    }
}
