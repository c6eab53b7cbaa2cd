//! Balance history ring buffer and CSV export.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Write;
use uuid::Uuid;

use crate::monitor::entity::WatchedEntity;
use crate::types::QueryResult;

/// Column row of the CSV export.
pub const CSV_COLUMNS: &str = "timestamp,balance,usdValue,changePercent,changeAmount";

/// One successful check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub entity_id: Uuid,
    pub result: QueryResult,
    /// Relative to the previous entry; 0 for the first entry or a zero previous.
    pub change_percent: f64,
    pub change_amount: f64,
}

/// `(percent, amount)` change from `previous` to `current`.
pub fn change(previous: Option<f64>, current: f64) -> (f64, f64) {
    match previous {
        Some(prev) if prev != 0.0 => ((current - prev) / prev * 100.0, current - prev),
        Some(prev) => (0.0, current - prev),
        None => (0.0, 0.0),
    }
}

/// Fixed-capacity history; the oldest entry is evicted on overflow.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// Entries oldest first.
    pub fn to_vec(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Render `entries` as CSV with a `# ` header block naming the entity.
pub fn export_csv(entity: &WatchedEntity, entries: &[HistoryEntry]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Balance history: {}", single_line(&entity.label()));
    let _ = writeln!(out, "# Network: {}", single_line(entity.network.as_str()));
    let _ = writeln!(out, "# Address: {}", single_line(&entity.address));
    let _ = writeln!(
        out,
        "# Exported: {}",
        Utc::now().to_rfc3339_opts(SecondsFormat::AutoSi, true)
    );
    out.push_str(CSV_COLUMNS);
    out.push('\n');

    for entry in entries {
        let usd = entry
            .result
            .usd_value
            .map(|v| v.to_string())
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{},{},{},{},{}",
            entry.result.observed_at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            entry.result.display_balance,
            usd,
            entry.change_percent,
            entry.change_amount
        );
    }
    out
}

/// Header values must not break out of their `# ` line.
fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}
