//! User-facing failure notifications.
//!
//! The scheduler reports each final query failure once; repeats inside the
//! failure TTL are served from cache and never reach the sink.

use parking_lot::Mutex;

use crate::resilience::ErrorKind;
use crate::types::Query;

/// Receives one summary per final query failure.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, query: &Query, kind: ErrorKind, message: &str);
}

/// Default sink: writes the summary to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, query: &Query, kind: ErrorKind, message: &str) {
        tracing::warn!(
            network = %query.network,
            address = %query.address,
            kind = %kind,
            "{}", message
        );
    }
}

/// Sink that keeps every notification in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    received: Mutex<Vec<(Query, ErrorKind, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> Vec<(Query, ErrorKind, String)> {
        self.received.lock().clone()
    }
}

impl NotificationSink for MemorySink {
    fn notify(&self, query: &Query, kind: ErrorKind, message: &str) {
        self.received.lock().push((query.clone(), kind, message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_records() {
        let sink = MemorySink::new();
        let q = Query::new("ethereum", "0x1");
        sink.notify(&q, ErrorKind::NotFound, "Address not found");
        LogSink.notify(&q, ErrorKind::NotFound, "Address not found");

        let got = sink.received();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].0, q);
        assert_eq!(got[0].1, ErrorKind::NotFound);
    }
}
