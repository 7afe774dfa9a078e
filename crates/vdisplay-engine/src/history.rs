//! Recent message history.
//!
//! Every message that reaches an endpoint is recorded in the endpoint's
//! [`MessageLog`], a ring buffer that drops the oldest record when full.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// Records kept per endpoint unless configured otherwise.
pub const DEFAULT_HISTORY_LEN: usize = 100;

/// Outcome of a recorded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Applied to the display.
    Applied,
    /// Rejected.
    Failed,
}

/// One message as seen by an endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageRecord {
    /// Emulator-wide processing order.
    pub seq: u64,
    /// When the message took effect (arrival plus latency).
    pub timestamp: DateTime<Utc>,
    /// Target port.
    pub port: String,
    /// Raw payload.
    pub data: String,
    /// Outcome.
    pub status: MessageStatus,
    /// Modeled latency in milliseconds.
    pub latency_ms: f64,
    /// Failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Bounded log of recent messages, oldest first.
#[derive(Debug, Clone)]
pub struct MessageLog {
    capacity: usize,
    records: VecDeque<MessageRecord>,
}

impl MessageLog {
    /// A log holding at most `capacity` records; 0 disables recording.
    pub fn new(capacity: usize) -> Self {
        MessageLog {
            capacity,
            records: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_LEN)),
        }
    }

    /// Maximum number of records.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a record, evicting the oldest when full.
    pub fn push(&mut self, record: MessageRecord) {
        if self.capacity == 0 {
            return;
        }
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Records, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &MessageRecord> {
        self.records.iter()
    }

    /// The newest `limit` records, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<MessageRecord> {
        let skip = self.records.len().saturating_sub(limit);
        self.records.iter().skip(skip).cloned().collect()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        MessageLog::new(DEFAULT_HISTORY_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(data: &str) -> MessageRecord {
        MessageRecord {
            seq: 0,
            timestamp: Utc::now(),
            port: "COM1".to_string(),
            data: data.to_string(),
            status: MessageStatus::Applied,
            latency_ms: 1.0,
            error: None,
        }
    }

    #[test]
    fn test_evicts_oldest() {
        let mut log = MessageLog::new(3);
        for data in ["a", "b", "c", "d"] {
            log.push(record(data));
        }
        let data: Vec<_> = log.iter().map(|r| r.data.as_str()).collect();
        assert_eq!(data, ["b", "c", "d"]);
    }

    #[test]
    fn test_recent() {
        let mut log = MessageLog::new(10);
        for data in ["a", "b", "c"] {
            log.push(record(data));
        }
        let recent: Vec<_> = log.recent(2).into_iter().map(|r| r.data).collect();
        assert_eq!(recent, ["b", "c"]);
        assert_eq!(log.recent(50).len(), 3);
    }

    #[test]
    fn test_zero_capacity_records_nothing() {
        let mut log = MessageLog::new(0);
        log.push(record("a"));
        assert!(log.is_empty());
    }

    #[test]
    fn test_record_serializes() {
        let mut failed = record("\x1B[9H");
        failed.status = MessageStatus::Failed;
        failed.error = Some("parse error".to_string());

        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "parse error");
        assert!(serde_json::to_value(record("ok")).unwrap().get("error").is_none());
    }
}
