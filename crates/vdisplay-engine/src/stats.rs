//! Message statistics.
//!
//! Counters only grow between explicit resets. Per-endpoint statistics live
//! under the endpoint lock; the global totals are atomics plus a small lock
//! around the latency accumulator.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::FailureCause;

/// Latency accumulator in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencyStats {
    /// Number of samples.
    pub count: u64,
    /// Sum of samples.
    pub total_ms: f64,
    /// Smallest sample.
    pub min_ms: Option<f64>,
    /// Largest sample.
    pub max_ms: Option<f64>,
}

impl LatencyStats {
    /// Add a sample.
    pub fn record(&mut self, ms: f64) {
        self.count += 1;
        self.total_ms += ms;
        self.min_ms = Some(self.min_ms.map_or(ms, |m| m.min(ms)));
        self.max_ms = Some(self.max_ms.map_or(ms, |m| m.max(ms)));
    }

    /// Mean latency, 0 when there are no samples.
    pub fn avg_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_ms / self.count as f64
        }
    }
}

/// Failures of messages that reached an endpoint, by cause.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FailureCounts {
    /// Payloads that could not be decoded.
    pub parse: u64,
    /// Commands the display rejected, including disconnected endpoints.
    pub protocol: u64,
    /// Failures produced by a fault plan.
    pub injected: u64,
}

impl FailureCounts {
    /// Count one failure.
    pub fn record(&mut self, cause: &FailureCause) {
        match cause {
            FailureCause::Parse(_) => self.parse += 1,
            FailureCause::Protocol(_) => self.protocol += 1,
            FailureCause::Injected(_) => self.injected += 1,
        }
    }

    /// Sum over every cause.
    pub fn total(&self) -> u64 {
        self.parse + self.protocol + self.injected
    }
}

/// Counters for one endpoint, or a copy of the global totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Statistics {
    /// Messages that reached the endpoint (or, globally, the emulator).
    pub received: u64,
    /// Messages applied successfully.
    pub succeeded: u64,
    /// Messages that failed.
    pub failed: u64,
    /// Payload bytes of every received message.
    pub bytes_received: u64,
    /// Payload bytes of successfully applied messages.
    pub bytes_applied: u64,
    /// Failures by cause. Globally, unknown ports are counted separately.
    pub failures: FailureCounts,
    /// Latency of successful messages.
    pub latency: LatencyStats,
}

impl Statistics {
    /// Count a successful message of `bytes` payload bytes.
    pub fn record_success(&mut self, latency_ms: f64, bytes: usize) {
        self.received += 1;
        self.succeeded += 1;
        self.bytes_received += bytes as u64;
        self.bytes_applied += bytes as u64;
        self.latency.record(latency_ms);
    }

    /// Count a failed message of `bytes` payload bytes.
    pub fn record_failure(&mut self, cause: &FailureCause, bytes: usize) {
        self.received += 1;
        self.failed += 1;
        self.bytes_received += bytes as u64;
        self.failures.record(cause);
    }

    /// Mean latency of successful messages.
    pub fn avg_latency_ms(&self) -> f64 {
        self.latency.avg_ms()
    }

    /// Monitoring summary.
    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            sent: self.succeeded,
            failed: self.failed,
            bytes_received: self.bytes_received,
            latency_avg_ms: self.avg_latency_ms(),
        }
    }
}

/// Compact statistics for monitoring output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatsSummary {
    /// Messages applied successfully.
    pub sent: u64,
    /// Messages that failed.
    pub failed: u64,
    /// Payload bytes received.
    pub bytes_received: u64,
    /// Mean latency in milliseconds.
    pub latency_avg_ms: f64,
}

/// Emulator-wide statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GlobalStatistics {
    /// Totals over every ingress call.
    pub totals: Statistics,
    /// Ingress calls naming a port that did not exist.
    pub unknown_port: u64,
}

/// Shared global counters.
#[derive(Debug, Default)]
pub(crate) struct GlobalCounters {
    received: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    unknown_port: AtomicU64,
    bytes_received: AtomicU64,
    bytes_applied: AtomicU64,
    parse_failures: AtomicU64,
    protocol_failures: AtomicU64,
    injected_failures: AtomicU64,
    latency: Mutex<LatencyStats>,
}

impl GlobalCounters {
    pub(crate) fn record_success(&self, latency_ms: f64, bytes: usize) {
        // Latency first so a reader that sees the count also sees the sample.
        self.latency.lock().record(latency_ms);
        self.bytes_applied.fetch_add(bytes as u64, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
        self.succeeded.fetch_add(1, Ordering::Relaxed);
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a failure; `None` for messages that never reached an endpoint.
    pub(crate) fn record_failure(&self, cause: Option<&FailureCause>, bytes: usize) {
        let counter = match cause {
            Some(FailureCause::Parse(_)) => Some(&self.parse_failures),
            Some(FailureCause::Protocol(_)) => Some(&self.protocol_failures),
            Some(FailureCause::Injected(_)) => Some(&self.injected_failures),
            None => None,
        };
        if let Some(counter) = counter {
            counter.fetch_add(1, Ordering::Relaxed);
        }
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unknown_port(&self, bytes: usize) {
        self.unknown_port.fetch_add(1, Ordering::Relaxed);
        self.record_failure(None, bytes);
    }

    pub(crate) fn snapshot(&self) -> GlobalStatistics {
        let latency = *self.latency.lock();
        GlobalStatistics {
            totals: Statistics {
                received: self.received.load(Ordering::Relaxed),
                succeeded: self.succeeded.load(Ordering::Relaxed),
                failed: self.failed.load(Ordering::Relaxed),
                bytes_received: self.bytes_received.load(Ordering::Relaxed),
                bytes_applied: self.bytes_applied.load(Ordering::Relaxed),
                failures: FailureCounts {
                    parse: self.parse_failures.load(Ordering::Relaxed),
                    protocol: self.protocol_failures.load(Ordering::Relaxed),
                    injected: self.injected_failures.load(Ordering::Relaxed),
                },
                latency,
            },
            unknown_port: self.unknown_port.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn reset(&self) {
        let mut latency = self.latency.lock();
        *latency = LatencyStats::default();
        for counter in [
            &self.received,
            &self.succeeded,
            &self.failed,
            &self.unknown_port,
            &self.bytes_received,
            &self.bytes_applied,
            &self.parse_failures,
            &self.protocol_failures,
            &self.injected_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
