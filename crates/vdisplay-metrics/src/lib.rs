//! Metrics infrastructure for the virtual display emulator.
//!
//! This crate declares every metric the emulator records as a structured
//! [`Metric`] constant, so names are never typed twice. It re-exports the
//! `metrics` crate; whichever recorder the host process installs receives the
//! values.
//!
//! # Example
//!
//! ```rust,ignore
//! use vdisplay_metrics::{describe_metrics, metric_defs, MetricLabels};
//!
//! describe_metrics();
//!
//! let labels = MetricLabels::new("COM1", "serial");
//! metrics::counter!(metric_defs::INGRESS_RECEIVED.name, &labels.to_labels()).increment(1);
//! ```
//!
//! # Metric Type
//!
//! ```rust
//! use vdisplay_metrics::{Metric, MetricKind};
//! use metrics::Unit;
//!
//! const MY_COUNTER: Metric = Metric::counter("my.counter")
//!     .with_description("A counter metric")
//!     .with_unit(Unit::Count)
//!     .with_labels(&["port", "connection"]);
//!
//! assert_eq!(MY_COUNTER.kind, MetricKind::Counter);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// The kind of metric (counter, gauge, or histogram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A gauge that can go up and down.
    Gauge,
    /// A histogram for recording distributions.
    Histogram,
}

impl MetricKind {
    /// Returns the kind as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric declaration with its metadata.
///
/// Use the const constructors to declare metrics at compile time.
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g., "vdisplay.ingress.received").
    pub name: &'static str,
    /// The kind of metric (counter, gauge, histogram).
    pub kind: MetricKind,
    /// Human-readable description of the metric.
    pub description: &'static str,
    /// The unit of measurement (optional).
    pub unit: Option<Unit>,
    /// Expected label keys for this metric.
    pub labels: &'static [&'static str],
}

impl Metric {
    /// Creates a new counter metric with the given name.
    pub const fn counter(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Counter,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Creates a new gauge metric with the given name.
    pub const fn gauge(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Gauge,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Creates a new histogram metric with the given name.
    pub const fn histogram(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Histogram,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Sets the description for the metric.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the unit for the metric.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Sets the expected label keys for the metric.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers this metric's description with the metrics recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Gauge, Some(unit)) => {
                describe_gauge!(self.name, unit, self.description);
            }
            (MetricKind::Gauge, None) => {
                describe_gauge!(self.name, self.description);
            }
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description);
            }
            (MetricKind::Histogram, None) => {
                describe_histogram!(self.name, self.description);
            }
        }
    }
}

/// All metric definitions for the emulator.
pub mod metric_defs {
    use super::{Metric, Unit};

    /// Labels present on all endpoint-scoped metrics.
    pub const STANDARD_LABELS: &[&str] = &["port", "connection"];

    // ========================================================================
    // Ingress
    // ========================================================================

    /// Messages delivered to a known endpoint.
    pub const INGRESS_RECEIVED: Metric = Metric::counter("vdisplay.ingress.received")
        .with_description("Messages delivered to a known endpoint")
        .with_unit(Unit::Count)
        .with_labels(STANDARD_LABELS);

    /// Messages applied successfully.
    pub const INGRESS_SUCCEEDED: Metric = Metric::counter("vdisplay.ingress.succeeded")
        .with_description("Messages applied successfully")
        .with_unit(Unit::Count)
        .with_labels(STANDARD_LABELS);

    /// Messages that failed to parse, apply, or were failed by injection.
    ///
    /// Labels: port, connection, cause (parse | protocol | injected)
    pub const INGRESS_FAILED: Metric = Metric::counter("vdisplay.ingress.failed")
        .with_description("Messages that failed to parse or apply")
        .with_unit(Unit::Count)
        .with_labels(&["port", "connection", "cause"]);

    /// Messages addressed to a port that does not exist.
    pub const INGRESS_UNKNOWN_PORT: Metric = Metric::counter("vdisplay.ingress.unknown_port")
        .with_description("Messages addressed to a port that does not exist")
        .with_unit(Unit::Count);

    /// Simulated transport latency of successful messages.
    pub const INGRESS_LATENCY: Metric = Metric::histogram("vdisplay.ingress.latency_ms")
        .with_description("Simulated transport latency in milliseconds")
        .with_unit(Unit::Milliseconds)
        .with_labels(STANDARD_LABELS);

    /// Faults injected by the fault plan.
    ///
    /// Labels: port, connection, fault (drop | error | extra_latency)
    pub const FAULT_INJECTED: Metric = Metric::counter("vdisplay.fault.injected")
        .with_description("Faults injected by an endpoint's fault plan")
        .with_unit(Unit::Count)
        .with_labels(&["port", "connection", "fault"]);

    // ========================================================================
    // Endpoints
    // ========================================================================

    /// Number of endpoints currently registered.
    pub const ENDPOINTS_ACTIVE: Metric = Metric::gauge("vdisplay.endpoints.active")
        .with_description("Number of endpoints currently registered")
        .with_unit(Unit::Count);

    // ========================================================================
    // Bridge
    // ========================================================================

    /// Items read from an inbound source.
    pub const BRIDGE_POLLED: Metric = Metric::counter("vdisplay.bridge.polled")
        .with_description("Items read from an inbound source")
        .with_unit(Unit::Count)
        .with_labels(&["source"]);

    /// Items handed to ingress that succeeded.
    pub const BRIDGE_DELIVERED: Metric = Metric::counter("vdisplay.bridge.delivered")
        .with_description("Bridged items applied successfully")
        .with_unit(Unit::Count)
        .with_labels(&["source"]);

    /// Items whose final ingress outcome was an error.
    pub const BRIDGE_FAILED: Metric = Metric::counter("vdisplay.bridge.failed")
        .with_description("Bridged items whose final outcome was an error")
        .with_unit(Unit::Count)
        .with_labels(&["source"]);

    /// Delivery retries while an endpoint was unavailable.
    pub const BRIDGE_RETRIES: Metric = Metric::counter("vdisplay.bridge.retries")
        .with_description("Delivery retries while an endpoint was unavailable")
        .with_unit(Unit::Count)
        .with_labels(&["source"]);

    /// Source lines rejected before they became messages.
    pub const BRIDGE_REJECTED: Metric = Metric::counter("vdisplay.bridge.rejected")
        .with_description("Malformed source lines skipped by an inbound source")
        .with_unit(Unit::Count)
        .with_labels(&["source"]);

    /// Returns a slice of all defined metrics.
    pub const ALL: &[&Metric] = &[
        &INGRESS_RECEIVED,
        &INGRESS_SUCCEEDED,
        &INGRESS_FAILED,
        &INGRESS_UNKNOWN_PORT,
        &INGRESS_LATENCY,
        &FAULT_INJECTED,
        &ENDPOINTS_ACTIVE,
        &BRIDGE_POLLED,
        &BRIDGE_DELIVERED,
        &BRIDGE_FAILED,
        &BRIDGE_RETRIES,
        &BRIDGE_REJECTED,
    ];
}

/// Metric labels identifying an endpoint.
///
/// # Example
///
/// ```rust
/// use vdisplay_metrics::MetricLabels;
///
/// let labels = MetricLabels::new("COM1", "serial");
/// let label_vec = labels.to_labels();
/// assert_eq!(label_vec.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct MetricLabels {
    /// Port name of the endpoint.
    pub port: String,
    /// Connection kind (serial, usb, usb_serial, network).
    pub connection: String,
}

impl MetricLabels {
    /// Creates labels for the given port and connection kind.
    pub fn new(port: impl Into<String>, connection: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            connection: connection.into(),
        }
    }

    /// Converts the labels to the metrics crate label format.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        vec![
            ("port", self.port.clone()),
            ("connection", self.connection.clone()),
        ]
    }

    /// Returns labels with additional key-value pairs.
    pub fn with(&self, extra: &[(&'static str, String)]) -> Vec<(&'static str, String)> {
        let mut labels = self.to_labels();
        labels.extend_from_slice(extra);
        labels
    }
}

/// Describes all metrics used by the emulator.
///
/// Call once at startup, after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

/// Install a Prometheus recorder serving `/metrics` on the given address.
#[cfg(feature = "prometheus")]
pub fn install_prometheus_exporter(
    addr: std::net::SocketAddr,
) -> Result<(), metrics_exporter_prometheus::BuildError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    describe_metrics();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_labels_new() {
        let labels = MetricLabels::new("COM1", "serial");
        assert_eq!(labels.port, "COM1");
        assert_eq!(labels.connection, "serial");
    }

    #[test]
    fn test_with_extra_labels() {
        let labels = MetricLabels::new("USB0", "usb");
        let extended = labels.with(&[("cause", "parse".to_string())]);

        assert_eq!(extended.len(), 3);
        assert!(extended.contains(&("port", "USB0".to_string())));
        assert!(extended.contains(&("cause", "parse".to_string())));
    }

    #[test]
    fn test_metric_definitions() {
        assert_eq!(metric_defs::INGRESS_RECEIVED.name, "vdisplay.ingress.received");
        assert_eq!(metric_defs::INGRESS_RECEIVED.kind, MetricKind::Counter);
        assert_eq!(metric_defs::INGRESS_LATENCY.kind, MetricKind::Histogram);
        assert_eq!(metric_defs::INGRESS_LATENCY.unit, Some(Unit::Milliseconds));
        assert_eq!(metric_defs::ENDPOINTS_ACTIVE.kind, MetricKind::Gauge);
        assert_eq!(metric_defs::INGRESS_FAILED.labels, &["port", "connection", "cause"]);
    }

    #[test]
    fn test_all_metrics_unique() {
        let mut names: Vec<_> = metric_defs::ALL.iter().map(|m| m.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), metric_defs::ALL.len());
    }

    #[test]
    fn test_metric_minimal() {
        const MINIMAL: Metric = Metric::counter("minimal");

        assert_eq!(MINIMAL.name, "minimal");
        assert_eq!(MINIMAL.kind, MetricKind::Counter);
        assert_eq!(MINIMAL.description, "");
        assert_eq!(MINIMAL.unit, None);
        assert_eq!(MINIMAL.labels, &[] as &[&str]);
    }
}
