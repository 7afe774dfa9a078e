//! The serial/USB emulator.
//!
//! [`Emulator::ingress`] is the single entry point for inbound messages. For
//! every message it:
//!
//! 1. resolves the target endpoint,
//! 2. rolls latency and faults on the endpoint's seeded rng,
//! 3. sleeps the scaled latency with no lock held,
//! 4. decodes and applies the payload under the endpoint lock,
//! 5. records statistics, metrics and a tracing event.
//!
//! Messages to different ports proceed in parallel; messages to the same
//! port serialise at step 4.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use vdisplay_metrics::{metric_defs, MetricLabels};
use vdisplay_protocol::{decode, ParseError, Theme, ThemeColors};

use crate::display::{ConnectionKind, ConnectionStatus, ContentSnapshot, EndpointConfig, EndpointState};
use crate::error::{EmulatorError, EmulatorResult, FailureCause};
use crate::fault::{FaultDecision, FaultPlan};
use crate::handler::{apply, Ack};
use crate::history::{MessageRecord, MessageStatus, DEFAULT_HISTORY_LEN};
use crate::latency::{port_rng, sample_latency, LatencyPolicy, LatencyRange};
use crate::registry::{EndpointHandle, Registry};
use crate::stats::{GlobalCounters, GlobalStatistics, Statistics, StatsSummary};

/// Emulator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    /// Seed for per-endpoint latency and fault rngs.
    pub seed: u64,
    /// Multiplier applied to simulated latency before sleeping.
    /// 0 disables sleeping; the modeled latency is still recorded.
    pub time_scale: f64,
    /// Latency ranges per connection kind.
    pub latency: LatencyPolicy,
    /// Messages kept in each endpoint's history.
    pub history_len: usize,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        EmulatorConfig {
            seed: 0,
            time_scale: 1.0,
            latency: LatencyPolicy::default(),
            history_len: DEFAULT_HISTORY_LEN,
        }
    }
}

impl EmulatorConfig {
    /// A config that never sleeps, for tests and batch runs.
    pub fn instant(seed: u64) -> Self {
        EmulatorConfig {
            seed,
            time_scale: 0.0,
            ..Default::default()
        }
    }

    /// Set the time scale.
    pub fn with_time_scale(mut self, time_scale: f64) -> Self {
        self.time_scale = time_scale;
        self
    }

    /// Set the latency policy.
    pub fn with_latency(mut self, latency: LatencyPolicy) -> Self {
        self.latency = latency;
        self
    }

    /// Set the per-endpoint history length.
    pub fn with_history_len(mut self, history_len: usize) -> Self {
        self.history_len = history_len;
        self
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !self.time_scale.is_finite() || self.time_scale < 0.0 {
            return Err(format!("time scale {} must be finite and non-negative", self.time_scale));
        }
        self.latency.validate()
    }
}

/// A message waiting to be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Target port name.
    pub port: String,
    /// Raw payload.
    pub payload: String,
    /// When the message arrived.
    pub arrived_at: DateTime<Utc>,
}

impl InboundMessage {
    /// A message arriving now.
    pub fn new(port: impl Into<String>, payload: impl Into<String>) -> Self {
        InboundMessage {
            port: port.into(),
            payload: payload.into(),
            arrived_at: Utc::now(),
        }
    }
}

/// Monitoring view of one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointSnapshot {
    /// Port name.
    pub port: String,
    /// Connection status.
    pub status: ConnectionStatus,
    /// Connection kind.
    pub connection: ConnectionKind,
    /// Current theme.
    pub theme: Theme,
    /// Colours of the current theme.
    pub colors: ThemeColors,
    /// Display lines.
    pub content: Vec<String>,
    /// When the content last changed.
    pub last_update: Option<DateTime<Utc>>,
    /// Message statistics.
    pub stats: StatsSummary,
}

/// Virtual display emulator.
#[derive(Debug)]
pub struct Emulator {
    config: EmulatorConfig,
    registry: Registry,
    global: GlobalCounters,
    next_seq: AtomicU64,
}

impl Emulator {
    /// Create an emulator with no endpoints.
    pub fn new(config: EmulatorConfig) -> EmulatorResult<Self> {
        config.validate().map_err(EmulatorError::InvalidConfig)?;
        Ok(Emulator {
            registry: Registry::with_history_len(config.history_len),
            config,
            global: GlobalCounters::default(),
            next_seq: AtomicU64::new(0),
        })
    }

    /// Emulator configuration.
    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Endpoint lifecycle
    // ------------------------------------------------------------------------

    /// Create an endpoint.
    pub fn create_endpoint(&self, config: EndpointConfig) -> EmulatorResult<EndpointHandle> {
        let rng = port_rng(self.config.seed, &config.port);
        let handle = self.registry.create(config, rng)?;
        info!(
            port = handle.port(),
            id = %handle.id(),
            connection = %handle.connection(),
            "endpoint created"
        );
        self.update_gauge();
        Ok(handle)
    }

    /// Remove an endpoint. In-flight messages to it fail with `UnknownPort`.
    pub fn remove_endpoint(&self, port: &str) -> EmulatorResult<()> {
        let handle = self.registry.remove(port)?;
        info!(port, id = %handle.id(), "endpoint removed");
        self.update_gauge();
        Ok(())
    }

    /// Look up an endpoint.
    pub fn endpoint(&self, port: &str) -> Option<EndpointHandle> {
        self.registry.get(port)
    }

    /// Registered port names, sorted.
    pub fn ports(&self) -> Vec<String> {
        self.registry.ports()
    }

    /// Change an endpoint's connection status.
    pub fn set_status(&self, port: &str, status: ConnectionStatus) -> EmulatorResult<()> {
        let handle = self.lookup(port)?;
        let previous = {
            let mut guarded = handle.entry().lock();
            let previous = guarded.state.status();
            guarded.state.set_status(status);
            previous
        };
        if previous != status {
            info!(port, from = %previous, to = %status, "endpoint status changed");
        }
        Ok(())
    }

    /// Attach a fault plan to an endpoint.
    pub fn set_fault(&self, port: &str, plan: FaultPlan) -> EmulatorResult<()> {
        plan.validate().map_err(EmulatorError::InvalidConfig)?;
        let handle = self.lookup(port)?;
        handle.entry().control().fault = Some(plan);
        info!(port, fault = plan.mode.label(), probability = plan.probability, "fault plan set");
        Ok(())
    }

    /// Remove an endpoint's fault plan.
    pub fn clear_fault(&self, port: &str) -> EmulatorResult<()> {
        let handle = self.lookup(port)?;
        handle.entry().control().fault = None;
        info!(port, "fault plan cleared");
        Ok(())
    }

    /// Override an endpoint's latency range; `None` restores the default
    /// for its connection kind.
    pub fn set_latency(&self, port: &str, range: Option<LatencyRange>) -> EmulatorResult<()> {
        if let Some(range) = range {
            range.validate().map_err(EmulatorError::InvalidConfig)?;
        }
        let handle = self.lookup(port)?;
        handle.entry().control().latency = range;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Ingress
    // ------------------------------------------------------------------------

    /// Deliver a text payload to a port.
    pub fn ingress(&self, port: &str, raw: &str, arrival: DateTime<Utc>) -> EmulatorResult<Ack> {
        self.deliver(port, raw, Ok(()), arrival)
    }

    /// Deliver a byte payload to a port. Bytes that are not UTF-8 fail as a
    /// malformed payload.
    pub fn ingress_bytes(&self, port: &str, raw: &[u8], arrival: DateTime<Utc>) -> EmulatorResult<Ack> {
        match std::str::from_utf8(raw) {
            Ok(text) => self.deliver(port, text, Ok(()), arrival),
            Err(e) => {
                let lossy = String::from_utf8_lossy(raw);
                let invalid = ParseError::Malformed(format!("payload is not valid UTF-8: {e}"));
                self.deliver(port, &lossy, Err(invalid), arrival)
            }
        }
    }

    /// Deliver an [`InboundMessage`].
    pub fn ingress_message(&self, message: &InboundMessage) -> EmulatorResult<Ack> {
        self.ingress(&message.port, &message.payload, message.arrived_at)
    }

    fn deliver(
        &self,
        port: &str,
        raw: &str,
        precheck: Result<(), ParseError>,
        arrival: DateTime<Utc>,
    ) -> EmulatorResult<Ack> {
        let handle = match self.registry.resolve(port) {
            Ok(handle) => handle,
            Err(err) => {
                self.record_unresolved(port, raw.len(), &err);
                return Err(err);
            }
        };
        let entry = handle.entry();
        let labels = MetricLabels::new(port, handle.connection().as_str());
        metrics::counter!(metric_defs::INGRESS_RECEIVED.name, &labels.to_labels()).increment(1);

        let (mut latency_ms, decision, fault_label) = {
            let mut control = entry.control();
            let range = control
                .latency
                .unwrap_or_else(|| self.config.latency.range(handle.connection()));
            let latency_ms = sample_latency(
                range,
                handle.connection(),
                handle.baud_rate(),
                raw.len(),
                &mut control.rng,
            );
            let fault = control.fault;
            let (decision, label) = match fault {
                Some(plan) => (plan.roll(&mut control.rng), plan.mode.label()),
                None => (FaultDecision::Pass, ""),
            };
            (latency_ms, decision, label)
        };

        if decision != FaultDecision::Pass {
            metrics::counter!(
                metric_defs::FAULT_INJECTED.name,
                &labels.with(&[("fault", fault_label.to_string())])
            )
            .increment(1);
        }
        if let FaultDecision::Delay(extra) = decision {
            latency_ms += extra;
        }

        self.simulate_delay(port, latency_ms);

        let applied_at = match applied_at(arrival, latency_ms) {
            Some(at) => at,
            None => {
                let err = EmulatorError::Internal(format!(
                    "arrival {arrival} plus {latency_ms} ms is out of range"
                ));
                self.record_unresolved(port, raw.len(), &err);
                return Err(err);
            }
        };
        let outcome = {
            let mut guarded = entry.lock();
            if entry.is_removed() {
                drop(guarded);
                let err = EmulatorError::UnknownPort(port.to_string());
                self.record_unresolved(port, raw.len(), &err);
                return Err(err);
            }
            let outcome = process(&mut guarded.state, raw, precheck, decision, applied_at);
            let (status, error) = match &outcome {
                Ok(_) => {
                    guarded.stats.record_success(latency_ms, raw.len());
                    (MessageStatus::Applied, None)
                }
                Err(cause) => {
                    guarded.stats.record_failure(cause, raw.len());
                    (MessageStatus::Failed, Some(cause.to_string()))
                }
            };
            guarded.history.push(MessageRecord {
                seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                timestamp: applied_at,
                port: port.to_string(),
                data: raw.to_string(),
                status,
                latency_ms,
                error,
            });
            outcome
        };

        match outcome {
            Ok(snapshot) => {
                self.global.record_success(latency_ms, raw.len());
                metrics::counter!(metric_defs::INGRESS_SUCCEEDED.name, &labels.to_labels())
                    .increment(1);
                metrics::histogram!(metric_defs::INGRESS_LATENCY.name, &labels.to_labels())
                    .record(latency_ms);
                debug!(port, latency_ms, "message applied");
                trace!(port, lines = ?snapshot.lines, "display content");
                Ok(Ack { snapshot, latency_ms })
            }
            Err(cause) => {
                self.global.record_failure(Some(&cause), raw.len());
                metrics::counter!(
                    metric_defs::INGRESS_FAILED.name,
                    &labels.with(&[("cause", cause.label().to_string())])
                )
                .increment(1);
                debug!(port, raw = ?raw, %cause, "message rejected");
                Err(EmulatorError::ProtocolFailure {
                    port: port.to_string(),
                    raw: raw.to_string(),
                    cause,
                })
            }
        }
    }

    fn record_unresolved(&self, port: &str, bytes: usize, err: &EmulatorError) {
        match err {
            EmulatorError::UnknownPort(_) => {
                self.global.record_unknown_port(bytes);
                metrics::counter!(metric_defs::INGRESS_UNKNOWN_PORT.name).increment(1);
            }
            _ => self.global.record_failure(None, bytes),
        }
        debug!(port, error = %err, "message not delivered");
    }

    fn simulate_delay(&self, port: &str, latency_ms: f64) {
        let scaled = latency_ms * self.config.time_scale;
        if scaled <= 0.0 {
            return;
        }
        match Duration::try_from_secs_f64(scaled / 1000.0) {
            Ok(delay) => std::thread::sleep(delay),
            Err(e) => warn!(port, scaled_ms = scaled, error = %e, "latency not representable, not sleeping"),
        }
    }

    // ------------------------------------------------------------------------
    // Monitoring
    // ------------------------------------------------------------------------

    /// Current view of one endpoint.
    pub fn snapshot(&self, port: &str) -> EmulatorResult<EndpointSnapshot> {
        let handle = self.lookup(port)?;
        Ok(endpoint_snapshot(&handle))
    }

    /// Current view of every endpoint, sorted by port.
    pub fn snapshots(&self) -> Vec<EndpointSnapshot> {
        self.registry.handles().iter().map(endpoint_snapshot).collect()
    }

    /// Copy of an endpoint's display content.
    pub fn content(&self, port: &str) -> EmulatorResult<ContentSnapshot> {
        let handle = self.lookup(port)?;
        let guarded = handle.entry().lock();
        Ok(guarded.state.snapshot())
    }

    /// Emulator-wide statistics.
    pub fn statistics(&self) -> GlobalStatistics {
        self.global.snapshot()
    }

    /// Statistics of one endpoint.
    pub fn endpoint_statistics(&self, port: &str) -> EmulatorResult<Statistics> {
        let handle = self.lookup(port)?;
        let stats = handle.entry().lock().stats;
        Ok(stats)
    }

    /// Recent messages of one endpoint, oldest first.
    pub fn history(&self, port: &str) -> EmulatorResult<Vec<MessageRecord>> {
        let handle = self.lookup(port)?;
        let guarded = handle.entry().lock();
        Ok(guarded.history.iter().cloned().collect())
    }

    /// The newest `limit` messages across every endpoint, oldest first.
    pub fn recent_messages(&self, limit: usize) -> Vec<MessageRecord> {
        let mut records: Vec<MessageRecord> = self
            .registry
            .handles()
            .iter()
            .flat_map(|handle| handle.entry().lock().history.recent(limit))
            .collect();
        records.sort_by_key(|r| r.seq);
        let skip = records.len().saturating_sub(limit);
        records.split_off(skip)
    }

    /// Clear the history of one port, or of every port when `port` is `None`.
    pub fn clear_history(&self, port: Option<&str>) -> EmulatorResult<()> {
        match port {
            Some(port) => self.lookup(port)?.entry().lock().history.clear(),
            None => {
                for handle in self.registry.handles() {
                    handle.entry().lock().history.clear();
                }
            }
        }
        Ok(())
    }

    /// Reset statistics for one port, or for every port and the global
    /// totals when `port` is `None`.
    pub fn reset_statistics(&self, port: Option<&str>) -> EmulatorResult<()> {
        match port {
            Some(port) => {
                let handle = self.lookup(port)?;
                handle.entry().lock().stats = Statistics::default();
                info!(port, "statistics reset");
            }
            None => {
                for handle in self.registry.handles() {
                    handle.entry().lock().stats = Statistics::default();
                }
                self.global.reset();
                info!("all statistics reset");
            }
        }
        Ok(())
    }

    fn lookup(&self, port: &str) -> EmulatorResult<EndpointHandle> {
        match self.registry.resolve(port) {
            Err(EmulatorError::UnknownPort(port)) => Err(EmulatorError::NotFound(port)),
            other => other,
        }
    }

    fn update_gauge(&self) {
        metrics::gauge!(metric_defs::ENDPOINTS_ACTIVE.name).set(self.registry.len() as f64);
    }
}

fn process(
    state: &mut EndpointState,
    raw: &str,
    precheck: Result<(), ParseError>,
    decision: FaultDecision,
    at: DateTime<Utc>,
) -> Result<ContentSnapshot, FailureCause> {
    if let FaultDecision::Fail(fault) = decision {
        return Err(FailureCause::Injected(fault));
    }
    precheck?;
    let command = decode(raw, state.config().limits())?;
    trace!(port = %state.config().port, command = command.name(), "applying");
    Ok(apply(state, command, raw, at)?)
}

/// When a message arriving at `arrival` takes effect, or `None` if that
/// falls outside the representable range.
fn applied_at(arrival: DateTime<Utc>, latency_ms: f64) -> Option<DateTime<Utc>> {
    let micros = latency_ms * 1000.0;
    if !micros.is_finite() || micros < 0.0 || micros > i64::MAX as f64 {
        return None;
    }
    arrival.checked_add_signed(chrono::Duration::microseconds(micros as i64))
}

fn endpoint_snapshot(handle: &EndpointHandle) -> EndpointSnapshot {
    let guarded = handle.entry().lock();
    let content = guarded.state.snapshot();
    EndpointSnapshot {
        port: handle.port().to_string(),
        status: content.status,
        connection: handle.connection(),
        theme: content.theme,
        colors: content.theme.colors(),
        content: content.lines,
        last_update: content.last_update,
        stats: guarded.stats.summary(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{InjectedFault, ProtocolError};
    use crate::fault::FaultMode;
    use crate::latency::MAX_LATENCY_MS;

    fn emulator() -> Emulator {
        Emulator::new(EmulatorConfig::instant(42)).unwrap()
    }

    #[test]
    fn test_invalid_config() {
        let err = Emulator::new(EmulatorConfig::default().with_time_scale(-1.0)).unwrap_err();
        assert!(matches!(err, EmulatorError::InvalidConfig(_)));
    }

    #[test]
    fn test_ingress_applies_and_records() {
        let emu = emulator();
        emu.create_endpoint(EndpointConfig::new("COM1", 2, 20)).unwrap();

        let ack = emu.ingress("COM1", "Hello World", Utc::now()).unwrap();
        assert_eq!(ack.snapshot.lines[0], "Hello World         ");
        assert!(LatencyPolicy::default().serial.contains(ack.latency_ms));

        let stats = emu.endpoint_statistics("COM1").unwrap();
        assert_eq!((stats.received, stats.succeeded, stats.failed), (1, 1, 0));
        assert_eq!(emu.statistics().totals.succeeded, 1);
    }

    #[test]
    fn test_unknown_port_touches_only_global() {
        let emu = emulator();
        emu.create_endpoint(EndpointConfig::new("COM1", 2, 20)).unwrap();

        let err = emu.ingress("COM7", "hi", Utc::now()).unwrap_err();
        assert_eq!(err, EmulatorError::UnknownPort("COM7".into()));

        let global = emu.statistics();
        assert_eq!(global.unknown_port, 1);
        assert_eq!(global.totals.failed, 1);
        assert_eq!(emu.endpoint_statistics("COM1").unwrap(), Statistics::default());
    }

    #[test]
    fn test_parse_failure_carries_raw() {
        let emu = emulator();
        emu.create_endpoint(EndpointConfig::new("COM1", 2, 20)).unwrap();

        let err = emu.ingress("COM1", "\x1B[9Hx", Utc::now()).unwrap_err();
        match err {
            EmulatorError::ProtocolFailure { port, raw, cause } => {
                assert_eq!(port, "COM1");
                assert_eq!(raw, "\x1B[9Hx");
                assert_eq!(cause, FailureCause::Parse(ParseError::InvalidIndex { row: 9, line_count: 2 }));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(emu.endpoint_statistics("COM1").unwrap().failed, 1);
    }

    #[test]
    fn test_disconnected_endpoint_rejects() {
        let emu = emulator();
        emu.create_endpoint(EndpointConfig::new("COM1", 2, 20)).unwrap();
        emu.set_status("COM1", ConnectionStatus::Disconnected).unwrap();

        let err = emu.ingress("COM1", "hi", Utc::now()).unwrap_err();
        assert_eq!(
            err.cause(),
            Some(&FailureCause::Protocol(ProtocolError::EndpointDisconnected(
                ConnectionStatus::Disconnected
            )))
        );
        assert_eq!(emu.snapshot("COM1").unwrap().content, vec![" ".repeat(20); 2]);
    }

    #[test]
    fn test_invalid_utf8_bytes() {
        let emu = emulator();
        emu.create_endpoint(EndpointConfig::new("COM1", 2, 20)).unwrap();
        let err = emu.ingress_bytes("COM1", &[0x48, 0xff], Utc::now()).unwrap_err();
        assert!(matches!(err.cause(), Some(FailureCause::Parse(ParseError::Malformed(_)))));
        assert!(emu.ingress_bytes("COM1", b"ok", Utc::now()).is_ok());
    }

    #[test]
    fn test_drop_fault_leaves_content() {
        let emu = emulator();
        emu.create_endpoint(EndpointConfig::new("COM1", 2, 20)).unwrap();
        emu.set_fault("COM1", FaultPlan::always(FaultMode::Drop)).unwrap();

        let err = emu.ingress("COM1", "lost", Utc::now()).unwrap_err();
        assert_eq!(err.cause(), Some(&FailureCause::Injected(InjectedFault::Dropped)));
        assert!(emu.content("COM1").unwrap().last_raw.is_none());

        emu.clear_fault("COM1").unwrap();
        assert!(emu.ingress("COM1", "kept", Utc::now()).is_ok());
    }

    #[test]
    fn test_extra_latency_fault() {
        let emu = emulator();
        emu.create_endpoint(EndpointConfig::new("USB0", 2, 20).with_connection(ConnectionKind::Usb))
            .unwrap();
        emu.set_latency("USB0", Some(LatencyRange::fixed(1.0))).unwrap();
        emu.set_fault("USB0", FaultPlan::always(FaultMode::ExtraLatency { ms: 40.0 })).unwrap();

        let ack = emu.ingress("USB0", "slow", Utc::now()).unwrap();
        assert_eq!(ack.latency_ms, 41.0);
    }

    #[test]
    fn test_latency_beyond_limit_is_rejected() {
        let emu = Emulator::new(EmulatorConfig::default().with_time_scale(1.0)).unwrap();
        emu.create_endpoint(EndpointConfig::new("COM1", 2, 20)).unwrap();

        let huge = FaultPlan::always(FaultMode::ExtraLatency { ms: 1e17 });
        assert!(matches!(emu.set_fault("COM1", huge), Err(EmulatorError::InvalidConfig(_))));
        assert!(matches!(
            emu.set_latency("COM1", Some(LatencyRange::fixed(1e17))),
            Err(EmulatorError::InvalidConfig(_))
        ));
        let policy = LatencyPolicy {
            network: LatencyRange::new(0.0, 1e17),
            ..LatencyPolicy::default()
        };
        assert!(matches!(
            Emulator::new(EmulatorConfig::instant(1).with_latency(policy)),
            Err(EmulatorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_unrepresentable_arrival_fails_cleanly() {
        let emu = emulator();
        emu.create_endpoint(EndpointConfig::new("USB0", 2, 20).with_connection(ConnectionKind::Usb))
            .unwrap();
        emu.set_latency("USB0", Some(LatencyRange::fixed(MAX_LATENCY_MS))).unwrap();

        let err = emu.ingress("USB0", "late", DateTime::<Utc>::MAX_UTC).unwrap_err();
        assert!(matches!(err, EmulatorError::Internal(_)));
        assert_eq!(emu.statistics().totals.failed, 1);
        assert!(emu.content("USB0").unwrap().last_raw.is_none());

        // The endpoint keeps working for ordinary arrivals.
        assert!(emu.ingress("USB0", "ok", Utc::now()).is_ok());
    }

    #[test]
    fn test_applied_at_bounds() {
        let now = Utc::now();
        assert_eq!(applied_at(now, 1.5), Some(now + chrono::Duration::microseconds(1500)));
        assert_eq!(applied_at(now, 1e17), None);
        assert_eq!(applied_at(now, f64::INFINITY), None);
        assert_eq!(applied_at(DateTime::<Utc>::MAX_UTC, 1.0), None);
    }

    #[test]
    fn test_huge_time_scale_does_not_panic() {
        let emu = Emulator::new(EmulatorConfig::default().with_time_scale(1e300)).unwrap();
        emu.create_endpoint(EndpointConfig::new("USB0", 2, 20).with_connection(ConnectionKind::Usb))
            .unwrap();
        emu.set_latency("USB0", Some(LatencyRange::fixed(MAX_LATENCY_MS))).unwrap();
        assert!(emu.ingress("USB0", "x", Utc::now()).is_ok());
    }

    #[test]
    fn test_injected_fault_precedes_status_check() {
        let emu = emulator();
        emu.create_endpoint(EndpointConfig::new("COM1", 2, 20)).unwrap();
        emu.set_status("COM1", ConnectionStatus::Disconnected).unwrap();
        emu.set_fault("COM1", FaultPlan::always(FaultMode::Error)).unwrap();

        let err = emu.ingress("COM1", "hi", Utc::now()).unwrap_err();
        assert_eq!(err.cause(), Some(&FailureCause::Injected(InjectedFault::Error)));

        emu.clear_fault("COM1").unwrap();
        let err = emu.ingress("COM1", "hi", Utc::now()).unwrap_err();
        assert!(matches!(err.cause(), Some(FailureCause::Protocol(_))));
    }

    #[test]
    fn test_history_and_breakdown() {
        let emu = emulator();
        emu.create_endpoint(EndpointConfig::new("COM1", 2, 20)).unwrap();
        emu.ingress("COM1", "Hello", Utc::now()).unwrap();
        emu.ingress("COM1", "\x1B[9Hx", Utc::now()).unwrap_err();
        emu.ingress("NOPE", "lost", Utc::now()).unwrap_err();

        let history = emu.history("COM1").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].data, "Hello");
        assert_eq!(history[0].status, MessageStatus::Applied);
        assert_eq!(history[1].status, MessageStatus::Failed);
        assert!(history[1].error.as_deref().unwrap_or_default().contains("parse"));

        let stats = emu.endpoint_statistics("COM1").unwrap();
        assert_eq!(stats.bytes_received, 5 + 5);
        assert_eq!(stats.bytes_applied, 5);
        assert_eq!(stats.failures.parse, 1);

        let global = emu.statistics();
        assert_eq!(global.totals.bytes_received, 5 + 5 + 4);
        assert_eq!(global.totals.failures.parse, 1);
        assert_eq!(global.unknown_port, 1);

        emu.clear_history(Some("COM1")).unwrap();
        assert!(emu.history("COM1").unwrap().is_empty());
        assert!(matches!(emu.history("NOPE"), Err(EmulatorError::NotFound(_))));
    }

    #[test]
    fn test_history_is_bounded() {
        let emu = Emulator::new(EmulatorConfig::instant(1).with_history_len(3)).unwrap();
        emu.create_endpoint(EndpointConfig::new("COM1", 2, 20)).unwrap();
        for i in 0..5 {
            emu.ingress("COM1", &format!("msg {i}"), Utc::now()).unwrap();
        }
        let data: Vec<_> = emu.history("COM1").unwrap().into_iter().map(|r| r.data).collect();
        assert_eq!(data, ["msg 2", "msg 3", "msg 4"]);
    }

    #[test]
    fn test_recent_messages_merge_ports() {
        let emu = emulator();
        emu.create_endpoint(EndpointConfig::new("COM1", 2, 20)).unwrap();
        emu.create_endpoint(EndpointConfig::new("COM2", 2, 20)).unwrap();
        let start = Utc::now();
        for (i, port) in ["COM2", "COM1", "COM2", "COM1"].into_iter().enumerate() {
            let arrival = start + chrono::Duration::seconds(i as i64);
            emu.ingress(port, &format!("m{i}"), arrival).unwrap();
        }
        let recent: Vec<_> = emu.recent_messages(3).into_iter().map(|r| r.data).collect();
        assert_eq!(recent, ["m1", "m2", "m3"]);
    }

    #[test]
    fn test_last_update_is_arrival_plus_latency() {
        let emu = emulator();
        emu.create_endpoint(EndpointConfig::new("USB0", 2, 20).with_connection(ConnectionKind::Usb))
            .unwrap();
        emu.set_latency("USB0", Some(LatencyRange::fixed(2.0))).unwrap();

        let arrival = Utc::now();
        let ack = emu.ingress("USB0", "t", arrival).unwrap();
        assert_eq!(ack.snapshot.last_update, Some(arrival + chrono::Duration::milliseconds(2)));
    }

    #[test]
    fn test_operator_calls_on_missing_port() {
        let emu = emulator();
        assert_eq!(emu.remove_endpoint("COM1"), Err(EmulatorError::NotFound("COM1".into())));
        assert!(matches!(emu.snapshot("COM1"), Err(EmulatorError::NotFound(_))));
        assert!(matches!(
            emu.set_status("COM1", ConnectionStatus::Connected),
            Err(EmulatorError::NotFound(_))
        ));
        assert!(matches!(emu.reset_statistics(Some("COM1")), Err(EmulatorError::NotFound(_))));
    }

    #[test]
    fn test_reset_statistics() {
        let emu = emulator();
        emu.create_endpoint(EndpointConfig::new("COM1", 2, 20)).unwrap();
        emu.create_endpoint(EndpointConfig::new("COM2", 2, 20)).unwrap();
        emu.ingress("COM1", "a", Utc::now()).unwrap();
        emu.ingress("COM2", "b", Utc::now()).unwrap();

        emu.reset_statistics(Some("COM1")).unwrap();
        assert_eq!(emu.endpoint_statistics("COM1").unwrap().received, 0);
        assert_eq!(emu.endpoint_statistics("COM2").unwrap().received, 1);
        assert_eq!(emu.statistics().totals.received, 2);

        emu.reset_statistics(None).unwrap();
        assert_eq!(emu.endpoint_statistics("COM2").unwrap().received, 0);
        assert_eq!(emu.statistics(), GlobalStatistics::default());
    }

    #[test]
    fn test_snapshot_serializes_monitoring_shape() {
        let emu = emulator();
        emu.create_endpoint(EndpointConfig::new("COM1", 1, 5)).unwrap();
        emu.ingress("COM1", "abc", Utc::now()).unwrap();

        let json = serde_json::to_value(emu.snapshot("COM1").unwrap()).unwrap();
        assert_eq!(json["port"], "COM1");
        assert_eq!(json["status"], "connected");
        assert_eq!(json["content"][0], "abc  ");
        assert_eq!(json["stats"]["sent"], 1);
        assert_eq!(json["stats"]["failed"], 0);
        assert_eq!(json["stats"]["bytes_received"], 3);
        assert_eq!(json["colors"]["foreground"], "#00ff00");
    }
}
