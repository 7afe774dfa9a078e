//! External message bridge.
//!
//! A bridge moves messages from an [`InboundSource`] into an
//! [`IngressTarget`] using two threads:
//!
//! ```text
//! source ──poll──▶ [poller] ──bounded queue──▶ [delivery] ──ingress──▶ target
//! ```
//!
//! The poller reads the source every `poll_interval` and blocks when the
//! queue is full; nothing is dropped. A source is told to commit only the
//! items that made it into the queue, so a restart re-reads anything not yet
//! accepted. The delivery thread drains the queue in order and retries
//! messages whose port does not exist yet.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use vdisplay_metrics::metric_defs;

use crate::emulator::{Emulator, InboundMessage};
use crate::error::{EmulatorError, EmulatorResult};

/// Errors raised by inbound sources and the bridge itself.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// I/O failure reading the source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The source reported a failure.
    #[error("source error: {0}")]
    Source(String),

    /// The source has no more data and never will.
    #[error("source disconnected")]
    Disconnected,
}

/// Something that produces inbound messages.
pub trait InboundSource: Send + 'static {
    /// Name used in logs and metrics.
    fn name(&self) -> &str;

    /// Return the items available now, starting after the last commit.
    ///
    /// Items returned but not committed are returned again by the next poll.
    fn poll(&mut self) -> Result<Vec<InboundMessage>, BridgeError>;

    /// Advance past the first `count` items of the last poll.
    fn commit(&mut self, count: usize);
}

/// Something that accepts inbound messages.
pub trait IngressTarget: Send + Sync + 'static {
    /// Deliver one message.
    fn deliver(&self, message: &InboundMessage) -> EmulatorResult<()>;
}

impl IngressTarget for Emulator {
    fn deliver(&self, message: &InboundMessage) -> EmulatorResult<()> {
        self.ingress_message(message).map(|_| ())
    }
}

/// Bridge tuning.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// How often the source is polled, in milliseconds.
    pub poll_interval_ms: u64,
    /// Capacity of the queue between poller and delivery.
    pub queue_capacity: usize,
    /// Extra attempts for messages whose port is unknown.
    pub unknown_port_retries: u32,
    /// Pause between attempts, in milliseconds.
    pub retry_backoff_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            poll_interval_ms: 500,
            queue_capacity: 256,
            unknown_port_retries: 3,
            retry_backoff_ms: 100,
        }
    }
}

impl BridgeConfig {
    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Retry backoff as a duration.
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Snapshot of bridge counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct BridgeStats {
    /// Items read from the source and queued.
    pub polled: u64,
    /// Items the target accepted.
    pub delivered: u64,
    /// Items the target rejected after all attempts.
    pub failed: u64,
    /// Retry attempts.
    pub retries: u64,
    /// Failed polls.
    pub poll_errors: u64,
}

#[derive(Debug, Default)]
struct Counters {
    polled: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    retries: AtomicU64,
    poll_errors: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> BridgeStats {
        BridgeStats {
            polled: self.polled.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            poll_errors: self.poll_errors.load(Ordering::Relaxed),
        }
    }
}

/// Running bridge.
pub struct BridgeHandle {
    name: String,
    stop_tx: Option<Sender<()>>,
    poller: Option<JoinHandle<()>>,
    delivery: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl BridgeHandle {
    /// Source name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current counters.
    pub fn stats(&self) -> BridgeStats {
        self.counters.snapshot()
    }

    /// Stop polling, deliver everything already queued, and join both
    /// threads. The source is polled one last time before the poller exits.
    pub fn shutdown(mut self) -> BridgeStats {
        self.stop_and_join();
        let stats = self.counters.snapshot();
        info!(source = %self.name, ?stats, "bridge stopped");
        stats
    }

    fn stop_and_join(&mut self) {
        // Dropping the sender wakes the poller.
        self.stop_tx.take();
        if let Some(handle) = self.poller.take() {
            if handle.join().is_err() {
                warn!(source = %self.name, "bridge poller panicked");
            }
        }
        if let Some(handle) = self.delivery.take() {
            if handle.join().is_err() {
                warn!(source = %self.name, "bridge delivery thread panicked");
            }
        }
    }
}

impl Drop for BridgeHandle {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

/// Spawns bridges.
pub struct Bridge;

impl Bridge {
    /// Start moving messages from `source` into `target`.
    pub fn spawn<S, T>(source: S, target: Arc<T>, config: BridgeConfig) -> Result<BridgeHandle, BridgeError>
    where
        S: InboundSource,
        T: IngressTarget,
    {
        let name = source.name().to_string();
        let (queue_tx, queue_rx) = crossbeam_channel::bounded(config.queue_capacity.max(1));
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let counters = Arc::new(Counters::default());

        let poller = {
            let counters = Arc::clone(&counters);
            let config = config.clone();
            thread::Builder::new()
                .name(format!("bridge-poll-{name}"))
                .spawn(move || poll_loop(source, queue_tx, stop_rx, &config, &counters))?
        };

        let delivery = {
            let counters = Arc::clone(&counters);
            let name = name.clone();
            thread::Builder::new()
                .name(format!("bridge-deliver-{name}"))
                .spawn(move || delivery_loop(&name, queue_rx, target.as_ref(), &config, &counters))?
        };

        info!(source = %name, "bridge started");
        Ok(BridgeHandle {
            name,
            stop_tx: Some(stop_tx),
            poller: Some(poller),
            delivery: Some(delivery),
            counters,
        })
    }
}

fn poll_loop<S: InboundSource>(
    mut source: S,
    queue: Sender<InboundMessage>,
    stop: Receiver<()>,
    config: &BridgeConfig,
    counters: &Counters,
) {
    loop {
        let stopping = match stop.recv_timeout(config.poll_interval()) {
            Err(RecvTimeoutError::Timeout) => false,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
        };

        if !poll_once(&mut source, &queue, counters) || stopping {
            break;
        }
    }
    debug!(source = source.name(), "bridge poller exiting");
}

/// Poll the source and queue its items. Returns `false` once the source or
/// the queue is gone.
fn poll_once<S: InboundSource>(source: &mut S, queue: &Sender<InboundMessage>, counters: &Counters) -> bool {
    let items = match source.poll() {
        Ok(items) => items,
        Err(BridgeError::Disconnected) => {
            info!(source = source.name(), "source disconnected");
            return false;
        }
        Err(e) => {
            counters.poll_errors.fetch_add(1, Ordering::Relaxed);
            warn!(source = source.name(), error = %e, "poll failed");
            return true;
        }
    };

    let mut accepted = 0;
    let mut open = true;
    for item in items {
        if queue.send(item).is_err() {
            open = false;
            break;
        }
        accepted += 1;
    }
    if accepted > 0 {
        source.commit(accepted);
        counters.polled.fetch_add(accepted as u64, Ordering::Relaxed);
        metrics::counter!(metric_defs::BRIDGE_POLLED.name, "source" => source.name().to_string())
            .increment(accepted as u64);
    }
    open
}

fn delivery_loop<T: IngressTarget + ?Sized>(
    name: &str,
    queue: Receiver<InboundMessage>,
    target: &T,
    config: &BridgeConfig,
    counters: &Counters,
) {
    // Ends once the poller has dropped its sender and the queue is empty.
    for message in queue.iter() {
        match deliver_with_retry(name, &message, target, config, counters) {
            Ok(()) => {
                counters.delivered.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(metric_defs::BRIDGE_DELIVERED.name, "source" => name.to_string())
                    .increment(1);
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(metric_defs::BRIDGE_FAILED.name, "source" => name.to_string())
                    .increment(1);
                warn!(source = name, port = %message.port, error = %e, "message rejected");
            }
        }
    }
    debug!(source = name, "bridge delivery exiting");
}

fn deliver_with_retry<T: IngressTarget + ?Sized>(
    name: &str,
    message: &InboundMessage,
    target: &T,
    config: &BridgeConfig,
    counters: &Counters,
) -> Result<(), EmulatorError> {
    let mut attempt = 0;
    loop {
        match target.deliver(message) {
            Err(e) if e.is_retryable() && attempt < config.unknown_port_retries => {
                attempt += 1;
                counters.retries.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(metric_defs::BRIDGE_RETRIES.name, "source" => name.to_string())
                    .increment(1);
                debug!(source = name, port = %message.port, attempt, error = %e, "retrying delivery");
                thread::sleep(config.retry_backoff());
            }
            other => return other,
        }
    }
}

/// In-process source fed through a channel.
pub struct ChannelSource {
    name: String,
    rx: Receiver<InboundMessage>,
    pending: VecDeque<InboundMessage>,
}

impl ChannelSource {
    /// Create a source and the sender that feeds it.
    pub fn new(name: impl Into<String>) -> (Sender<InboundMessage>, Self) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let source = ChannelSource {
            name: name.into(),
            rx,
            pending: VecDeque::new(),
        };
        (tx, source)
    }
}

impl InboundSource for ChannelSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn poll(&mut self) -> Result<Vec<InboundMessage>, BridgeError> {
        self.pending.extend(self.rx.try_iter());
        if self.pending.is_empty() {
            match self.rx.try_recv() {
                Ok(message) => self.pending.push_back(message),
                Err(TryRecvError::Disconnected) => return Err(BridgeError::Disconnected),
                Err(TryRecvError::Empty) => {}
            }
        }
        Ok(self.pending.iter().cloned().collect())
    }

    fn commit(&mut self, count: usize) {
        let count = count.min(self.pending.len());
        self.pending.drain(..count);
    }
}
