//! Endpoint registry.
//!
//! Endpoints live in an arena of generation-counted slots. A port index maps
//! names to slots and a free list recycles removed slots. The registry lock
//! is held only for lookup, insert and remove; each endpoint carries its own
//! locks for state and for its rng/fault controls.

use parking_lot::{Mutex, MutexGuard, RwLock};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::error;

use crate::display::{ConnectionKind, EndpointConfig, EndpointState};
use crate::error::{EmulatorError, EmulatorResult};
use crate::fault::FaultPlan;
use crate::history::{MessageLog, DEFAULT_HISTORY_LEN};
use crate::latency::LatencyRange;
use crate::stats::Statistics;

/// Stable identifier of an endpoint: arena slot plus generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointId {
    index: u32,
    generation: u32,
}

impl EndpointId {
    /// Arena slot.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Slot generation.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// State, statistics and history, mutated together under one lock.
#[derive(Debug)]
pub struct Guarded {
    /// Display state.
    pub state: EndpointState,
    /// Endpoint statistics.
    pub stats: Statistics,
    /// Recent messages.
    pub history: MessageLog,
}

/// Per-endpoint simulation controls.
#[derive(Debug)]
pub struct Control {
    /// Rng for latency and fault rolls.
    pub rng: ChaCha8Rng,
    /// Active fault plan.
    pub fault: Option<FaultPlan>,
    /// Latency range overriding the connection-kind default.
    pub latency: Option<LatencyRange>,
}

/// One registered endpoint.
#[derive(Debug)]
pub struct EndpointEntry {
    id: EndpointId,
    port: String,
    connection: ConnectionKind,
    baud_rate: u32,
    guarded: Mutex<Guarded>,
    control: Mutex<Control>,
    removed: AtomicBool,
}

impl EndpointEntry {
    /// Lock state and statistics.
    pub fn lock(&self) -> MutexGuard<'_, Guarded> {
        self.guarded.lock()
    }

    /// Lock the simulation controls.
    pub fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock()
    }

    /// Whether the endpoint has been removed from the registry.
    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }
}

/// Shared handle to a registered endpoint.
///
/// A handle stays usable after removal; [`EndpointHandle::is_removed`] tells
/// the holder the endpoint is gone.
#[derive(Debug, Clone)]
pub struct EndpointHandle {
    entry: Arc<EndpointEntry>,
}

impl EndpointHandle {
    /// Endpoint identifier.
    pub fn id(&self) -> EndpointId {
        self.entry.id
    }

    /// Port name.
    pub fn port(&self) -> &str {
        &self.entry.port
    }

    /// Connection kind.
    pub fn connection(&self) -> ConnectionKind {
        self.entry.connection
    }

    /// Configured baud rate.
    pub fn baud_rate(&self) -> u32 {
        self.entry.baud_rate
    }

    /// Whether the endpoint has been removed.
    pub fn is_removed(&self) -> bool {
        self.entry.is_removed()
    }

    /// The underlying entry.
    pub fn entry(&self) -> &EndpointEntry {
        &self.entry
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entry: Option<Arc<EndpointEntry>>,
}

#[derive(Debug, Default)]
struct Inner {
    slots: Vec<Slot>,
    by_port: HashMap<String, usize>,
    free: Vec<usize>,
}

impl Inner {
    fn lookup(&self, port: &str) -> Option<Result<&Arc<EndpointEntry>, String>> {
        let &index = self.by_port.get(port)?;
        Some(match self.slots.get(index).and_then(|s| s.entry.as_ref()) {
            Some(entry) if entry.port == port => Ok(entry),
            Some(entry) => Err(format!(
                "port index for '{port}' points at slot {index} holding '{}'",
                entry.port
            )),
            None => Err(format!("port index for '{port}' points at empty slot {index}")),
        })
    }
}

/// Arena of endpoints keyed by port name.
#[derive(Debug)]
pub struct Registry {
    inner: RwLock<Inner>,
    history_len: usize,
}

impl Default for Registry {
    fn default() -> Self {
        Registry::with_history_len(DEFAULT_HISTORY_LEN)
    }
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry whose endpoints keep `history_len` messages.
    pub fn with_history_len(history_len: usize) -> Self {
        Registry {
            inner: RwLock::new(Inner::default()),
            history_len,
        }
    }

    /// Register an endpoint. Content starts blank and the status connected.
    pub fn create(&self, config: EndpointConfig, rng: ChaCha8Rng) -> EmulatorResult<EndpointHandle> {
        config.validate().map_err(EmulatorError::InvalidConfig)?;

        let mut inner = self.inner.write();
        if inner.by_port.contains_key(&config.port) {
            return Err(EmulatorError::DuplicatePort(config.port));
        }

        let index = match inner.free.pop() {
            Some(index) => index,
            None => {
                inner.slots.push(Slot::default());
                inner.slots.len() - 1
            }
        };
        let slot_index = u32::try_from(index)
            .map_err(|_| EmulatorError::Internal("endpoint arena exhausted".to_string()))?;
        let generation = inner.slots[index].generation;

        let port = config.port.clone();
        let entry = Arc::new(EndpointEntry {
            id: EndpointId { index: slot_index, generation },
            port: port.clone(),
            connection: config.connection,
            baud_rate: config.baud_rate,
            guarded: Mutex::new(Guarded {
                state: EndpointState::new(config),
                stats: Statistics::default(),
                history: MessageLog::new(self.history_len),
            }),
            control: Mutex::new(Control { rng, fault: None, latency: None }),
            removed: AtomicBool::new(false),
        });

        inner.slots[index].entry = Some(Arc::clone(&entry));
        inner.by_port.insert(port, index);
        Ok(EndpointHandle { entry })
    }

    /// Remove an endpoint. Outstanding handles observe the removal.
    pub fn remove(&self, port: &str) -> EmulatorResult<EndpointHandle> {
        let mut inner = self.inner.write();
        let index = inner
            .by_port
            .remove(port)
            .ok_or_else(|| EmulatorError::NotFound(port.to_string()))?;

        let slot = inner.slots.get_mut(index).ok_or_else(|| {
            EmulatorError::Internal(format!("port index for '{port}' points past the arena"))
        })?;
        let entry = slot.entry.take().ok_or_else(|| {
            EmulatorError::Internal(format!("port index for '{port}' points at empty slot {index}"))
        })?;
        slot.generation = slot.generation.wrapping_add(1);
        inner.free.push(index);

        entry.removed.store(true, Ordering::Release);
        Ok(EndpointHandle { entry })
    }

    /// Look up an endpoint, reporting a corrupt index as an error.
    pub fn resolve(&self, port: &str) -> EmulatorResult<EndpointHandle> {
        let inner = self.inner.read();
        match inner.lookup(port) {
            None => Err(EmulatorError::UnknownPort(port.to_string())),
            Some(Ok(entry)) => Ok(EndpointHandle { entry: Arc::clone(entry) }),
            Some(Err(msg)) => Err(EmulatorError::Internal(msg)),
        }
    }

    /// Look up an endpoint by port name.
    pub fn get(&self, port: &str) -> Option<EndpointHandle> {
        match self.resolve(port) {
            Ok(handle) => Some(handle),
            Err(EmulatorError::Internal(msg)) => {
                error!(port, "registry corruption: {}", msg);
                None
            }
            Err(_) => None,
        }
    }

    /// Look up an endpoint by id; stale ids return `None`.
    pub fn get_by_id(&self, id: EndpointId) -> Option<EndpointHandle> {
        let inner = self.inner.read();
        let slot = inner.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_ref().map(|entry| EndpointHandle { entry: Arc::clone(entry) })
    }

    /// All handles, sorted by port name.
    pub fn handles(&self) -> Vec<EndpointHandle> {
        let inner = self.inner.read();
        let mut handles: Vec<EndpointHandle> = inner
            .slots
            .iter()
            .filter_map(|s| s.entry.as_ref())
            .map(|entry| EndpointHandle { entry: Arc::clone(entry) })
            .collect();
        handles.sort_by(|a, b| a.port().cmp(b.port()));
        handles
    }

    /// Registered port names, sorted.
    pub fn ports(&self) -> Vec<String> {
        let inner = self.inner.read();
        let mut ports: Vec<String> = inner.by_port.keys().cloned().collect();
        ports.sort();
        ports
    }

    /// Number of registered endpoints.
    pub fn len(&self) -> usize {
        self.inner.read().by_port.len()
    }

    /// Whether no endpoints are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn corrupt_index(&self, port: &str, index: usize) {
        self.inner.write().by_port.insert(port.to_string(), index);
    }
}
