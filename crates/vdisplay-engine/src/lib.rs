//! Virtual Display Emulation Engine
//!
//! Models point-of-sale customer displays attached over serial, USB or
//! network links. Inbound payloads are decoded with [`vdisplay_protocol`],
//! applied to per-endpoint line buffers, and accounted for in statistics.
//!
//! # Architecture
//!
//! - [`Registry`]: arena of endpoints with stable generation-counted ids
//! - [`Emulator`]: ingress pipeline with simulated latency and fault injection
//! - [`handler::apply`]: applies a decoded command to endpoint state
//! - [`Bridge`]: moves messages from an [`InboundSource`] into the emulator
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use vdisplay_engine::{Emulator, EmulatorConfig, EndpointConfig};
//!
//! let emulator = Emulator::new(EmulatorConfig::instant(1)).unwrap();
//! emulator.create_endpoint(EndpointConfig::new("COM1", 2, 20)).unwrap();
//!
//! let ack = emulator.ingress("COM1", "\x1B[2HTotal: 12.50", Utc::now()).unwrap();
//! assert_eq!(ack.snapshot.lines[1].trim_end(), "Total: 12.50");
//! ```

pub mod bridge;
pub mod display;
pub mod emulator;
pub mod error;
pub mod fault;
pub mod handler;
pub mod history;
pub mod latency;
pub mod registry;
pub mod stats;

pub use bridge::{Bridge, BridgeConfig, BridgeError, BridgeHandle, BridgeStats, ChannelSource, InboundSource, IngressTarget};
pub use display::{
    ConnectionKind, ConnectionStatus, ContentSnapshot, DisplayContent, EndpointConfig, EndpointState, MAX_LINES,
    MAX_LINE_LENGTH,
};
pub use emulator::{Emulator, EmulatorConfig, EndpointSnapshot, InboundMessage};
pub use error::{EmulatorError, EmulatorResult, FailureCause, InjectedFault, ProtocolError};
pub use fault::{FaultMode, FaultPlan};
pub use handler::Ack;
pub use history::{MessageLog, MessageRecord, MessageStatus, DEFAULT_HISTORY_LEN};
pub use latency::{LatencyPolicy, LatencyRange, MAX_LATENCY_MS};
pub use registry::{EndpointHandle, EndpointId, Registry};
pub use stats::{FailureCounts, GlobalStatistics, LatencyStats, Statistics, StatsSummary};
