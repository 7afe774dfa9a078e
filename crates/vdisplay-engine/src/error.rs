//! Error types for the emulation engine.

use thiserror::Error;
use vdisplay_protocol::ParseError;

use crate::display::ConnectionStatus;

/// Errors produced when applying a command to a display.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The theme tag does not name a supported theme.
    #[error("unsupported theme '{0}'")]
    UnsupportedTheme(String),

    /// The line index does not exist on this display.
    #[error("line {index} out of range for {line_count}-line display")]
    LineOutOfRange {
        /// Zero-based line index.
        index: usize,
        /// Lines on the display.
        line_count: usize,
    },

    /// The endpoint is not connected.
    #[error("endpoint is {0}, not connected")]
    EndpointDisconnected(ConnectionStatus),
}

/// A fault produced on purpose by an endpoint's fault plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InjectedFault {
    /// The message was dropped before reaching the display.
    #[error("message dropped")]
    Dropped,

    /// The transport reported an error.
    #[error("transport error")]
    Error,
}

/// Why a message delivered to a known endpoint failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureCause {
    /// The payload could not be decoded.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// The decoded command could not be applied.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The fault plan failed the message.
    #[error("injected fault: {0}")]
    Injected(InjectedFault),
}

impl FailureCause {
    /// Label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            FailureCause::Parse(_) => "parse",
            FailureCause::Protocol(_) => "protocol",
            FailureCause::Injected(_) => "injected",
        }
    }
}

/// Errors returned by the emulator and its endpoint registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmulatorError {
    /// No endpoint is registered under this port name.
    #[error("unknown port '{0}'")]
    UnknownPort(String),

    /// The message reached the endpoint but failed.
    #[error("protocol failure on '{port}': {cause}")]
    ProtocolFailure {
        /// Target port.
        port: String,
        /// Offending raw payload.
        raw: String,
        /// What went wrong.
        cause: FailureCause,
    },

    /// An endpoint with this port name already exists.
    #[error("port '{0}' already exists")]
    DuplicatePort(String),

    /// No endpoint to remove or update under this port name.
    #[error("port '{0}' not found")]
    NotFound(String),

    /// The endpoint configuration is invalid.
    #[error("invalid endpoint configuration: {0}")]
    InvalidConfig(String),

    /// An internal invariant was violated.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EmulatorError {
    /// The failure cause, for protocol failures.
    pub fn cause(&self) -> Option<&FailureCause> {
        match self {
            EmulatorError::ProtocolFailure { cause, .. } => Some(cause),
            _ => None,
        }
    }

    /// Whether a delivery may succeed if tried again later, e.g. while the
    /// port is still being created.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EmulatorError::UnknownPort(_) | EmulatorError::Internal(_))
    }
}

/// Result type alias for emulator operations.
pub type EmulatorResult<T> = Result<T, EmulatorError>;
