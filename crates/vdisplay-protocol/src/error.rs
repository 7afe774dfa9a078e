//! Error types for the display protocol.

use thiserror::Error;

/// Errors produced while decoding a display payload into a [`Command`](crate::Command).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The payload was zero-length.
    #[error("empty payload")]
    Empty,

    /// An explicit line index was outside the display.
    #[error("line {row} is outside the display (1..={line_count})")]
    InvalidIndex {
        /// The 1-based row requested by the sender.
        row: usize,
        /// Number of lines on the target display.
        line_count: usize,
    },

    /// A control sequence could not be recognized.
    #[error("malformed control sequence: {0}")]
    Malformed(String),
}

/// Errors produced by the `PORT|MESSAGE` ingress line codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// The line has no `|` separator.
    #[error("missing '|' separator in line {0:?}")]
    MissingSeparator(String),

    /// The port part of the line is empty.
    #[error("empty port name in line {0:?}")]
    EmptyPort(String),

    /// The line is not valid UTF-8.
    #[error("line is not valid UTF-8")]
    InvalidUtf8,

    /// A port or message cannot be written as a single wire line.
    #[error("cannot encode {0:?} as a wire field")]
    Unencodable(String),

    /// Line exceeds the codec limit.
    #[error("line too long: max {max} bytes, got {actual}")]
    LineTooLong { max: usize, actual: usize },
}

/// Result type alias for payload decoding.
pub type ParseResult<T> = Result<T, ParseError>;
