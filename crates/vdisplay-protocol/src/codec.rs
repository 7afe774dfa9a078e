//! Line-based codec for the ingress wire format.
//!
//! External senders append one message per line to a shared channel:
//!
//! ```text
//! COM1|Hello World
//! USB0|\x1B[2HTotal 4.20
//! ```
//!
//! The line is split on the first `|`. The port is matched case-sensitively
//! and the message is passed verbatim to the payload decoder. Lines end with
//! `\n`; a `\r` right before it is part of the terminator.

use bytes::BytesMut;

use crate::error::WireError;

/// Maximum length of one wire line, terminator excluded.
pub const MAX_LINE_LENGTH: usize = 4096;

/// Separator between port and message.
pub const SEPARATOR: char = '|';

/// One decoded wire line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressLine {
    /// Target port name.
    pub port: String,
    /// Raw payload for the display.
    pub message: String,
}

impl IngressLine {
    /// Parse a single line (without its terminator).
    pub fn parse(line: &str) -> Result<IngressLine, WireError> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let (port, message) = line
            .split_once(SEPARATOR)
            .ok_or_else(|| WireError::MissingSeparator(line.to_string()))?;
        if port.is_empty() {
            return Err(WireError::EmptyPort(line.to_string()));
        }
        Ok(IngressLine {
            port: port.to_string(),
            message: message.to_string(),
        })
    }

    /// Encode as a wire line, including the `\n` terminator.
    pub fn encode(port: &str, message: &str) -> Result<String, WireError> {
        if port.is_empty() || port.contains(SEPARATOR) || port.contains(['\r', '\n']) {
            return Err(WireError::Unencodable(port.to_string()));
        }
        if message.contains('\n') || message.ends_with('\r') {
            return Err(WireError::Unencodable(message.to_string()));
        }
        Ok(format!("{port}{SEPARATOR}{message}\n"))
    }
}

/// Accumulates bytes read from a channel and yields complete lines.
///
/// Partial trailing lines stay buffered until their terminator arrives, so
/// a reader can commit its position as `bytes_read - buffered_len()`.
#[derive(Debug, Default)]
pub struct IngressCodec {
    buffer: BytesMut,
}

impl IngressCodec {
    /// Create a new codec.
    pub fn new() -> Self {
        IngressCodec {
            buffer: BytesMut::with_capacity(MAX_LINE_LENGTH),
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next complete line.
    ///
    /// Returns `None` when no complete line is buffered. Blank lines are
    /// skipped. A malformed line is consumed and reported as an error so the
    /// caller can move past it.
    pub fn decode_line(&mut self) -> Option<Result<IngressLine, WireError>> {
        loop {
            let end = self.buffer.iter().position(|&b| b == b'\n')?;
            let line = self.buffer.split_to(end + 1);
            let line = &line[..end];

            if line.is_empty() || line == b"\r" {
                continue;
            }
            if line.len() > MAX_LINE_LENGTH {
                return Some(Err(WireError::LineTooLong {
                    max: MAX_LINE_LENGTH,
                    actual: line.len(),
                }));
            }
            return Some(match std::str::from_utf8(line) {
                Ok(text) => IngressLine::parse(text),
                Err(_) => Err(WireError::InvalidUtf8),
            });
        }
    }

    /// Get the number of buffered bytes not yet part of a complete line.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}
