//! Virtual display model.
//!
//! An endpoint is described by an [`EndpointConfig`] and carries mutable
//! [`EndpointState`]: connection status and the [`DisplayContent`] line
//! buffer. The line buffer always holds exactly `line_count` lines of exactly
//! `line_length` characters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use vdisplay_protocol::{truncate, LineLimits, Theme};

/// Maximum number of lines on a display.
pub const MAX_LINES: usize = 3;

/// Maximum characters per line.
pub const MAX_LINE_LENGTH: usize = 256;

/// Default baud rate for serial endpoints.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

// ============================================================================
// Connection
// ============================================================================

/// How an endpoint is attached; selects the simulated latency class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    /// RS-232 style serial port.
    #[default]
    Serial,
    /// Native USB HID display.
    Usb,
    /// USB-to-serial bridge (FTDI, CH340, ...).
    UsbSerial,
    /// Network-attached display.
    Network,
}

impl ConnectionKind {
    /// Label used for logging and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionKind::Serial => "serial",
            ConnectionKind::Usb => "usb",
            ConnectionKind::UsbSerial => "usb_serial",
            ConnectionKind::Network => "network",
        }
    }
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection status of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Not accepting commands.
    Disconnected,
    /// Accepting commands.
    Connected,
    /// Faulted; not accepting commands.
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Error => write!(f, "error"),
        }
    }
}

// ============================================================================
// Endpoint Configuration
// ============================================================================

/// Static configuration of one display endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Port name, unique and case-sensitive (e.g. `COM1`, `USB0`).
    pub port: String,
    /// Number of lines (1-3).
    pub line_count: usize,
    /// Characters per line.
    pub line_length: usize,
    /// Display theme.
    #[serde(default)]
    pub theme: Theme,
    /// Simulated baud rate.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Attachment kind.
    #[serde(default)]
    pub connection: ConnectionKind,
    /// Character used to pad lines.
    #[serde(default = "default_fill")]
    pub fill: char,
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_fill() -> char {
    ' '
}

impl EndpointConfig {
    /// Create a serial endpoint config with default theme, baud rate and fill.
    pub fn new(port: impl Into<String>, line_count: usize, line_length: usize) -> Self {
        EndpointConfig {
            port: port.into(),
            line_count,
            line_length,
            theme: Theme::default(),
            baud_rate: DEFAULT_BAUD_RATE,
            connection: ConnectionKind::default(),
            fill: default_fill(),
        }
    }

    /// Set the theme.
    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    /// Set the baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the connection kind.
    pub fn with_connection(mut self, connection: ConnectionKind) -> Self {
        self.connection = connection;
        self
    }

    /// Set the fill character.
    pub fn with_fill(mut self, fill: char) -> Self {
        self.fill = fill;
        self
    }

    /// Parse limits for this display.
    pub fn limits(&self) -> LineLimits {
        LineLimits::new(self.line_count, self.line_length)
    }

    /// Check the configuration, returning a description of the first problem.
    pub fn validate(&self) -> Result<(), String> {
        if self.port.is_empty() {
            return Err("port name is empty".to_string());
        }
        if self.port.contains('|') || self.port.chars().any(char::is_whitespace) {
            return Err(format!("port name '{}' contains '|' or whitespace", self.port));
        }
        if !(1..=MAX_LINES).contains(&self.line_count) {
            return Err(format!("line count {} is outside 1..={}", self.line_count, MAX_LINES));
        }
        if !(1..=MAX_LINE_LENGTH).contains(&self.line_length) {
            return Err(format!(
                "line length {} is outside 1..={}",
                self.line_length, MAX_LINE_LENGTH
            ));
        }
        if self.baud_rate == 0 {
            return Err("baud rate must be greater than zero".to_string());
        }
        if self.fill.is_control() {
            return Err("fill character must be printable".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Content
// ============================================================================

/// Pad or truncate `text` to exactly `length` characters.
pub fn fit_line(text: &str, length: usize, fill: char) -> String {
    let mut line = truncate(text, length);
    let count = line.chars().count();
    line.extend(std::iter::repeat(fill).take(length - count));
    line
}

/// Current rendered state of one display.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayContent {
    lines: Vec<String>,
    last_update: Option<DateTime<Utc>>,
    last_raw: Option<String>,
}

impl DisplayContent {
    /// Blank content for a display.
    pub fn blank(config: &EndpointConfig) -> Self {
        DisplayContent {
            lines: vec![fit_line("", config.line_length, config.fill); config.line_count],
            last_update: None,
            last_raw: None,
        }
    }

    /// The display lines, each exactly `line_length` characters.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// When the content last changed.
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    /// The last raw payload applied.
    pub fn last_raw(&self) -> Option<&str> {
        self.last_raw.as_deref()
    }

    pub(crate) fn set_line(&mut self, index: usize, text: &str, config: &EndpointConfig) -> bool {
        match self.lines.get_mut(index) {
            Some(line) => {
                *line = fit_line(text, config.line_length, config.fill);
                true
            }
            None => false,
        }
    }

    pub(crate) fn clear(&mut self, config: &EndpointConfig) {
        let blank = fit_line("", config.line_length, config.fill);
        for line in &mut self.lines {
            line.clone_from(&blank);
        }
    }

    pub(crate) fn touch(&mut self, raw: &str, at: DateTime<Utc>) {
        self.last_update = Some(at);
        self.last_raw = Some(raw.to_string());
    }
}

/// Point-in-time copy of a display's content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentSnapshot {
    /// Display lines.
    pub lines: Vec<String>,
    /// Theme at snapshot time.
    pub theme: Theme,
    /// Connection status at snapshot time.
    pub status: ConnectionStatus,
    /// When the content last changed.
    pub last_update: Option<DateTime<Utc>>,
    /// The last raw payload applied.
    pub last_raw: Option<String>,
}

/// Mutable state of one endpoint.
#[derive(Debug, Clone)]
pub struct EndpointState {
    config: EndpointConfig,
    status: ConnectionStatus,
    content: DisplayContent,
}

impl EndpointState {
    /// Fresh state: blank content, connected.
    pub fn new(config: EndpointConfig) -> Self {
        let content = DisplayContent::blank(&config);
        EndpointState {
            config,
            status: ConnectionStatus::Connected,
            content,
        }
    }

    /// Endpoint configuration.
    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// Connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Display content.
    pub fn content(&self) -> &DisplayContent {
        &self.content
    }

    /// Change the connection status.
    pub fn set_status(&mut self, status: ConnectionStatus) {
        self.status = status;
    }

    /// Copy out the content.
    pub fn snapshot(&self) -> ContentSnapshot {
        ContentSnapshot {
            lines: self.content.lines.clone(),
            theme: self.config.theme,
            status: self.status,
            last_update: self.content.last_update,
            last_raw: self.content.last_raw.clone(),
        }
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut EndpointConfig, &mut DisplayContent) {
        (&mut self.config, &mut self.content)
    }
}
