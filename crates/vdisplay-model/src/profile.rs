//! Display profiles.
//!
//! A profile describes a display model independent of the port it is
//! attached to. The built-in library covers the common POS pole displays;
//! configuration files can add more.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vdisplay_engine::{ConnectionKind, EndpointConfig};
use vdisplay_protocol::Theme;

use crate::error::{ModelError, ModelResult};

// ============================================================================
// Profile
// ============================================================================

/// A display model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayProfile {
    /// Profile name, e.g. `classic-20x2`.
    pub name: String,
    /// Number of lines (1-3).
    pub lines: usize,
    /// Characters per line.
    pub length: usize,
    /// Default theme.
    #[serde(default)]
    pub theme: Theme,
    /// Baud rate.
    #[serde(default = "default_baudrate")]
    pub baudrate: u32,
    /// Attachment kind.
    #[serde(default)]
    pub connection: ConnectionKind,
    /// Padding character.
    #[serde(default = "default_fill")]
    pub fill: char,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_baudrate() -> u32 {
    9600
}

fn default_fill() -> char {
    ' '
}

impl DisplayProfile {
    /// Create a serial profile with default theme and baud rate.
    pub fn new(name: impl Into<String>, lines: usize, length: usize) -> Self {
        DisplayProfile {
            name: name.into(),
            lines,
            length,
            theme: Theme::default(),
            baudrate: default_baudrate(),
            connection: ConnectionKind::Serial,
            fill: default_fill(),
            description: None,
        }
    }

    fn with(mut self, theme: Theme, connection: ConnectionKind, description: &str) -> Self {
        self.theme = theme;
        self.connection = connection;
        self.description = Some(description.to_string());
        self
    }

    /// Endpoint configuration for this profile on `port`.
    pub fn endpoint_config(&self, port: impl Into<String>) -> EndpointConfig {
        EndpointConfig::new(port, self.lines, self.length)
            .with_theme(self.theme)
            .with_baud_rate(self.baudrate)
            .with_connection(self.connection)
            .with_fill(self.fill)
    }

    /// Check the profile's shape.
    pub fn validate(&self) -> ModelResult<()> {
        let invalid = |reason: String| ModelError::InvalidProfile {
            name: self.name.clone(),
            reason,
        };
        if self.name.trim().is_empty() {
            return Err(invalid("name is empty".to_string()));
        }
        // Reuse the endpoint checks with a placeholder port.
        self.endpoint_config("PROFILE").validate().map_err(invalid)
    }
}

/// Built-in profiles.
pub fn builtin_profiles() -> Vec<DisplayProfile> {
    vec![
        DisplayProfile::new("classic-20x2", 2, 20).with(
            Theme::Green,
            ConnectionKind::Serial,
            "Classic RS-232 pole display, 2x20 green LCD",
        ),
        DisplayProfile::new("usb-20x2", 2, 20).with(
            Theme::Blue,
            ConnectionKind::Usb,
            "Native USB customer display, 2x20 blue LCD",
        ),
        DisplayProfile::new("usb-serial-20x2", 2, 20).with(
            Theme::Green,
            ConnectionKind::UsbSerial,
            "Serial display behind an FTDI/CH340 USB adapter",
        ),
        DisplayProfile::new("compact-16x1", 1, 16).with(
            Theme::Red,
            ConnectionKind::Serial,
            "Single-line 16 character LED display",
        ),
        DisplayProfile::new("tall-20x3", 3, 20).with(
            Theme::Cyan,
            ConnectionKind::Serial,
            "Three-line 20 character VFD",
        ),
    ]
}

// ============================================================================
// Library
// ============================================================================

/// Profiles indexed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileLibrary {
    profiles: BTreeMap<String, DisplayProfile>,
}

impl ProfileLibrary {
    /// An empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in profiles.
    pub fn builtin() -> Self {
        let mut library = Self::new();
        for profile in builtin_profiles() {
            library.profiles.insert(profile.name.clone(), profile);
        }
        library
    }

    /// Add a profile. Names must be unique.
    pub fn insert(&mut self, profile: DisplayProfile) -> ModelResult<()> {
        profile.validate()?;
        if self.profiles.contains_key(&profile.name) {
            return Err(ModelError::DuplicateProfile(profile.name));
        }
        self.profiles.insert(profile.name.clone(), profile);
        Ok(())
    }

    /// Add or replace a profile.
    pub fn upsert(&mut self, profile: DisplayProfile) -> ModelResult<()> {
        profile.validate()?;
        self.profiles.insert(profile.name.clone(), profile);
        Ok(())
    }

    /// Look up a profile.
    pub fn get(&self, name: &str) -> ModelResult<&DisplayProfile> {
        self.profiles
            .get(name)
            .ok_or_else(|| ModelError::UnknownProfile(name.to_string()))
    }

    /// Profiles sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &DisplayProfile> {
        self.profiles.values()
    }

    /// Number of profiles.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether the library is empty.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
