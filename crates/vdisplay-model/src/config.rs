//! Engine configuration file.
//!
//! ```yaml
//! seed: 42
//! time_scale: 1.0
//! latency:
//!   network: { min_ms: 20, max_ms: 80 }
//! bridge:
//!   poll_interval_ms: 500
//! inbox: /tmp/virtualdisplay_messages.txt
//! profiles:
//!   - { name: kiosk-24x2, lines: 2, length: 24, theme: white }
//! displays:
//!   - { port: COM1, profile: classic-20x2 }
//!   - { port: USB0, profile: kiosk-24x2, theme: blue }
//! ```
//!
//! Every section is optional. Profiles declared in the file are added to the
//! built-in library and may replace a built-in profile of the same name.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use vdisplay_engine::{BridgeConfig, ConnectionKind, EmulatorConfig, EndpointConfig, LatencyPolicy};
use vdisplay_protocol::Theme;

use crate::error::{read_file, ModelError, ModelResult};
use crate::profile::{DisplayProfile, ProfileLibrary};

/// File name of the shared message inbox.
pub const INBOX_FILE_NAME: &str = "virtualdisplay_messages.txt";

/// Default inbox location: the inbox file in the system temp directory.
pub fn default_inbox_path() -> PathBuf {
    std::env::temp_dir().join(INBOX_FILE_NAME)
}

/// A display to create at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaySpec {
    /// Port name.
    pub port: String,
    /// Profile name.
    pub profile: String,
    /// Theme override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    /// Connection kind override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionKind>,
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineFile {
    /// Rng seed.
    pub seed: u64,
    /// Latency time scale.
    pub time_scale: f64,
    /// Latency per connection kind.
    pub latency: LatencyPolicy,
    /// Messages kept in each display's history.
    pub history_len: usize,
    /// Bridge tuning.
    pub bridge: BridgeConfig,
    /// Path of the file inbox.
    pub inbox: PathBuf,
    /// Extra profiles.
    pub profiles: Vec<DisplayProfile>,
    /// Displays to create.
    pub displays: Vec<DisplaySpec>,
}

impl Default for EngineFile {
    fn default() -> Self {
        let emulator = EmulatorConfig::default();
        EngineFile {
            seed: emulator.seed,
            time_scale: emulator.time_scale,
            latency: emulator.latency,
            history_len: emulator.history_len,
            bridge: BridgeConfig::default(),
            inbox: default_inbox_path(),
            profiles: Vec::new(),
            displays: vec![DisplaySpec {
                port: "COM1".to_string(),
                profile: "classic-20x2".to_string(),
                theme: None,
                connection: None,
            }],
        }
    }
}

impl EngineFile {
    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str) -> ModelResult<Self> {
        let file: EngineFile = serde_yaml::from_str(yaml)?;
        file.validate()?;
        Ok(file)
    }

    /// Load and validate a YAML file.
    pub fn load(path: &Path) -> ModelResult<Self> {
        debug!(path = %path.display(), "loading engine config");
        Self::from_yaml_str(&read_file(path)?)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> ModelResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Emulator section.
    pub fn emulator_config(&self) -> EmulatorConfig {
        EmulatorConfig {
            seed: self.seed,
            time_scale: self.time_scale,
            latency: self.latency,
            history_len: self.history_len,
        }
    }

    /// Built-in profiles plus the ones declared in the file.
    pub fn profile_library(&self) -> ModelResult<ProfileLibrary> {
        let mut library = ProfileLibrary::builtin();
        let mut seen = HashSet::new();
        for profile in &self.profiles {
            if !seen.insert(profile.name.as_str()) {
                return Err(ModelError::DuplicateProfile(profile.name.clone()));
            }
            library.upsert(profile.clone())?;
        }
        Ok(library)
    }

    /// Endpoint configurations for the declared displays.
    pub fn endpoint_configs(&self) -> ModelResult<Vec<EndpointConfig>> {
        let library = self.profile_library()?;
        let mut ports = HashSet::new();
        self.displays
            .iter()
            .map(|display| {
                if !ports.insert(display.port.as_str()) {
                    return Err(ModelError::DuplicatePort(display.port.clone()));
                }
                let mut config = library.get(&display.profile)?.endpoint_config(&display.port);
                if let Some(theme) = display.theme {
                    config.theme = theme;
                }
                if let Some(connection) = display.connection {
                    config.connection = connection;
                }
                config.validate().map_err(|reason| {
                    ModelError::Config(format!("display '{}': {reason}", display.port))
                })?;
                Ok(config)
            })
            .collect()
    }

    /// Check every section.
    pub fn validate(&self) -> ModelResult<()> {
        self.emulator_config().validate().map_err(ModelError::Config)?;
        if self.bridge.queue_capacity == 0 {
            return Err(ModelError::Config("bridge queue capacity must be at least 1".to_string()));
        }
        self.endpoint_configs()?;
        Ok(())
    }
}
