//! YAML model for the virtual display emulator.
//!
//! - [`DisplayProfile`] / [`ProfileLibrary`]: display models, built in and
//!   user defined
//! - [`EngineFile`]: emulator, bridge and inbox settings plus the displays to
//!   create at startup
//! - [`Scenario`]: scripted connect/send/disconnect steps with expectations

mod config;
mod error;
mod profile;
mod scenario;

pub use config::{default_inbox_path, DisplaySpec, EngineFile, INBOX_FILE_NAME};
pub use error::{ModelError, ModelResult};
pub use profile::{builtin_profiles, DisplayProfile, ProfileLibrary};
pub use scenario::{Expectation, Outcome, Scenario, ScenarioStep, StepAction, SuccessCriteria};
