//! Runner for the virtual display emulator.
//!
//! Wires the engine to the outside world:
//!
//! - [`FileInbox`]: tails the shared message file and feeds the bridge
//! - [`send`]: appends a `PORT|MESSAGE` line, as an external sender would
//! - [`ScenarioRunner`]: executes YAML scenarios and reports the results
//! - [`Service`]: emulator plus inbox bridge, as run by `vdisplay run`

mod error;
pub mod escape;
pub mod inbox;
pub mod scenario;
pub mod service;

pub use error::{RunnerError, RunnerResult};
pub use escape::unescape;
pub use inbox::{send, FileInbox};
pub use scenario::{ScenarioReport, ScenarioRunner, StepReport, DEFAULT_PROFILE};
pub use service::{InboxStart, MonitorReport, Service, RECENT_MESSAGES};
