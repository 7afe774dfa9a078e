//! Test scenarios.
//!
//! A scenario is an ordered list of steps run against an emulator:
//!
//! ```yaml
//! name: receipt
//! steps:
//!   - { action: connect, port: COM1, profile: classic-20x2 }
//!   - { action: send, port: COM1, data: "Hello World" }
//!   - action: send
//!     port: COM1
//!     data: "\e[3Hnope"
//!     expect: { outcome: error }
//!   - { action: fault, port: COM1, fault: { mode: drop, probability: 0.5 } }
//!   - { action: disconnect, port: COM1 }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;
use vdisplay_engine::FaultPlan;

use crate::error::{read_file, ModelError, ModelResult};

/// What a step does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepAction {
    /// Create the endpoint, or reconnect it if it exists.
    Connect,
    /// Send `data` to the endpoint.
    Send,
    /// Mark the endpoint disconnected.
    Disconnect,
    /// Install the step's fault plan, or clear it when the step has none.
    Fault,
}

/// Expected outcome of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The step succeeds.
    #[default]
    Ok,
    /// The step fails.
    Error,
}

/// Step expectations.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Expectation {
    /// Whether the step should succeed.
    #[serde(default)]
    pub outcome: Outcome,
    /// Display lines after the step, compared with trailing fill trimmed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<Vec<String>>,
}

/// One scenario step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioStep {
    /// Action to perform.
    pub action: StepAction,
    /// Target port.
    pub port: String,
    /// Payload for `send`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Profile for `connect` when the endpoint does not exist yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    /// Fault plan for `fault`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<FaultPlan>,
    /// Pause after the step, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
    /// Expected result; a step without one must succeed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect: Option<Expectation>,
}

impl ScenarioStep {
    /// A `connect` step.
    pub fn connect(port: impl Into<String>, profile: impl Into<String>) -> Self {
        ScenarioStep {
            action: StepAction::Connect,
            port: port.into(),
            data: None,
            profile: Some(profile.into()),
            fault: None,
            delay_ms: None,
            expect: None,
        }
    }

    /// A `send` step.
    pub fn send(port: impl Into<String>, data: impl Into<String>) -> Self {
        ScenarioStep {
            action: StepAction::Send,
            port: port.into(),
            data: Some(data.into()),
            profile: None,
            fault: None,
            delay_ms: None,
            expect: None,
        }
    }

    /// A `disconnect` step.
    pub fn disconnect(port: impl Into<String>) -> Self {
        ScenarioStep {
            action: StepAction::Disconnect,
            port: port.into(),
            data: None,
            profile: None,
            fault: None,
            delay_ms: None,
            expect: None,
        }
    }

    /// A `fault` step; `None` clears the endpoint's plan.
    pub fn fault(port: impl Into<String>, plan: Option<FaultPlan>) -> Self {
        ScenarioStep {
            action: StepAction::Fault,
            port: port.into(),
            data: None,
            profile: None,
            fault: plan,
            delay_ms: None,
            expect: None,
        }
    }

    /// Expect the step to fail.
    pub fn expect_error(mut self) -> Self {
        self.expect = Some(Expectation {
            outcome: Outcome::Error,
            lines: None,
        });
        self
    }

    /// Expect the step to succeed and leave these lines on the display.
    pub fn expect_lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expect = Some(Expectation {
            outcome: Outcome::Ok,
            lines: Some(lines.into_iter().map(Into::into).collect()),
        });
        self
    }

    /// Expected outcome, defaulting to success.
    pub fn expected_outcome(&self) -> Outcome {
        self.expect.as_ref().map(|e| e.outcome).unwrap_or_default()
    }
}

/// Pass criteria over a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuccessCriteria {
    /// Minimum share of steps that must pass, in percent.
    pub min_pass_rate: f64,
    /// Maximum average latency of successful sends, in milliseconds.
    pub max_latency_ms: Option<f64>,
}

impl Default for SuccessCriteria {
    fn default() -> Self {
        SuccessCriteria {
            min_pass_rate: 100.0,
            max_latency_ms: None,
        }
    }
}

/// A named list of steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Pass criteria.
    #[serde(default)]
    pub criteria: SuccessCriteria,
    /// Steps in execution order.
    pub steps: Vec<ScenarioStep>,
}

impl Scenario {
    /// Create a scenario.
    pub fn new(name: impl Into<String>, steps: Vec<ScenarioStep>) -> Self {
        Scenario {
            name: name.into(),
            description: None,
            criteria: SuccessCriteria::default(),
            steps,
        }
    }

    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str) -> ModelResult<Self> {
        let scenario: Scenario = serde_yaml::from_str(yaml)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Load and validate a YAML file.
    pub fn load(path: &Path) -> ModelResult<Self> {
        debug!(path = %path.display(), "loading scenario");
        Self::from_yaml_str(&read_file(path)?)
    }

    /// Check that every step carries what its action needs.
    pub fn validate(&self) -> ModelResult<()> {
        let invalid = |reason: String| ModelError::InvalidScenario {
            name: self.name.clone(),
            reason,
        };
        if self.steps.is_empty() {
            return Err(invalid("no steps".to_string()));
        }
        if !(0.0..=100.0).contains(&self.criteria.min_pass_rate) {
            return Err(invalid(format!(
                "pass rate {} is outside 0..=100",
                self.criteria.min_pass_rate
            )));
        }
        for (i, step) in self.steps.iter().enumerate() {
            if step.port.is_empty() {
                return Err(invalid(format!("step {} has an empty port", i + 1)));
            }
            if step.action == StepAction::Send && step.data.is_none() {
                return Err(invalid(format!("step {} sends without data", i + 1)));
            }
            if let Some(plan) = &step.fault {
                plan.validate()
                    .map_err(|reason| invalid(format!("step {}: {reason}", i + 1)))?;
            }
        }
        Ok(())
    }
}
