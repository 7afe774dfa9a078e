//! Scenario execution.
//!
//! Runs the steps of a [`Scenario`] against an [`Emulator`] and reports
//! per-step results plus an overall verdict against the scenario's
//! [`SuccessCriteria`].

use std::thread;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use vdisplay_engine::{ConnectionStatus, Emulator};
use vdisplay_model::{Outcome, ProfileLibrary, Scenario, ScenarioStep, StepAction, SuccessCriteria};

use crate::error::RunnerResult;

/// Profile used by `connect` steps that name none.
pub const DEFAULT_PROFILE: &str = "classic-20x2";

/// Result of one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    /// 1-based step number.
    pub step: usize,
    /// Step action.
    pub action: StepAction,
    /// Target port.
    pub port: String,
    /// What actually happened.
    pub outcome: Outcome,
    /// Whether the step met its expectation.
    pub passed: bool,
    /// Error message when the step failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Why the step did not pass despite the expected outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mismatch: Option<String>,
    /// Simulated latency of a successful send.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    /// Display lines after the step.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub lines: Vec<String>,
}

/// Result of a whole scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioReport {
    /// Scenario name.
    pub name: String,
    /// Per-step results in order.
    pub steps: Vec<StepReport>,
    /// Steps that passed.
    pub passed_steps: usize,
    /// Share of steps that passed, in percent.
    pub pass_rate: f64,
    /// Average latency over successful sends.
    pub avg_latency_ms: Option<f64>,
    /// Criteria the run was judged against.
    pub criteria: SuccessCriteria,
    /// Overall verdict.
    pub passed: bool,
}

impl ScenarioReport {
    /// Steps that did not pass.
    pub fn failures(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|s| !s.passed)
    }
}

/// Executes scenarios against an emulator.
#[derive(Debug)]
pub struct ScenarioRunner<'a> {
    emulator: &'a Emulator,
    profiles: &'a ProfileLibrary,
    honor_delays: bool,
}

impl<'a> ScenarioRunner<'a> {
    /// Create a runner that resolves `connect` profiles from `profiles`.
    pub fn new(emulator: &'a Emulator, profiles: &'a ProfileLibrary) -> Self {
        ScenarioRunner {
            emulator,
            profiles,
            honor_delays: true,
        }
    }

    /// Sleep for each step's `delay_ms` (on by default).
    pub fn with_delays(mut self, honor_delays: bool) -> Self {
        self.honor_delays = honor_delays;
        self
    }

    /// Run every step in order. Step failures end up in the report; only an
    /// invalid scenario is an error.
    pub fn run(&self, scenario: &Scenario) -> RunnerResult<ScenarioReport> {
        scenario.validate()?;
        info!(scenario = %scenario.name, steps = scenario.steps.len(), "running scenario");

        let mut steps = Vec::with_capacity(scenario.steps.len());
        for (i, step) in scenario.steps.iter().enumerate() {
            let report = self.run_step(i + 1, step);
            if !report.passed {
                warn!(
                    scenario = %scenario.name,
                    step = report.step,
                    error = report.error.as_deref().unwrap_or(""),
                    mismatch = report.mismatch.as_deref().unwrap_or(""),
                    "step failed"
                );
            }
            steps.push(report);

            if let Some(ms) = step.delay_ms.filter(|&ms| ms > 0 && self.honor_delays) {
                thread::sleep(Duration::from_millis(ms));
            }
        }

        let report = summarize(scenario, steps);
        info!(
            scenario = %report.name,
            pass_rate = report.pass_rate,
            passed = report.passed,
            "scenario finished"
        );
        Ok(report)
    }

    fn run_step(&self, number: usize, step: &ScenarioStep) -> StepReport {
        let result = match step.action {
            StepAction::Connect => self.connect(step).map(|_| None),
            StepAction::Send => {
                let data = step.data.as_deref().unwrap_or_default();
                self.emulator
                    .ingress(&step.port, data, Utc::now())
                    .map(|ack| Some(ack.latency_ms))
                    .map_err(|e| e.to_string())
            }
            StepAction::Disconnect => self
                .emulator
                .set_status(&step.port, ConnectionStatus::Disconnected)
                .map(|_| None)
                .map_err(|e| e.to_string()),
            StepAction::Fault => match step.fault {
                Some(plan) => self.emulator.set_fault(&step.port, plan),
                None => self.emulator.clear_fault(&step.port),
            }
            .map(|_| None)
            .map_err(|e| e.to_string()),
        };
        debug!(step = number, action = ?step.action, port = %step.port, ok = result.is_ok(), "step");

        let (outcome, error, latency_ms) = match result {
            Ok(latency) => (Outcome::Ok, None, latency),
            Err(e) => (Outcome::Error, Some(e), None),
        };
        let lines = self
            .emulator
            .content(&step.port)
            .map(|c| c.lines)
            .unwrap_or_default();

        let mut mismatch = None;
        if outcome != step.expected_outcome() {
            mismatch = Some(format!("expected {:?}, got {:?}", step.expected_outcome(), outcome));
        } else if let Some(expected) = step.expect.as_ref().and_then(|e| e.lines.as_ref()) {
            let fill = self.fill(&step.port);
            let actual: Vec<&str> = lines.iter().map(|l| l.trim_end_matches(fill)).collect();
            let expected: Vec<&str> = expected.iter().map(|l| l.trim_end_matches(fill)).collect();
            if actual != expected {
                mismatch = Some(format!("expected lines {expected:?}, got {actual:?}"));
            }
        }

        StepReport {
            step: number,
            action: step.action,
            port: step.port.clone(),
            outcome,
            passed: mismatch.is_none(),
            error,
            mismatch,
            latency_ms,
            lines,
        }
    }

    /// Create the endpoint, or bring an existing one back online.
    fn connect(&self, step: &ScenarioStep) -> Result<(), String> {
        if self.emulator.endpoint(&step.port).is_some() {
            return self
                .emulator
                .set_status(&step.port, ConnectionStatus::Connected)
                .map_err(|e| e.to_string());
        }
        let name = step.profile.as_deref().unwrap_or(DEFAULT_PROFILE);
        let profile = self.profiles.get(name).map_err(|e| e.to_string())?;
        self.emulator
            .create_endpoint(profile.endpoint_config(&step.port))
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    fn fill(&self, port: &str) -> char {
        self.emulator
            .endpoint(port)
            .map(|handle| {
                let guarded = handle.entry().lock();
                guarded.state.config().fill
            })
            .unwrap_or(' ')
    }
}

fn summarize(scenario: &Scenario, steps: Vec<StepReport>) -> ScenarioReport {
    let passed_steps = steps.iter().filter(|s| s.passed).count();
    let pass_rate = if steps.is_empty() {
        0.0
    } else {
        passed_steps as f64 * 100.0 / steps.len() as f64
    };

    let latencies: Vec<f64> = steps.iter().filter_map(|s| s.latency_ms).collect();
    let avg_latency_ms = if latencies.is_empty() {
        None
    } else {
        Some(latencies.iter().sum::<f64>() / latencies.len() as f64)
    };

    let criteria = scenario.criteria;
    let latency_ok = match (criteria.max_latency_ms, avg_latency_ms) {
        (Some(max), Some(avg)) => avg <= max,
        _ => true,
    };

    ScenarioReport {
        name: scenario.name.clone(),
        steps,
        passed_steps,
        pass_rate,
        avg_latency_ms,
        criteria,
        passed: pass_rate >= criteria.min_pass_rate && latency_ok,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vdisplay_engine::{EmulatorConfig, FaultMode, FaultPlan};

    fn emulator() -> Emulator {
        Emulator::new(EmulatorConfig::instant(3)).unwrap()
    }

    #[test]
    fn test_connect_uses_default_profile() {
        let emu = emulator();
        let library = ProfileLibrary::builtin();
        let runner = ScenarioRunner::new(&emu, &library);
        let scenario = Scenario::new(
            "connect",
            vec![ScenarioStep {
                profile: None,
                ..ScenarioStep::connect("COM1", "unused")
            }],
        );

        let report = runner.run(&scenario).unwrap();
        assert!(report.passed);
        assert_eq!(report.steps[0].lines.len(), 2);
        assert_eq!(report.steps[0].lines[0].chars().count(), 20);
    }

    #[test]
    fn test_reconnect_after_disconnect() {
        let emu = emulator();
        let library = ProfileLibrary::builtin();
        let scenario = Scenario::new(
            "reconnect",
            vec![
                ScenarioStep::connect("COM1", "compact-16x1"),
                ScenarioStep::disconnect("COM1"),
                ScenarioStep::send("COM1", "offline").expect_error(),
                ScenarioStep::connect("COM1", "compact-16x1"),
                ScenarioStep::send("COM1", "online").expect_lines(["online"]),
            ],
        );

        let report = ScenarioRunner::new(&emu, &library).run(&scenario).unwrap();
        assert!(report.passed, "{:?}", report.failures().collect::<Vec<_>>());
        assert_eq!(report.steps[2].outcome, Outcome::Error);
        assert!(report.steps[2].error.is_some());
    }

    #[test]
    fn test_unexpected_outcome_fails_step() {
        let emu = emulator();
        let library = ProfileLibrary::builtin();
        let scenario = Scenario::new(
            "bad",
            vec![
                ScenarioStep::connect("COM1", "classic-20x2"),
                ScenarioStep::send("COM1", "\x1B[9Hnope"),
            ],
        );

        let report = ScenarioRunner::new(&emu, &library).run(&scenario).unwrap();
        assert!(!report.passed);
        assert_eq!(report.passed_steps, 1);
        assert_eq!(report.pass_rate, 50.0);
        assert!(report.steps[1].mismatch.is_some());
    }

    #[test]
    fn test_line_mismatch_is_reported() {
        let emu = emulator();
        let library = ProfileLibrary::builtin();
        let scenario = Scenario::new(
            "lines",
            vec![
                ScenarioStep::connect("COM1", "classic-20x2"),
                ScenarioStep::send("COM1", "Hello").expect_lines(["Goodbye", ""]),
            ],
        );

        let report = ScenarioRunner::new(&emu, &library).run(&scenario).unwrap();
        assert_eq!(report.steps[1].outcome, Outcome::Ok);
        assert!(!report.steps[1].passed);
    }

    #[test]
    fn test_latency_criterion() {
        let emu = emulator();
        let library = ProfileLibrary::builtin();
        let mut scenario = Scenario::new(
            "latency",
            vec![
                ScenarioStep::connect("NET0", "classic-20x2"),
                ScenarioStep::send("NET0", "x"),
            ],
        );
        scenario.criteria.max_latency_ms = Some(1_000.0);

        let report = ScenarioRunner::new(&emu, &library).run(&scenario).unwrap();
        assert!(report.passed);
        assert!(report.avg_latency_ms.is_some());

        scenario.criteria.max_latency_ms = Some(-1.0);
        let emu = emulator();
        let report = ScenarioRunner::new(&emu, &library).run(&scenario).unwrap();
        assert!(!report.passed);
    }

    #[test]
    fn test_fault_step_drives_failures() {
        let emu = emulator();
        let library = ProfileLibrary::builtin();
        let scenario = Scenario::new(
            "faults",
            vec![
                ScenarioStep::connect("COM1", "classic-20x2"),
                ScenarioStep::fault("COM1", Some(FaultPlan::always(FaultMode::Drop))),
                ScenarioStep::send("COM1", "lost").expect_error(),
                ScenarioStep::fault("COM1", None),
                ScenarioStep::send("COM1", "kept").expect_lines(["kept", ""]),
            ],
        );

        let report = ScenarioRunner::new(&emu, &library).run(&scenario).unwrap();
        assert!(report.passed, "{:?}", report.failures().collect::<Vec<_>>());
        let stats = emu.endpoint_statistics("COM1").unwrap();
        assert_eq!((stats.succeeded, stats.failed), (1, 1));
    }

    #[test]
    fn test_unknown_profile_is_step_failure() {
        let emu = emulator();
        let library = ProfileLibrary::builtin();
        let scenario = Scenario::new("p", vec![ScenarioStep::connect("COM1", "no-such-profile")]);

        let report = ScenarioRunner::new(&emu, &library).run(&scenario).unwrap();
        assert!(!report.passed);
        assert!(report.steps[0].error.as_deref().unwrap().contains("no-such-profile"));
    }
}
