//! Fault injection.
//!
//! A [`FaultPlan`] attached to an endpoint makes a fraction of its messages
//! fail or arrive late. Rolls use the endpoint's seeded rng.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::InjectedFault;
use crate::latency::MAX_LATENCY_MS;

/// What a triggered fault does.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FaultMode {
    /// Discard the message; content stays unchanged and a failure is counted.
    Drop,
    /// Report a transport error; a failure is counted.
    Error,
    /// Deliver the message late.
    ExtraLatency {
        /// Added latency in milliseconds.
        ms: f64,
    },
}

/// Fault attached to an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaultPlan {
    /// Effect when triggered.
    #[serde(flatten)]
    pub mode: FaultMode,
    /// Chance per message, in `[0, 1]`.
    #[serde(default = "default_probability")]
    pub probability: f64,
}

fn default_probability() -> f64 {
    1.0
}

/// Outcome of rolling a plan for one message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FaultDecision {
    /// No fault.
    Pass,
    /// Fail the message.
    Fail(InjectedFault),
    /// Add latency.
    Delay(f64),
}

impl FaultPlan {
    /// A plan that always triggers.
    pub fn always(mode: FaultMode) -> Self {
        FaultPlan { mode, probability: 1.0 }
    }

    /// Set the trigger probability.
    pub fn with_probability(mut self, probability: f64) -> Self {
        self.probability = probability;
        self
    }

    /// Check the probability and latency values.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.probability) {
            return Err(format!("fault probability {} is outside [0, 1]", self.probability));
        }
        if let FaultMode::ExtraLatency { ms } = self.mode {
            if !ms.is_finite() || ms < 0.0 {
                return Err(format!("extra latency {ms} ms must be finite and non-negative"));
            }
            if ms > MAX_LATENCY_MS {
                return Err(format!("extra latency {ms} ms exceeds the {MAX_LATENCY_MS} ms limit"));
            }
        }
        Ok(())
    }

    /// Roll the plan for one message.
    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> FaultDecision {
        let triggered = self.probability >= 1.0
            || (self.probability > 0.0 && rng.gen_bool(self.probability));
        if !triggered {
            return FaultDecision::Pass;
        }
        match self.mode {
            FaultMode::Drop => FaultDecision::Fail(InjectedFault::Dropped),
            FaultMode::Error => FaultDecision::Fail(InjectedFault::Error),
            FaultMode::ExtraLatency { ms } => FaultDecision::Delay(ms),
        }
    }
}

impl FaultMode {
    /// Label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            FaultMode::Drop => "drop",
            FaultMode::Error => "error",
            FaultMode::ExtraLatency { .. } => "extra_latency",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::latency::port_rng;

    #[test]
    fn test_always_triggers() {
        let mut rng = port_rng(0, "COM1");
        assert_eq!(
            FaultPlan::always(FaultMode::Drop).roll(&mut rng),
            FaultDecision::Fail(InjectedFault::Dropped)
        );
        assert_eq!(
            FaultPlan::always(FaultMode::ExtraLatency { ms: 25.0 }).roll(&mut rng),
            FaultDecision::Delay(25.0)
        );
    }

    #[test]
    fn test_never_triggers() {
        let mut rng = port_rng(0, "COM1");
        let plan = FaultPlan::always(FaultMode::Error).with_probability(0.0);
        assert!((0..100).all(|_| plan.roll(&mut rng) == FaultDecision::Pass));
    }

    #[test]
    fn test_partial_probability_mixes() {
        let mut rng = port_rng(3, "COM1");
        let plan = FaultPlan::always(FaultMode::Error).with_probability(0.5);
        let failed = (0..1000)
            .filter(|_| plan.roll(&mut rng) != FaultDecision::Pass)
            .count();
        assert!(failed > 300 && failed < 700, "failed = {failed}");
    }

    #[test]
    fn test_validate() {
        assert!(FaultPlan::always(FaultMode::Drop).validate().is_ok());
        assert!(FaultPlan::always(FaultMode::Drop).with_probability(1.5).validate().is_err());
        assert!(FaultPlan::always(FaultMode::ExtraLatency { ms: -1.0 }).validate().is_err());
        assert!(FaultPlan::always(FaultMode::ExtraLatency { ms: 1e17 }).validate().is_err());
        assert!(FaultPlan::always(FaultMode::ExtraLatency { ms: MAX_LATENCY_MS }).validate().is_ok());
    }

    #[test]
    fn test_deserialize() {
        let plan: FaultPlan =
            serde_json::from_str(r#"{"mode":"extra_latency","ms":12.5,"probability":0.25}"#).unwrap();
        assert_eq!(plan.mode, FaultMode::ExtraLatency { ms: 12.5 });
        assert_eq!(plan.probability, 0.25);

        let plan: FaultPlan = serde_json::from_str(r#"{"mode":"drop"}"#).unwrap();
        assert_eq!(plan, FaultPlan::always(FaultMode::Drop));
    }
}
