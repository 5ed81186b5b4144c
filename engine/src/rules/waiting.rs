//! Waiting-time priority
//!
//! Scores how long a patient has been stuck at its current service point,
//! saturating at a configured horizon so a very long wait cannot dominate
//! every clinical signal forever. Never fails: wait time is always known.

use super::{DecisionRule, RuleEvaluationError, RuleScore};
use crate::models::state::{PatientView, SystemView};

/// Waiting-time priority rule
pub struct WaitingTimeRule {
    /// Waits at or beyond this many steps score 1.0
    saturation_steps: usize,
}

impl WaitingTimeRule {
    pub fn new(saturation_steps: usize) -> Self {
        Self {
            saturation_steps: saturation_steps.max(1),
        }
    }
}

impl DecisionRule for WaitingTimeRule {
    fn score(
        &self,
        patient: &PatientView,
        _system: &SystemView,
    ) -> Result<RuleScore, RuleEvaluationError> {
        let value = (patient.wait_steps as f64 / self.saturation_steps as f64).min(1.0);
        Ok(RuleScore {
            value,
            explanation: format!(
                "waited {} step(s) at {} (saturates at {})",
                patient.wait_steps, patient.location, self.saturation_steps
            ),
        })
    }
}
