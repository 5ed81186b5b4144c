//! Checkpoint - Save/Load Run State
//!
//! A run may be stopped only between steps; a checkpoint captures
//! everything needed to resume from that boundary: patients (with their
//! append-only histories), materialized ledger allocations, and the time
//! index. The snapshot embeds a SHA-256 hash of the scenario so a
//! checkpoint can never be resumed under a different configuration —
//! capacity accounting and tie-break determinism both depend on the bundle
//! being identical.
//!
//! The event log is deliberately not part of the snapshot: events already
//! emitted belong to the external consumers that received them.

use crate::arrivals::ArrivalRecord;
use crate::core::time::TimeManager;
use crate::ledger::ResourceAllocation;
use crate::models::patient::Patient;
use crate::scenario::ScenarioConfig;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::engine::{Orchestrator, SimulationError};

// ============================================================================
// Snapshot Structures
// ============================================================================

/// One materialized (service point, period) allocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationSnapshot {
    pub service_point: String,
    pub period: usize,
    pub capacity: Option<u32>,
    pub used: u32,
}

/// Complete between-step state snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Step position; resume begins here
    pub current_step: usize,

    /// Run identifier, preserved across resume
    pub run_id: String,

    /// SHA-256 of the canonical scenario JSON (CRITICAL for validation)
    pub scenario_hash: String,

    /// All patients with full history, sorted by ID
    pub patients: Vec<Patient>,

    /// All materialized ledger allocations, sorted by (point, period)
    pub allocations: Vec<AllocationSnapshot>,
}

/// SHA-256 over the canonical JSON form of a scenario.
///
/// Serializing through `serde_json::Value` sorts object keys, so the hash
/// is stable across map iteration orders.
pub fn scenario_hash(scenario: &ScenarioConfig) -> String {
    let canonical = serde_json::to_value(scenario)
        .and_then(|v| serde_json::to_string(&v))
        .unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl Orchestrator {
    /// Capture a between-step snapshot of the run
    pub fn checkpoint(&self) -> StateSnapshot {
        let mut patients: Vec<Patient> = self.store().patients().values().cloned().collect();
        patients.sort_by(|a, b| a.id().cmp(b.id()));

        let mut allocations: Vec<AllocationSnapshot> = self
            .ledger()
            .allocations()
            .iter()
            .map(|((service_point, period), allocation)| AllocationSnapshot {
                service_point: service_point.clone(),
                period: *period,
                capacity: allocation.capacity,
                used: allocation.used,
            })
            .collect();
        allocations.sort_by(|a, b| {
            a.service_point
                .cmp(&b.service_point)
                .then_with(|| a.period.cmp(&b.period))
        });

        StateSnapshot {
            current_step: self.current_step(),
            run_id: self.run_id().to_string(),
            scenario_hash: scenario_hash(self.scenario()),
            patients,
            allocations,
        }
    }

    /// Resume a run from a snapshot.
    ///
    /// The scenario and the full original feed must be supplied again; feed
    /// records arriving before the snapshot step are skipped (those
    /// patients are already in the restored store).
    ///
    /// # Errors
    ///
    /// * `SimulationError::CheckpointMismatch` - the scenario hash differs
    /// * `SimulationError::Configuration` - the scenario fails validation
    pub fn restore(
        scenario: ScenarioConfig,
        feed: Vec<ArrivalRecord>,
        snapshot: StateSnapshot,
    ) -> Result<Self, SimulationError> {
        let expected = scenario_hash(&scenario);
        if expected != snapshot.scenario_hash {
            return Err(SimulationError::CheckpointMismatch {
                expected,
                found: snapshot.scenario_hash,
            });
        }

        let steps_per_period = scenario.steps_per_period;
        let mut orchestrator = Orchestrator::new(scenario, feed)?;

        *orchestrator.time_mut() = TimeManager::at_step(steps_per_period, snapshot.current_step);
        for patient in snapshot.patients {
            orchestrator.store_mut().admit(patient)?;
        }
        for allocation in snapshot.allocations {
            orchestrator.ledger_mut().restore_allocation(
                allocation.service_point,
                allocation.period,
                ResourceAllocation {
                    capacity: allocation.capacity,
                    used: allocation.used,
                },
            );
        }
        orchestrator
            .arrivals_mut()
            .skip_before(snapshot.current_step);
        orchestrator.set_run_id(snapshot.run_id);

        Ok(orchestrator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> ScenarioConfig {
        use crate::graph::Predicate;
        use crate::ledger::RolloverPolicy;
        use crate::rules::{CombinationPolicy, RuleConfig, RuleSetConfig, ScoringRuleConfig};
        use crate::scenario::{ServicePointConfig, TransitionConfig};

        ScenarioConfig {
            description: String::new(),
            service_points: vec![
                ServicePointConfig {
                    id: "referral".to_string(),
                    activity: String::new(),
                    capacity: None,
                    exit: false,
                    transitions: vec![TransitionConfig {
                        target: "exit".to_string(),
                        when: Predicate::Always,
                    }],
                },
                ServicePointConfig {
                    id: "exit".to_string(),
                    activity: String::new(),
                    capacity: None,
                    exit: true,
                    transitions: vec![],
                },
            ],
            entry_point: "referral".to_string(),
            steps_per_period: 2,
            horizon: 20,
            rollover: RolloverPolicy::Reset,
            rules: RuleSetConfig {
                scoring: vec![ScoringRuleConfig {
                    name: "waiting".to_string(),
                    weight: 1.0,
                    default_score: 0.5,
                    rule: RuleConfig::WaitingTime { saturation_steps: 5 },
                }],
                combination: CombinationPolicy::WeightedSum,
                discharge: None,
                review_after_steps: None,
            },
            capacity_deltas: std::collections::HashMap::new(),
            workers: 1,
        }
    }

    #[test]
    fn test_scenario_hash_is_stable() {
        let a = scenario_hash(&scenario());
        let b = scenario_hash(&scenario());
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_scenario_hash_detects_changes() {
        let base = scenario();
        let mut changed = scenario();
        changed.horizon = 21;
        assert_ne!(scenario_hash(&base), scenario_hash(&changed));
    }

    #[test]
    fn test_restore_rejects_wrong_scenario() {
        let orchestrator = Orchestrator::new(scenario(), vec![]).unwrap();
        let snapshot = orchestrator.checkpoint();

        let mut other = scenario();
        other.horizon = 99;
        let result = Orchestrator::restore(other, vec![], snapshot);
        assert!(matches!(
            result,
            Err(SimulationError::CheckpointMismatch { .. })
        ));
    }
}
