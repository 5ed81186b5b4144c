//! Orchestrator Engine
//!
//! Main simulation loop integrating all components:
//! - Arrival injection (external feed records due at each step)
//! - Rule evaluation (per-patient decisions against an immutable snapshot)
//! - Admission control (resource ledger reservations in tie-break order)
//! - Patient state commits (append-only history)
//! - Event logging (complete run history)
//!
//! # Architecture
//!
//! Each step is batch-synchronous — the whole population moves through the
//! phases before time advances, never patient-interleaved:
//!
//! ```text
//! For each step t:
//! 1. Roll the ledger at period boundaries
//! 2. Inject arrivals due at t
//! 3. Collect: snapshot patients and remaining capacity (read-only views)
//! 4. Evaluate: one decision per active patient (worker pool, pure)
//! 5. Admit: decisions in tie-break order; try_reserve per move;
//!    denial leaves the patient waiting for re-evaluation at t+1
//! 6. Commit: apply granted transitions, advance time
//! 7. Terminal check: patients on exit points leave the active set
//! ```
//!
//! Commit of step N fully completes before Evaluate of step N+1 begins;
//! there is no cross-step concurrency. A run can stop only between steps,
//! and everything committed so far (event log, store, ledger) is retained.
//!
//! # Example
//!
//! ```rust,ignore
//! use pathway_simulator_core_rs::orchestrator::Orchestrator;
//!
//! let mut orchestrator = Orchestrator::new(scenario, feed)?;
//! let outcome = orchestrator.run()?;
//! println!("finished after {} steps: {:?}", orchestrator.current_step(), outcome);
//! ```

use crate::arrivals::{ArrivalRecord, ArrivalSchedule, FeedError};
use crate::core::time::TimeManager;
use crate::graph::PathwayGraph;
use crate::ledger::{ResourceError, ResourceLedger};
use crate::models::decision::{Action, Decision, ReviewReason, WaitReason};
use crate::models::event::{Event, EventLog};
use crate::models::patient::{HistoryAction, Patient};
use crate::models::state::{PatientStore, StoreError, SystemView};
use crate::rules::RuleSet;
use crate::scenario::{ConfigurationError, ScenarioConfig};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::workers::evaluate_batch;

/// Simulation error types
///
/// Configuration and feed errors surface before the first step; resource
/// and store errors mid-run indicate an engine bug and abort the run —
/// capacity accounting is never silently patched up.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("checkpoint was produced by a different scenario (expected hash {expected}, found {found})")]
    CheckpointMismatch { expected: String, found: String },
}

/// Result of a single step
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    /// Step number that was executed
    pub step: usize,

    /// New arrivals injected this step
    pub num_arrivals: usize,

    /// Patients granted a move (advance or pathway completion)
    pub num_admitted: usize,

    /// Patients discharged early via the safety gate
    pub num_discharged: usize,

    /// Patients left waiting (rule choice or capacity denial)
    pub num_waiting: usize,

    /// Patients flagged for manual review this step
    pub num_flagged: usize,

    /// Active (non-terminal) patients after the commit
    pub active_patients: usize,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Every patient reached a terminal service point
    Completed { steps: usize },

    /// The configured horizon was hit with patients still active.
    /// Reported, not an error: partial results are retained.
    HorizonReached { steps: usize, active_patients: usize },
}

/// Main orchestrator owning all run state
///
/// Construction validates and freezes the scenario; the graph, capacities,
/// and rule weights never change afterwards. All dependencies are passed
/// in explicitly — there is no ambient global scenario state.
pub struct Orchestrator {
    /// Frozen scenario bundle (kept for reports and checkpoint hashing)
    scenario: ScenarioConfig,

    /// Static pathway network
    graph: PathwayGraph,

    /// Capacity accounting per (service point, period)
    ledger: ResourceLedger,

    /// All patients, active and terminal
    store: PatientStore,

    /// Configured decision rules
    rule_set: RuleSet,

    /// Discrete time: steps grouped into capacity periods
    time: TimeManager,

    /// External arrival feed, validated and ordered
    arrivals: ArrivalSchedule,

    /// Complete run history
    event_log: EventLog,

    /// Latest decision per patient (feeds prioritisation/discharge exports)
    latest_decisions: HashMap<String, Decision>,

    /// Evaluate-phase worker threads
    workers: usize,

    /// Maximum steps before the run is reported incomplete
    horizon: usize,

    /// Run identifier attached to structured exports
    run_id: String,
}

impl Orchestrator {
    /// Create a new orchestrator from a scenario and an arrival feed.
    ///
    /// # Returns
    ///
    /// * `Ok(Orchestrator)` - Scenario validated, all components built
    /// * `Err(SimulationError)` - Validation failed (all violations listed)
    ///   or the feed contains duplicate patients
    pub fn new(
        scenario: ScenarioConfig,
        feed: Vec<ArrivalRecord>,
    ) -> Result<Self, SimulationError> {
        scenario.validate()?;

        let graph = scenario.build_graph();
        let ledger = ResourceLedger::new(scenario.effective_capacities(), scenario.rollover);
        let rule_set = RuleSet::from_config(&scenario.rules);
        let arrivals = ArrivalSchedule::new(feed)?;
        let time = TimeManager::new(scenario.steps_per_period);

        info!(
            service_points = graph.len(),
            pending_arrivals = arrivals.remaining(),
            horizon = scenario.horizon,
            workers = scenario.workers,
            "scenario validated"
        );

        Ok(Self {
            workers: scenario.workers,
            horizon: scenario.horizon,
            scenario,
            graph,
            ledger,
            store: PatientStore::new(),
            rule_set,
            time,
            arrivals,
            event_log: EventLog::new(),
            latest_decisions: HashMap::new(),
            run_id: uuid::Uuid::new_v4().to_string(),
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Get current step number
    pub fn current_step(&self) -> usize {
        self.time.current_step()
    }

    /// Get current capacity period
    pub fn current_period(&self) -> usize {
        self.time.current_period()
    }

    /// Get reference to the patient store
    pub fn store(&self) -> &PatientStore {
        &self.store
    }

    /// Get reference to the resource ledger
    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    /// Get reference to the pathway graph
    pub fn graph(&self) -> &PathwayGraph {
        &self.graph
    }

    /// Get reference to the event log
    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    /// Get total events logged
    pub fn event_count(&self) -> usize {
        self.event_log.len()
    }

    /// Get the frozen scenario bundle
    pub fn scenario(&self) -> &ScenarioConfig {
        &self.scenario
    }

    /// Latest decision per patient
    pub fn latest_decisions(&self) -> &HashMap<String, Decision> {
        &self.latest_decisions
    }

    /// Run identifier attached to exports and checkpoints
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    // ========================================================================
    // Step Loop Implementation
    // ========================================================================

    /// Execute one simulation step (Collect → Evaluate → Admit → Commit)
    pub fn step(&mut self) -> Result<StepResult, SimulationError> {
        let step = self.time.current_step();
        let period = self.time.current_period();

        // STEP 1: PERIOD ROLLOVER
        // Materialize this period's allocations before any reservation
        if self.time.is_period_start() {
            self.ledger.roll_period(period);
            if period > 0 {
                self.event_log.log(Event::PeriodRolled { step, period });
            }
        }

        // STEP 2: ARRIVALS
        // Inject feed records due now; patients start at the entry point
        let mut num_arrivals = 0;
        for record in self.arrivals.drain_due(step) {
            let entry_point = self.graph.entry_point().to_string();
            let patient = Patient::new(
                record.patient_id.clone(),
                record.arrival_step,
                record.attributes,
                entry_point.clone(),
            );
            self.store.admit(patient)?;
            self.event_log.log(Event::Arrival {
                step,
                patient_id: record.patient_id,
                service_point: entry_point,
            });
            num_arrivals += 1;
        }

        // STEP 3: COLLECT
        // Immutable views of patients and remaining capacity; everything
        // the Evaluate phase reads comes from here
        let views = self.store.active_snapshot(step);
        let system = SystemView::new(
            step,
            period,
            self.ledger.remaining_capacities(period),
            self.store.occupancy(),
        );

        // STEP 4: EVALUATE
        // One decision per active patient, read-only, worker pool
        let mut decisions = evaluate_batch(&self.rule_set, &self.graph, &views, &system, self.workers);

        // STEP 5: ADMIT
        // Deterministic tie-break order: ranking, then arrival, then ID
        decisions.sort_by(Decision::admit_order);

        let wait_steps_by_id: HashMap<&str, usize> = views
            .iter()
            .map(|v| (v.id.as_str(), v.wait_steps))
            .collect();

        let mut num_admitted = 0;
        let mut num_discharged = 0;
        let mut num_waiting = 0;
        let mut num_flagged = 0;
        let mut transitions: Vec<(String, String, HistoryAction)> = Vec::new();

        for decision in &decisions {
            for contribution in decision.rationale.iter().filter(|c| c.fallback) {
                self.event_log.log(Event::RuleFallback {
                    step,
                    patient_id: decision.patient_id.clone(),
                    rule: contribution.rule.clone(),
                    reason: contribution.explanation.clone(),
                });
            }

            let from = self
                .store
                .get(&decision.patient_id)
                .map(|p| p.location().to_string())
                .unwrap_or_default();

            match &decision.action {
                Action::Advance { target } | Action::Discharge { target } => {
                    let granted = self.ledger.try_reserve(target, period, 1)?;
                    if granted {
                        if matches!(decision.action, Action::Discharge { .. }) {
                            transitions.push((
                                decision.patient_id.clone(),
                                target.clone(),
                                HistoryAction::Discharged,
                            ));
                            self.event_log.log(Event::Discharged {
                                step,
                                patient_id: decision.patient_id.clone(),
                                from,
                                to: target.clone(),
                                priority: decision.priority,
                                rationale: decision.rationale_summary(),
                            });
                            num_discharged += 1;
                        } else {
                            transitions.push((
                                decision.patient_id.clone(),
                                target.clone(),
                                HistoryAction::Advanced,
                            ));
                            self.event_log.log(Event::Admitted {
                                step,
                                patient_id: decision.patient_id.clone(),
                                from,
                                to: target.clone(),
                                priority: decision.priority,
                                rationale: decision.rationale_summary(),
                            });
                            num_admitted += 1;
                        }
                    } else {
                        debug!(
                            patient = decision.patient_id.as_str(),
                            target = target.as_str(),
                            period,
                            "admission denied: capacity exhausted"
                        );
                        let waited = wait_steps_by_id
                            .get(decision.patient_id.as_str())
                            .copied()
                            .unwrap_or(0);
                        let review_due = self
                            .rule_set
                            .review_after_steps()
                            .map_or(false, |limit| waited >= limit);
                        if review_due {
                            self.store.flag_for_review(&decision.patient_id, step)?;
                            self.event_log.log(Event::FlaggedForReview {
                                step,
                                patient_id: decision.patient_id.clone(),
                                service_point: from,
                                reason: ReviewReason::WaitExceeded { steps: waited },
                                rationale: decision.rationale_summary(),
                            });
                            num_flagged += 1;
                        } else {
                            self.event_log.log(Event::Waited {
                                step,
                                patient_id: decision.patient_id.clone(),
                                service_point: from,
                                reason: WaitReason::CapacityExhausted {
                                    service_point: target.clone(),
                                },
                                rationale: decision.rationale_summary(),
                            });
                            num_waiting += 1;
                        }
                    }
                }
                Action::Wait { reason } => {
                    self.event_log.log(Event::Waited {
                        step,
                        patient_id: decision.patient_id.clone(),
                        service_point: from,
                        reason: reason.clone(),
                        rationale: decision.rationale_summary(),
                    });
                    num_waiting += 1;
                }
                Action::FlagForReview { reason } => {
                    self.store.flag_for_review(&decision.patient_id, step)?;
                    self.event_log.log(Event::FlaggedForReview {
                        step,
                        patient_id: decision.patient_id.clone(),
                        service_point: from,
                        reason: reason.clone(),
                        rationale: decision.rationale_summary(),
                    });
                    num_flagged += 1;
                }
            }

            self.latest_decisions
                .insert(decision.patient_id.clone(), decision.clone());
        }

        // STEP 6: COMMIT
        // Apply granted transitions; patients moved onto exit points become
        // terminal and leave future Evaluate phases
        for (patient_id, target, action) in transitions {
            let terminal = self
                .graph
                .get(&target)
                .map(|p| p.is_exit())
                .unwrap_or(false);
            self.store
                .advance(&patient_id, target, step, action, terminal)?;
        }

        // STEP 7: ADVANCE TIME
        self.time.advance_step();

        Ok(StepResult {
            step,
            num_arrivals,
            num_admitted,
            num_discharged,
            num_waiting,
            num_flagged,
            active_patients: self.store.active_count(),
        })
    }

    /// Run until every patient is terminal or the horizon is reached
    pub fn run(&mut self) -> Result<RunOutcome, SimulationError> {
        loop {
            let active = self.store.active_count();
            if active == 0 && self.arrivals.remaining() == 0 {
                let steps = self.time.current_step();
                info!(steps, patients = self.store.num_patients(), "run completed");
                return Ok(RunOutcome::Completed { steps });
            }

            if self.time.current_step() >= self.horizon {
                let steps = self.time.current_step();
                warn!(steps, active, "horizon reached with active patients");
                self.event_log.log(Event::HorizonReached {
                    step: steps,
                    active_patients: active,
                });
                return Ok(RunOutcome::HorizonReached {
                    steps,
                    active_patients: active,
                });
            }

            self.step()?;
        }
    }

    // ========================================================================
    // Checkpoint plumbing (see checkpoint.rs)
    // ========================================================================

    pub(super) fn time_mut(&mut self) -> &mut TimeManager {
        &mut self.time
    }

    pub(super) fn store_mut(&mut self) -> &mut PatientStore {
        &mut self.store
    }

    pub(super) fn ledger_mut(&mut self) -> &mut ResourceLedger {
        &mut self.ledger
    }

    pub(super) fn arrivals_mut(&mut self) -> &mut ArrivalSchedule {
        &mut self.arrivals
    }

    pub(super) fn set_run_id(&mut self, run_id: String) {
        self.run_id = run_id;
    }
}

// Manual Debug implementation (the rule set holds trait objects)
impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("current_step", &self.current_step())
            .field("current_period", &self.current_period())
            .field("num_patients", &self.store.num_patients())
            .field("active_patients", &self.store.active_count())
            .field("event_count", &self.event_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
