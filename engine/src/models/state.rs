//! Patient State Store
//!
//! Holds every patient in a run, indexed by ID, and produces the read-only
//! views the Evaluate phase and external reporting consume.
//!
//! # Critical Invariants
//!
//! 1. **Single location**: a patient occupies exactly one service point at
//!    any step; only `advance` changes it.
//! 2. **Serialized mutation**: all mutation goes through `&mut self`
//!    methods, called only from the orchestrator's Admit/Commit phases —
//!    no two moves of the same patient can interleave within one step.
//! 3. **Idempotent snapshots**: `snapshot(step)` is read-only and sorted by
//!    patient ID; calling it twice without intervening steps returns
//!    identical data.

use crate::models::patient::{AttributeValue, HistoryAction, Patient, PatientError};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("unknown patient {0}")]
    UnknownPatient(String),

    #[error("duplicate patient {0}")]
    DuplicatePatient(String),

    #[error(transparent)]
    Patient(#[from] PatientError),
}

/// Read-only view of one patient, as captured by the Collect phase
#[derive(Debug, Clone, PartialEq)]
pub struct PatientView {
    pub id: String,
    pub location: String,
    pub attributes: HashMap<String, AttributeValue>,
    pub arrival_step: usize,
    /// Steps spent at the current location as of the snapshot step
    pub wait_steps: usize,
    pub terminal: bool,
    pub flagged: bool,
}

/// Read-only view of system state at one step, shared by all rule
/// evaluations of that step.
///
/// Built once per step by the orchestrator's Collect phase; rules read it,
/// never mutate it, which is what makes the Evaluate phase parallelizable.
#[derive(Debug, Clone)]
pub struct SystemView {
    step: usize,
    period: usize,
    /// Remaining capacity per service point for the current period
    /// (`None` = uncapacitated)
    remaining_capacity: HashMap<String, Option<u32>>,
    /// Active patients per service point
    occupancy: HashMap<String, usize>,
}

impl SystemView {
    pub fn new(
        step: usize,
        period: usize,
        remaining_capacity: HashMap<String, Option<u32>>,
        occupancy: HashMap<String, usize>,
    ) -> Self {
        Self {
            step,
            period,
            remaining_capacity,
            occupancy,
        }
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Remaining capacity at a service point for the current period.
    /// Outer `None`: unknown service point; inner `None`: uncapacitated.
    pub fn remaining_capacity(&self, service_point: &str) -> Option<Option<u32>> {
        self.remaining_capacity.get(service_point).copied()
    }

    /// Number of active patients currently at a service point
    pub fn occupancy(&self, service_point: &str) -> usize {
        self.occupancy.get(service_point).copied().unwrap_or(0)
    }
}

/// All patients in a run, indexed by ID
///
/// # Example
///
/// ```rust
/// use pathway_simulator_core_rs::models::patient::Patient;
/// use pathway_simulator_core_rs::models::state::PatientStore;
/// use std::collections::HashMap;
///
/// let mut store = PatientStore::new();
/// let patient = Patient::new("P1".to_string(), 0, HashMap::new(), "referral".to_string());
/// store.admit(patient).unwrap();
///
/// assert_eq!(store.num_patients(), 1);
/// assert_eq!(store.active_count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PatientStore {
    patients: HashMap<String, Patient>,
}

impl PatientStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            patients: HashMap::new(),
        }
    }

    /// Add a newly arrived patient
    pub fn admit(&mut self, patient: Patient) -> Result<(), StoreError> {
        let id = patient.id().to_string();
        if self.patients.contains_key(&id) {
            return Err(StoreError::DuplicatePatient(id));
        }
        self.patients.insert(id, patient);
        Ok(())
    }

    /// Get a patient by ID
    pub fn get(&self, patient_id: &str) -> Option<&Patient> {
        self.patients.get(patient_id)
    }

    /// Move a patient to a target service point, appending history
    pub fn advance(
        &mut self,
        patient_id: &str,
        target: String,
        step: usize,
        action: HistoryAction,
        terminal: bool,
    ) -> Result<(), StoreError> {
        let patient = self
            .patients
            .get_mut(patient_id)
            .ok_or_else(|| StoreError::UnknownPatient(patient_id.to_string()))?;
        patient.advance(target, step, action, terminal)?;
        Ok(())
    }

    /// Flag a patient for manual review at its current location
    pub fn flag_for_review(&mut self, patient_id: &str, step: usize) -> Result<(), StoreError> {
        let patient = self
            .patients
            .get_mut(patient_id)
            .ok_or_else(|| StoreError::UnknownPatient(patient_id.to_string()))?;
        patient.flag_for_review(step);
        Ok(())
    }

    /// Read-only views of all patients, sorted by patient ID
    ///
    /// Deterministic and side-effect free: repeated calls without
    /// intervening mutation return identical data.
    pub fn snapshot(&self, step: usize) -> Vec<PatientView> {
        let mut views: Vec<PatientView> = self
            .patients
            .values()
            .map(|p| PatientView {
                id: p.id().to_string(),
                location: p.location().to_string(),
                attributes: p.attributes().clone(),
                arrival_step: p.arrival_step(),
                wait_steps: p.wait_steps(step),
                terminal: p.is_terminal(),
                flagged: p.is_flagged(),
            })
            .collect();
        views.sort_by(|a, b| a.id.cmp(&b.id));
        views
    }

    /// Views of active (non-terminal) patients only, sorted by patient ID
    pub fn active_snapshot(&self, step: usize) -> Vec<PatientView> {
        let mut views = self.snapshot(step);
        views.retain(|v| !v.terminal);
        views
    }

    /// Number of patients ever admitted
    pub fn num_patients(&self) -> usize {
        self.patients.len()
    }

    /// Number of non-terminal patients
    pub fn active_count(&self) -> usize {
        self.patients.values().filter(|p| !p.is_terminal()).count()
    }

    /// Active patients per service point
    pub fn occupancy(&self) -> HashMap<String, usize> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for patient in self.patients.values() {
            if !patient.is_terminal() {
                *counts.entry(patient.location().to_string()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// All patients (checkpointing)
    pub fn patients(&self) -> &HashMap<String, Patient> {
        &self.patients
    }
}
