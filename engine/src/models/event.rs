//! Event logging for simulation replay and auditing.
//!
//! This module defines the Event enum which captures all significant state
//! changes during a run. Events enable:
//! - External aggregation (waiting-list profiles, activity tables)
//! - Auditing (every applied decision carries its rationale)
//! - Debugging (understand what happened and when)
//!
//! # Event Types
//!
//! Events are categorized by simulation phase:
//! - **Arrival**: a patient enters the system
//! - **Admitted / Discharged**: a decision was applied and committed
//! - **Waited / FlaggedForReview**: a patient stayed put, with the reason
//! - **RuleFallback**: a rule failed to score and its default was used
//! - **PeriodRolled / HorizonReached**: time bookkeeping outcomes

use crate::models::decision::{ReviewReason, WaitReason};
use serde::{Deserialize, Serialize};

/// Simulation event capturing a state change.
///
/// All events include a step number for temporal ordering. Events are
/// logged in the order they occur within a step (Admit-phase tie-break
/// order), which makes the log itself deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Patient arrived from the external feed and was placed at the entry point
    Arrival {
        step: usize,
        patient_id: String,
        service_point: String,
    },

    /// Patient was granted capacity and advanced to a new service point
    Admitted {
        step: usize,
        patient_id: String,
        from: String,
        to: String,
        priority: f64,
        rationale: String,
    },

    /// Patient was discharged early via the discharge-safety gate
    Discharged {
        step: usize,
        patient_id: String,
        from: String,
        to: String,
        priority: f64,
        rationale: String,
    },

    /// Patient remained at its current service point
    Waited {
        step: usize,
        patient_id: String,
        service_point: String,
        reason: WaitReason,
        rationale: String,
    },

    /// Patient was flagged for manual review
    FlaggedForReview {
        step: usize,
        patient_id: String,
        service_point: String,
        reason: ReviewReason,
        rationale: String,
    },

    /// A rule failed to score a patient and its default score was substituted
    RuleFallback {
        step: usize,
        patient_id: String,
        rule: String,
        reason: String,
    },

    /// A new capacity period began and the ledger rolled forward
    PeriodRolled { step: usize, period: usize },

    /// The run hit the configured horizon with patients still active
    HorizonReached { step: usize, active_patients: usize },
}

impl Event {
    /// Get the step number when this event occurred
    pub fn step(&self) -> usize {
        match self {
            Event::Arrival { step, .. } => *step,
            Event::Admitted { step, .. } => *step,
            Event::Discharged { step, .. } => *step,
            Event::Waited { step, .. } => *step,
            Event::FlaggedForReview { step, .. } => *step,
            Event::RuleFallback { step, .. } => *step,
            Event::PeriodRolled { step, .. } => *step,
            Event::HorizonReached { step, .. } => *step,
        }
    }

    /// Get a short description of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::Arrival { .. } => "Arrival",
            Event::Admitted { .. } => "Admitted",
            Event::Discharged { .. } => "Discharged",
            Event::Waited { .. } => "Waited",
            Event::FlaggedForReview { .. } => "FlaggedForReview",
            Event::RuleFallback { .. } => "RuleFallback",
            Event::PeriodRolled { .. } => "PeriodRolled",
            Event::HorizonReached { .. } => "HorizonReached",
        }
    }

    /// Get patient ID if the event relates to a specific patient
    pub fn patient_id(&self) -> Option<&str> {
        match self {
            Event::Arrival { patient_id, .. } => Some(patient_id),
            Event::Admitted { patient_id, .. } => Some(patient_id),
            Event::Discharged { patient_id, .. } => Some(patient_id),
            Event::Waited { patient_id, .. } => Some(patient_id),
            Event::FlaggedForReview { patient_id, .. } => Some(patient_id),
            Event::RuleFallback { patient_id, .. } => Some(patient_id),
            _ => None,
        }
    }

    /// Get the service point the event relates to, if any.
    ///
    /// For moves this is the destination; for waits and flags it is the
    /// point the patient stayed at.
    pub fn service_point(&self) -> Option<&str> {
        match self {
            Event::Arrival { service_point, .. } => Some(service_point),
            Event::Admitted { to, .. } => Some(to),
            Event::Discharged { to, .. } => Some(to),
            Event::Waited { service_point, .. } => Some(service_point),
            Event::FlaggedForReview { service_point, .. } => Some(service_point),
            _ => None,
        }
    }
}

/// Event log for storing and querying simulation events.
///
/// This is a simple wrapper around Vec<Event> with convenience methods.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Add an event to the log
    pub fn log(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Get the number of events logged
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get all events
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Get events for a specific step
    pub fn events_at_step(&self, step: usize) -> Vec<&Event> {
        self.events.iter().filter(|e| e.step() == step).collect()
    }

    /// Get events of a specific type
    pub fn events_of_type(&self, event_type: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Get events for a specific patient
    pub fn events_for_patient(&self, patient_id: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.patient_id() == Some(patient_id))
            .collect()
    }

    /// Get events touching a specific service point
    pub fn events_for_service_point(&self, service_point: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.service_point() == Some(service_point))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arrival(step: usize, patient: &str) -> Event {
        Event::Arrival {
            step,
            patient_id: patient.to_string(),
            service_point: "referral".to_string(),
        }
    }

    #[test]
    fn test_event_accessors() {
        let event = Event::Admitted {
            step: 3,
            patient_id: "P1".to_string(),
            from: "referral".to_string(),
            to: "triage".to_string(),
            priority: 0.8,
            rationale: "acuity: 0.750×0.50".to_string(),
        };

        assert_eq!(event.step(), 3);
        assert_eq!(event.event_type(), "Admitted");
        assert_eq!(event.patient_id(), Some("P1"));
        assert_eq!(event.service_point(), Some("triage"));
    }

    #[test]
    fn test_period_rolled_has_no_patient() {
        let event = Event::PeriodRolled { step: 4, period: 1 };
        assert_eq!(event.patient_id(), None);
        assert_eq!(event.service_point(), None);
    }

    #[test]
    fn test_event_log_queries() {
        let mut log = EventLog::new();
        log.log(arrival(0, "P1"));
        log.log(arrival(0, "P2"));
        log.log(Event::Waited {
            step: 1,
            patient_id: "P1".to_string(),
            service_point: "referral".to_string(),
            reason: crate::models::decision::WaitReason::CapacityExhausted {
                service_point: "triage".to_string(),
            },
            rationale: "acuity: 0.5".to_string(),
        });

        assert_eq!(log.len(), 3);
        assert_eq!(log.events_at_step(0).len(), 2);
        assert_eq!(log.events_of_type("Waited").len(), 1);
        assert_eq!(log.events_for_patient("P1").len(), 2);
        assert_eq!(log.events_for_service_point("referral").len(), 3);
    }
}
