//! Arrival feed
//!
//! The engine does not generate patients: arrivals come from an external
//! population/need model as a plain sequence of
//! `(patient_id, arrival_step, attribute map)` records. This module
//! validates the feed, orders it deterministically, and hands the
//! orchestrator the records due at each step.

use crate::models::patient::AttributeValue;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;

/// Errors in the external arrival feed
#[derive(Debug, Error, PartialEq)]
pub enum FeedError {
    #[error("duplicate patient {0} in arrival feed")]
    DuplicatePatient(String),
}

/// One arrival record from the population/need feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrivalRecord {
    pub patient_id: String,

    pub arrival_step: usize,

    #[serde(default)]
    pub attributes: HashMap<String, AttributeValue>,
}

/// Validated, deterministically ordered arrival schedule
///
/// # Example
///
/// ```rust
/// use pathway_simulator_core_rs::arrivals::{ArrivalRecord, ArrivalSchedule};
/// use std::collections::HashMap;
///
/// let records = vec![
///     ArrivalRecord { patient_id: "P2".to_string(), arrival_step: 1, attributes: HashMap::new() },
///     ArrivalRecord { patient_id: "P1".to_string(), arrival_step: 0, attributes: HashMap::new() },
/// ];
///
/// let mut schedule = ArrivalSchedule::new(records).unwrap();
/// assert_eq!(schedule.drain_due(0).len(), 1);
/// assert_eq!(schedule.remaining(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ArrivalSchedule {
    /// Records ordered by (arrival step, patient ID)
    pending: VecDeque<ArrivalRecord>,
}

impl ArrivalSchedule {
    /// Validate and order a feed.
    ///
    /// Rejects duplicate patient IDs; sorts by (arrival step, patient ID)
    /// so feed file order never influences simulation order.
    pub fn new(mut records: Vec<ArrivalRecord>) -> Result<Self, FeedError> {
        let mut seen: HashSet<&str> = HashSet::new();
        for record in &records {
            if !seen.insert(record.patient_id.as_str()) {
                return Err(FeedError::DuplicatePatient(record.patient_id.clone()));
            }
        }

        records.sort_by(|a, b| {
            a.arrival_step
                .cmp(&b.arrival_step)
                .then_with(|| a.patient_id.cmp(&b.patient_id))
        });
        Ok(Self {
            pending: records.into(),
        })
    }

    /// Pop every record due at or before `step`
    pub fn drain_due(&mut self, step: usize) -> Vec<ArrivalRecord> {
        let mut due = Vec::new();
        while self
            .pending
            .front()
            .map_or(false, |r| r.arrival_step <= step)
        {
            due.push(self.pending.pop_front().unwrap());
        }
        due
    }

    /// Drop records arriving before `step` (checkpoint restoration: those
    /// patients are already in the restored store)
    pub fn skip_before(&mut self, step: usize) {
        while self
            .pending
            .front()
            .map_or(false, |r| r.arrival_step < step)
        {
            self.pending.pop_front();
        }
    }

    /// Number of records not yet drained
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Step of the next pending arrival, if any
    pub fn next_arrival_step(&self) -> Option<usize> {
        self.pending.front().map(|r| r.arrival_step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, step: usize) -> ArrivalRecord {
        ArrivalRecord {
            patient_id: id.to_string(),
            arrival_step: step,
            attributes: HashMap::new(),
        }
    }

    #[test]
    fn test_duplicate_patient_rejected() {
        let result = ArrivalSchedule::new(vec![record("P1", 0), record("P1", 3)]);
        assert_eq!(result.err(), Some(FeedError::DuplicatePatient("P1".to_string())));
    }

    #[test]
    fn test_drain_is_ordered_by_step_then_id() {
        let mut schedule =
            ArrivalSchedule::new(vec![record("P3", 1), record("P2", 0), record("P1", 0)]).unwrap();

        let due: Vec<String> = schedule
            .drain_due(0)
            .into_iter()
            .map(|r| r.patient_id)
            .collect();
        assert_eq!(due, vec!["P1".to_string(), "P2".to_string()]);
        assert_eq!(schedule.next_arrival_step(), Some(1));
    }

    #[test]
    fn test_drain_catches_up_past_steps() {
        let mut schedule = ArrivalSchedule::new(vec![record("P1", 0), record("P2", 2)]).unwrap();
        let due = schedule.drain_due(5);
        assert_eq!(due.len(), 2);
        assert_eq!(schedule.remaining(), 0);
    }

    #[test]
    fn test_skip_before() {
        let mut schedule =
            ArrivalSchedule::new(vec![record("P1", 0), record("P2", 2), record("P3", 4)]).unwrap();
        schedule.skip_before(2);
        assert_eq!(schedule.remaining(), 2);
        assert_eq!(schedule.next_arrival_step(), Some(2));
    }
}
