//! Patient model
//!
//! Represents a simulated patient moving through the pathway.
//! Each patient has:
//! - An externally assigned identity (from the population/need feed)
//! - A current service point (lookup reference into the pathway graph)
//! - Clinical attributes (attribute name → value, consumed by decision rules)
//! - An arrival step and an append-only history for explainability
//! - A terminal flag, set when the patient reaches an exit service point
//!
//! CRITICAL: history is append-only; no API mutates past entries.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// A clinical attribute value.
///
/// Numeric attributes (e.g. acuity, complexity) feed normalized scoring
/// rules; text attributes (e.g. vitals trend, speciality) feed categorical
/// rules and transition predicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Numeric attribute (stored as f64; integer JSON values deserialize here)
    Number(f64),

    /// Categorical / free-text attribute
    Text(String),
}

impl AttributeValue {
    /// Numeric view of this value, if it is a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            AttributeValue::Text(_) => None,
        }
    }

    /// Text view of this value, if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Number(_) => None,
            AttributeValue::Text(s) => Some(s.as_str()),
        }
    }
}

/// What happened to a patient at a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryAction {
    /// Patient entered the system at the entry service point
    Arrived,

    /// Patient advanced to the recorded service point
    Advanced,

    /// Patient was discharged early to the recorded exit point
    Discharged,

    /// Patient was flagged for manual review while at the recorded point
    FlaggedForReview,
}

/// One append-only history entry: (step, service point, action)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub step: usize,
    pub service_point: String,
    pub action: HistoryAction,
}

/// Errors that can occur during patient operations
#[derive(Debug, Error, PartialEq)]
pub enum PatientError {
    #[error("patient {0} is terminal and cannot be moved")]
    AlreadyTerminal(String),
}

/// Represents a patient traversing the pathway
///
/// # Example
/// ```
/// use pathway_simulator_core_rs::models::patient::{AttributeValue, Patient};
/// use std::collections::HashMap;
///
/// let mut attrs = HashMap::new();
/// attrs.insert("acuity".to_string(), AttributeValue::Number(4.0));
///
/// let patient = Patient::new("P1".to_string(), 0, attrs, "referral".to_string());
/// assert_eq!(patient.location(), "referral");
/// assert_eq!(patient.history().len(), 1); // arrival entry
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    /// Externally assigned identifier (never generated by the engine)
    id: String,

    /// Current service point (lookup reference, not ownership)
    location: String,

    /// Clinical attributes consumed by decision rules and predicates
    attributes: HashMap<String, AttributeValue>,

    /// Step at which the patient arrived in the system
    arrival_step: usize,

    /// Step at which the patient entered the current location
    entered_location_at: usize,

    /// Append-only (step, service point, action) log
    history: Vec<HistoryEntry>,

    /// True once the patient has reached an exit service point
    terminal: bool,

    /// True while the patient is flagged for manual review
    flagged: bool,
}

impl Patient {
    /// Create a new patient placed at the entry service point
    ///
    /// # Arguments
    /// * `id` - External patient identifier
    /// * `arrival_step` - Step of arrival
    /// * `attributes` - Clinical attribute map from the feed
    /// * `entry_point` - Entry service point of the scenario's graph
    pub fn new(
        id: String,
        arrival_step: usize,
        attributes: HashMap<String, AttributeValue>,
        entry_point: String,
    ) -> Self {
        let history = vec![HistoryEntry {
            step: arrival_step,
            service_point: entry_point.clone(),
            action: HistoryAction::Arrived,
        }];

        Self {
            id,
            location: entry_point,
            attributes,
            arrival_step,
            entered_location_at: arrival_step,
            history,
            terminal: false,
            flagged: false,
        }
    }

    /// Restore a patient from checkpoint data, all fields preserved
    #[allow(clippy::too_many_arguments)]
    pub fn from_snapshot(
        id: String,
        location: String,
        attributes: HashMap<String, AttributeValue>,
        arrival_step: usize,
        entered_location_at: usize,
        history: Vec<HistoryEntry>,
        terminal: bool,
        flagged: bool,
    ) -> Self {
        Self {
            id,
            location,
            attributes,
            arrival_step,
            entered_location_at,
            history,
            terminal,
            flagged,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current service point ID
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn attributes(&self) -> &HashMap<String, AttributeValue> {
        &self.attributes
    }

    /// Look up a single attribute
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    pub fn arrival_step(&self) -> usize {
        self.arrival_step
    }

    /// Step at which the patient entered the current location
    pub fn entered_location_at(&self) -> usize {
        self.entered_location_at
    }

    /// Steps the patient has spent at the current location as of `step`
    pub fn wait_steps(&self, step: usize) -> usize {
        step.saturating_sub(self.entered_location_at)
    }

    /// Full append-only history
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn is_flagged(&self) -> bool {
        self.flagged
    }

    // ========================================================================
    // Mutation (serialized per patient by the orchestrator)
    // ========================================================================

    /// Move the patient to `target`, appending a history entry
    ///
    /// # Arguments
    /// * `target` - Target service point ID
    /// * `step` - Current step
    /// * `action` - `Advanced` or `Discharged`
    /// * `terminal` - Whether `target` is an exit point
    pub fn advance(
        &mut self,
        target: String,
        step: usize,
        action: HistoryAction,
        terminal: bool,
    ) -> Result<(), PatientError> {
        if self.terminal {
            return Err(PatientError::AlreadyTerminal(self.id.clone()));
        }

        self.history.push(HistoryEntry {
            step,
            service_point: target.clone(),
            action,
        });
        self.location = target;
        self.entered_location_at = step;
        self.terminal = terminal;
        // A move clears any standing review flag
        self.flagged = false;
        Ok(())
    }

    /// Flag the patient for manual review at its current location
    pub fn flag_for_review(&mut self, step: usize) {
        if !self.flagged {
            self.history.push(HistoryEntry {
                step,
                service_point: self.location.clone(),
                action: HistoryAction::FlaggedForReview,
            });
            self.flagged = true;
        }
    }
}
