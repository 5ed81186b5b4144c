//! Numeric attribute scoring
//!
//! Min-max normalizes a numeric clinical attribute (e.g. complexity, or
//! acuity on a 1..5 scale) into [0, 1]. A constant configured range scores
//! 0.5 for every patient, so a degenerate scale neither boosts nor buries
//! anyone.

use super::{DecisionRule, RuleEvaluationError, RuleScore};
use crate::models::patient::AttributeValue;
use crate::models::state::{PatientView, SystemView};

/// Min-max normalized numeric attribute rule
///
/// # Example
///
/// ```
/// use pathway_simulator_core_rs::rules::{AttributeScoreRule, DecisionRule};
/// # use pathway_simulator_core_rs::models::state::{PatientView, SystemView};
/// # use pathway_simulator_core_rs::models::patient::AttributeValue;
/// # use std::collections::HashMap;
///
/// let rule = AttributeScoreRule::new("acuity".to_string(), 1.0, 5.0, false);
/// # let mut attributes = HashMap::new();
/// # attributes.insert("acuity".to_string(), AttributeValue::Number(5.0));
/// # let patient = PatientView {
/// #     id: "P1".to_string(),
/// #     location: "triage".to_string(),
/// #     attributes,
/// #     arrival_step: 0,
/// #     wait_steps: 0,
/// #     terminal: false,
/// #     flagged: false,
/// # };
/// # let system = SystemView::new(0, 0, HashMap::new(), HashMap::new());
/// let score = rule.score(&patient, &system).unwrap();
/// assert_eq!(score.value, 1.0); // acuity 5 on a 1..5 scale
/// ```
pub struct AttributeScoreRule {
    attribute: String,
    min: f64,
    max: f64,
    invert: bool,
}

impl AttributeScoreRule {
    pub fn new(attribute: String, min: f64, max: f64, invert: bool) -> Self {
        Self {
            attribute,
            min,
            max,
            invert,
        }
    }
}

impl DecisionRule for AttributeScoreRule {
    fn score(
        &self,
        patient: &PatientView,
        _system: &SystemView,
    ) -> Result<RuleScore, RuleEvaluationError> {
        let raw = match patient.attributes.get(&self.attribute) {
            None => {
                return Err(RuleEvaluationError::MissingAttribute {
                    attribute: self.attribute.clone(),
                })
            }
            Some(AttributeValue::Text(_)) => {
                return Err(RuleEvaluationError::WrongAttributeType {
                    attribute: self.attribute.clone(),
                    expected: "number",
                })
            }
            Some(value) => value.as_number().unwrap(),
        };

        // Constant range: every patient scores 0.5
        let normalized = if self.max == self.min {
            0.5
        } else {
            ((raw - self.min) / (self.max - self.min)).clamp(0.0, 1.0)
        };
        let value = if self.invert { 1.0 - normalized } else { normalized };

        Ok(RuleScore {
            value,
            explanation: format!("{}={} normalized to {:.3}", self.attribute, raw, value),
        })
    }
}
