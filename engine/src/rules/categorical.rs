//! Categorical attribute scoring
//!
//! Maps a text attribute onto an ordinal urgency value, e.g. vitals trend:
//! Deteriorating 1.0 > Stable 0.5 > Improving 0.0. An unmapped category is
//! a rule evaluation error, recovered upstream via the configured default.

use super::{DecisionRule, RuleEvaluationError, RuleScore};
use crate::models::patient::AttributeValue;
use crate::models::state::{PatientView, SystemView};
use std::collections::HashMap;

/// Ordinal mapping of a text attribute
pub struct CategoricalScoreRule {
    attribute: String,
    mapping: HashMap<String, f64>,
}

impl CategoricalScoreRule {
    pub fn new(attribute: String, mapping: HashMap<String, f64>) -> Self {
        Self { attribute, mapping }
    }
}

impl DecisionRule for CategoricalScoreRule {
    fn score(
        &self,
        patient: &PatientView,
        _system: &SystemView,
    ) -> Result<RuleScore, RuleEvaluationError> {
        let category = match patient.attributes.get(&self.attribute) {
            None => {
                return Err(RuleEvaluationError::MissingAttribute {
                    attribute: self.attribute.clone(),
                })
            }
            Some(AttributeValue::Number(_)) => {
                return Err(RuleEvaluationError::WrongAttributeType {
                    attribute: self.attribute.clone(),
                    expected: "text",
                })
            }
            Some(value) => value.as_text().unwrap(),
        };

        match self.mapping.get(category) {
            Some(value) => Ok(RuleScore {
                value: *value,
                explanation: format!("{}={} scored {:.2}", self.attribute, category, value),
            }),
            None => Err(RuleEvaluationError::UnknownCategory {
                attribute: self.attribute.clone(),
                category: category.to_string(),
            }),
        }
    }
}
