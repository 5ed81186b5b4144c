//! Discharge safety scoring
//!
//! The discharge gate asks a different question than prioritization: not
//! "how urgent is this patient" but "is it safe to send them home early".
//! It is scored as a weighted fraction of satisfied criteria, each a pure
//! predicate over the patient's attributes, and compared against the
//! scenario's threshold.
//!
//! Predicates are total (a missing attribute fails the criterion), so the
//! safety score itself never degrades — an unknown is treated as unsafe,
//! which is the conservative reading for a discharge decision.

use super::RuleScore;
use crate::graph::Predicate;
use crate::models::patient::AttributeValue;
use std::collections::HashMap;

/// One weighted discharge criterion
#[derive(Debug, Clone)]
pub struct DischargeCriterion {
    /// Label reported in the safety explanation
    pub label: String,

    pub weight: f64,

    pub when: Predicate,
}

/// Weighted discharge-safety score over configured criteria
pub struct DischargeSafetyRule {
    criteria: Vec<DischargeCriterion>,
}

impl DischargeSafetyRule {
    pub fn new(criteria: Vec<DischargeCriterion>) -> Self {
        Self { criteria }
    }

    /// Score an attribute map: Σ satisfied weights / Σ weights.
    ///
    /// An empty criteria list scores 0.0 — nothing vouches for safety.
    pub fn evaluate(&self, attributes: &HashMap<String, AttributeValue>) -> RuleScore {
        let total: f64 = self.criteria.iter().map(|c| c.weight).sum();
        if total <= 0.0 {
            return RuleScore {
                value: 0.0,
                explanation: "no discharge criteria configured".to_string(),
            };
        }

        let mut satisfied_weight = 0.0;
        let mut satisfied: Vec<&str> = Vec::new();
        let mut unsatisfied: Vec<&str> = Vec::new();
        for criterion in &self.criteria {
            if criterion.when.matches(attributes) {
                satisfied_weight += criterion.weight;
                satisfied.push(criterion.label.as_str());
            } else {
                unsatisfied.push(criterion.label.as_str());
            }
        }

        let value = satisfied_weight / total;
        let explanation = format!(
            "safety {:.2}: met [{}], unmet [{}]",
            value,
            satisfied.join(", "),
            unsatisfied.join(", ")
        );
        RuleScore { value, explanation }
    }
}
