//! Decision Rule Set
//!
//! This module defines the pluggable rule interface used to decide, for
//! every active patient at every step, what to do next and how urgent the
//! patient is.
//!
//! # Overview
//!
//! Each rule is polymorphic over one capability:
//! `score(patient, system) -> (value, explanation)`. New rules are added by
//! implementing [`DecisionRule`] and extending the [`RuleConfig`] factory —
//! never by branching inside the engine. Rule selection, weights, the
//! combination policy, and the discharge gate all come from scenario
//! configuration.
//!
//! # Combination Policies
//!
//! - **WeightedSum**: priority = Σ wᵢ·vᵢ with weights normalized to sum 1
//!   (a zero weight sum is rejected at scenario validation).
//! - **Lexicographic**: rules rank in declared order; the ranking vector is
//!   compared element-wise in the Admit phase.
//!
//! # Degraded Decisions
//!
//! A rule that fails to score (missing attribute, wrong type, unknown
//! category) is recovered locally: its configured default score is
//! substituted, the fallback is recorded in the rationale, and the decision
//! is flagged degraded. The run continues.

use crate::graph::{PathwayGraph, Predicate};
use crate::models::decision::{Action, Decision, ReviewReason, RuleContribution, WaitReason};
use crate::models::state::{PatientView, SystemView};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod attribute;
mod categorical;
mod discharge;
mod waiting;

pub use attribute::AttributeScoreRule;
pub use categorical::CategoricalScoreRule;
pub use discharge::{DischargeCriterion, DischargeSafetyRule};
pub use waiting::WaitingTimeRule;

/// A rule's output for one patient: a value in [0, 1] plus the explanation
/// that ends up in the decision rationale.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleScore {
    pub value: f64,
    pub explanation: String,
}

/// Errors from scoring a single patient. Recovered locally by the rule
/// set (default score + degraded flag); never aborts a run.
#[derive(Debug, Error, PartialEq)]
pub enum RuleEvaluationError {
    #[error("attribute {attribute} missing")]
    MissingAttribute { attribute: String },

    #[error("attribute {attribute} has the wrong type (expected {expected})")]
    WrongAttributeType {
        attribute: String,
        expected: &'static str,
    },

    #[error("attribute {attribute} has unmapped category {category}")]
    UnknownCategory { attribute: String, category: String },
}

/// The scoring capability every rule implements.
///
/// Rules are read-only over immutable views, which is what allows the
/// Evaluate phase to fan out across a worker pool.
pub trait DecisionRule: Send + Sync {
    /// Score one patient against the step's system snapshot
    fn score(
        &self,
        patient: &PatientView,
        system: &SystemView,
    ) -> Result<RuleScore, RuleEvaluationError>;
}

// ============================================================================
// Configuration
// ============================================================================

/// How per-rule values combine into one priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinationPolicy {
    /// Weighted sum of rule values, weights normalized to sum 1
    #[default]
    WeightedSum,

    /// Rules rank in declared order; earlier rules dominate
    Lexicographic,
}

/// Selection of a concrete rule implementation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleConfig {
    /// Min-max normalized numeric attribute (e.g. acuity 1..5)
    AttributeScore {
        attribute: String,
        min: f64,
        max: f64,
        /// Invert so that smaller raw values score higher
        #[serde(default)]
        invert: bool,
    },

    /// Ordinal mapping of a text attribute (e.g. vitals trend)
    CategoricalScore {
        attribute: String,
        mapping: std::collections::HashMap<String, f64>,
    },

    /// Steps waiting at the current service point, saturating at a horizon
    WaitingTime { saturation_steps: usize },
}

/// One configured scoring rule: name, weight, fallback, implementation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRuleConfig {
    /// Name reported in rationales (unique per scenario)
    pub name: String,

    /// Relative weight under WeightedSum; declaration order matters under
    /// Lexicographic
    pub weight: f64,

    /// Score substituted when the rule fails to evaluate
    #[serde(default = "default_fallback_score")]
    pub default_score: f64,

    pub rule: RuleConfig,
}

fn default_fallback_score() -> f64 {
    0.5
}

/// Discharge-safety gate configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DischargeGateConfig {
    /// Safety score in [0, 1] required for early discharge
    pub threshold: f64,

    /// Weighted criteria; each satisfied predicate contributes its weight
    pub criteria: Vec<DischargeCriterionConfig>,
}

/// One weighted discharge criterion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DischargeCriterionConfig {
    /// Label reported in the safety explanation
    pub label: String,

    pub weight: f64,

    pub when: Predicate,
}

/// Complete rule-set configuration for one scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSetConfig {
    pub scoring: Vec<ScoringRuleConfig>,

    #[serde(default)]
    pub combination: CombinationPolicy,

    /// Optional early-discharge gate
    #[serde(default)]
    pub discharge: Option<DischargeGateConfig>,

    /// Flag a patient for review once it has waited this many steps at one
    /// service point without moving
    #[serde(default)]
    pub review_after_steps: Option<usize>,
}

// ============================================================================
// Rule set
// ============================================================================

/// Name the discharge gate reports under in rationales and exports
pub const DISCHARGE_SAFETY_RULE: &str = "discharge_safety";

struct WeightedRule {
    name: String,
    weight: f64,
    default_score: f64,
    rule: Box<dyn DecisionRule>,
}

struct DischargeGate {
    threshold: f64,
    rule: DischargeSafetyRule,
}

/// The configured rule set: evaluates every rule, combines the values, and
/// chooses an action for one patient.
pub struct RuleSet {
    rules: Vec<WeightedRule>,
    combination: CombinationPolicy,
    discharge: Option<DischargeGate>,
    review_after_steps: Option<usize>,
}

impl RuleSet {
    /// Build a rule set from validated configuration.
    ///
    /// Under WeightedSum the weights are normalized to sum 1. Scenario
    /// validation has already rejected empty rule lists and zero weight
    /// sums.
    pub fn from_config(config: &RuleSetConfig) -> Self {
        let weight_sum: f64 = config.scoring.iter().map(|r| r.weight).sum();
        let normalize = config.combination == CombinationPolicy::WeightedSum && weight_sum > 0.0;

        let rules = config
            .scoring
            .iter()
            .map(|sc| WeightedRule {
                name: sc.name.clone(),
                weight: if normalize {
                    sc.weight / weight_sum
                } else {
                    sc.weight
                },
                default_score: sc.default_score,
                rule: build_rule(&sc.rule),
            })
            .collect();

        let discharge = config.discharge.as_ref().map(|gate| DischargeGate {
            threshold: gate.threshold,
            rule: DischargeSafetyRule::new(
                gate.criteria
                    .iter()
                    .map(|c| DischargeCriterion {
                        label: c.label.clone(),
                        weight: c.weight,
                        when: c.when.clone(),
                    })
                    .collect(),
            ),
        });

        Self {
            rules,
            combination: config.combination,
            discharge,
            review_after_steps: config.review_after_steps,
        }
    }

    /// Steps a patient may wait before being flagged for review
    pub fn review_after_steps(&self) -> Option<usize> {
        self.review_after_steps
    }

    /// Evaluate all rules for one patient and produce a decision.
    ///
    /// Read-only against the Collect-phase views; safe to call from the
    /// Evaluate worker pool.
    pub fn decide(
        &self,
        patient: &PatientView,
        system: &SystemView,
        graph: &PathwayGraph,
    ) -> Decision {
        let mut rationale: Vec<RuleContribution> = Vec::with_capacity(self.rules.len() + 1);
        let mut values: Vec<f64> = Vec::with_capacity(self.rules.len());

        for weighted in &self.rules {
            let (value, explanation, fallback) = match weighted.rule.score(patient, system) {
                Ok(score) => (score.value, score.explanation, false),
                Err(err) => (weighted.default_score, err.to_string(), true),
            };
            rationale.push(RuleContribution {
                rule: weighted.name.clone(),
                weight: weighted.weight,
                value,
                explanation,
                fallback,
            });
            values.push(value);
        }

        let (priority, ranking) = match self.combination {
            CombinationPolicy::WeightedSum => {
                let total: f64 = rationale.iter().map(RuleContribution::weighted).sum();
                (total, vec![total])
            }
            CombinationPolicy::Lexicographic => {
                (values.first().copied().unwrap_or(0.0), values.clone())
            }
        };

        let candidates = graph.resolve_transitions(&patient.location, &patient.attributes);

        // Discharge gate: contributes to the rationale with weight zero so
        // the safety score is auditable without shifting the priority.
        let mut discharge_target: Option<String> = None;
        if let Some(gate) = &self.discharge {
            let safety = gate.rule.evaluate(&patient.attributes);
            let cleared = safety.value >= gate.threshold;
            rationale.push(RuleContribution {
                rule: DISCHARGE_SAFETY_RULE.to_string(),
                weight: 0.0,
                value: safety.value,
                explanation: safety.explanation,
                fallback: false,
            });
            if cleared {
                discharge_target = candidates
                    .iter()
                    .find(|p| p.is_exit())
                    .map(|p| p.id().to_string());
            }
        }

        let action = if let Some(target) = discharge_target {
            Action::Discharge { target }
        } else if let Some(first) = candidates.first() {
            Action::Advance {
                target: first.id().to_string(),
            }
        } else if self
            .review_after_steps
            .map_or(false, |limit| patient.wait_steps >= limit)
        {
            Action::FlagForReview {
                reason: ReviewReason::WaitExceeded {
                    steps: patient.wait_steps,
                },
            }
        } else {
            Action::Wait {
                reason: WaitReason::NoEligibleTransition,
            }
        };

        Decision::new(
            patient.id.clone(),
            patient.arrival_step,
            action,
            priority,
            ranking,
            rationale,
        )
    }
}

/// Rule factory: configuration variant → implementation
fn build_rule(config: &RuleConfig) -> Box<dyn DecisionRule> {
    match config {
        RuleConfig::AttributeScore {
            attribute,
            min,
            max,
            invert,
        } => Box::new(AttributeScoreRule::new(attribute.clone(), *min, *max, *invert)),
        RuleConfig::CategoricalScore { attribute, mapping } => {
            Box::new(CategoricalScoreRule::new(attribute.clone(), mapping.clone()))
        }
        RuleConfig::WaitingTime { saturation_steps } => {
            Box::new(WaitingTimeRule::new(*saturation_steps))
        }
    }
}
