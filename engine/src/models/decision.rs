//! Decision output record
//!
//! A `Decision` is what the rule set produces for one patient at one step:
//! the chosen action, a numeric priority, a ranking vector used for
//! deterministic ordering in the Admit phase, and a mandatory rationale
//! listing every contributing rule.
//!
//! # Critical Invariants
//!
//! 1. **Non-empty rationale**: every decision explains itself; constructing
//!    a decision without contributions is a programmer error.
//! 2. **Total ordering**: `admit_order` never falls back to unspecified
//!    ordering. Ties on the ranking vector break by arrival step, then by
//!    patient ID.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Action chosen for a patient at one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Action {
    /// Move to the target service point (subject to admission control)
    Advance { target: String },

    /// Remain at the current service point
    Wait { reason: WaitReason },

    /// Early discharge to the target exit point (discharge-safety gate)
    Discharge { target: String },

    /// Remain in place, flagged for manual review
    FlagForReview { reason: ReviewReason },
}

impl Action {
    /// Short label used in export records
    pub fn label(&self) -> &'static str {
        match self {
            Action::Advance { .. } => "advance",
            Action::Wait { .. } => "wait",
            Action::Discharge { .. } => "discharge",
            Action::FlagForReview { .. } => "flagged-for-review",
        }
    }
}

/// Why a patient is waiting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum WaitReason {
    /// Admission control denied the move: the target's period capacity is used up
    CapacityExhausted { service_point: String },

    /// No outbound transition's eligibility predicate matched
    NoEligibleTransition,
}

/// Why a patient is flagged for review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ReviewReason {
    /// Patient has waited at one service point beyond the configured limit
    WaitExceeded { steps: usize },
}

/// One rule's contribution to a decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleContribution {
    /// Rule name as configured in the scenario
    pub rule: String,

    /// Weight applied to this rule's value
    pub weight: f64,

    /// The rule's raw score in [0, 1]
    pub value: f64,

    /// Human-readable explanation produced by the rule
    pub explanation: String,

    /// True when the configured default score was substituted after a
    /// rule evaluation failure
    pub fallback: bool,
}

impl RuleContribution {
    /// Weighted contribution to the combined priority
    pub fn weighted(&self) -> f64 {
        self.weight * self.value
    }
}

/// Decision for one patient at one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Patient this decision applies to
    pub patient_id: String,

    /// Patient arrival step (tie-break key)
    pub arrival_step: usize,

    /// Chosen action
    pub action: Action,

    /// Headline priority score (weighted sum, or the leading ranking
    /// component under lexicographic combination)
    pub priority: f64,

    /// Ranking vector compared element-wise in the Admit phase.
    /// Weighted-sum combination produces a single element; lexicographic
    /// combination produces one element per rule in declared order.
    pub ranking: Vec<f64>,

    /// Ordered contributions, one per configured rule (never empty)
    pub rationale: Vec<RuleContribution>,

    /// True when any contribution fell back to its default score
    pub degraded: bool,
}

impl Decision {
    /// Create a decision
    ///
    /// # Panics
    /// Panics if `rationale` is empty — every decision must explain itself.
    pub fn new(
        patient_id: String,
        arrival_step: usize,
        action: Action,
        priority: f64,
        ranking: Vec<f64>,
        rationale: Vec<RuleContribution>,
    ) -> Self {
        assert!(!rationale.is_empty(), "decision rationale must not be empty");
        let degraded = rationale.iter().any(|c| c.fallback);
        Self {
            patient_id,
            arrival_step,
            action,
            priority,
            ranking,
            rationale,
            degraded,
        }
    }

    /// Deterministic Admit-phase ordering: higher ranking first, then
    /// earlier arrival, then patient ID.
    pub fn admit_order(a: &Decision, b: &Decision) -> Ordering {
        let len = a.ranking.len().max(b.ranking.len());
        for i in 0..len {
            let av = a.ranking.get(i).copied().unwrap_or(0.0);
            let bv = b.ranking.get(i).copied().unwrap_or(0.0);
            match bv.total_cmp(&av) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        a.arrival_step
            .cmp(&b.arrival_step)
            .then_with(|| a.patient_id.cmp(&b.patient_id))
    }

    /// Compact one-line rationale for event records and exports
    pub fn rationale_summary(&self) -> String {
        self.rationale
            .iter()
            .map(|c| {
                if c.fallback {
                    format!("{}: fallback {:.3} ({})", c.rule, c.value, c.explanation)
                } else {
                    format!("{}: {:.3}×{:.2} ({})", c.rule, c.value, c.weight, c.explanation)
                }
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}
