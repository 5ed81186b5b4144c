//! Integration tests for the decision rule set
//!
//! Covers combination policies, fallback handling, the discharge gate, and
//! the action selection logic that feeds the Admit phase.

use pathway_simulator_core_rs::models::patient::AttributeValue;
use pathway_simulator_core_rs::models::state::{PatientView, SystemView};
use pathway_simulator_core_rs::rules::{
    CombinationPolicy, DischargeCriterionConfig, DischargeGateConfig, RuleConfig, RuleSet,
    RuleSetConfig, ScoringRuleConfig, DISCHARGE_SAFETY_RULE,
};
use pathway_simulator_core_rs::{Action, PathwayGraph, Predicate, ServicePoint, Transition, WaitReason};
use std::collections::HashMap;

fn patient(id: &str, location: &str, attrs: &[(&str, AttributeValue)], wait: usize) -> PatientView {
    PatientView {
        id: id.to_string(),
        location: location.to_string(),
        attributes: attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
        arrival_step: 0,
        wait_steps: wait,
        terminal: false,
        flagged: false,
    }
}

fn system() -> SystemView {
    SystemView::new(0, 0, HashMap::new(), HashMap::new())
}

fn linear_graph() -> PathwayGraph {
    PathwayGraph::new(
        vec![
            ServicePoint::new(
                "ward".to_string(),
                "ward".to_string(),
                Some(4),
                false,
                vec![Transition {
                    target: "exit".to_string(),
                    when: Predicate::Always,
                }],
            ),
            ServicePoint::new(
                "isolated".to_string(),
                "isolated".to_string(),
                Some(4),
                false,
                vec![],
            ),
            ServicePoint::new(
                "exit".to_string(),
                "discharged".to_string(),
                None,
                true,
                vec![],
            ),
        ],
        "ward".to_string(),
    )
}

fn mcda_config() -> RuleSetConfig {
    let mut vitals = HashMap::new();
    vitals.insert("Deteriorating".to_string(), 1.0);
    vitals.insert("Stable".to_string(), 0.5);
    vitals.insert("Improving".to_string(), 0.0);

    RuleSetConfig {
        scoring: vec![
            ScoringRuleConfig {
                name: "complexity".to_string(),
                weight: 0.5,
                default_score: 0.5,
                rule: RuleConfig::AttributeScore {
                    attribute: "complexity".to_string(),
                    min: 0.0,
                    max: 10.0,
                    invert: false,
                },
            },
            ScoringRuleConfig {
                name: "acuity".to_string(),
                weight: 0.35,
                default_score: 0.5,
                rule: RuleConfig::AttributeScore {
                    attribute: "acuity".to_string(),
                    min: 1.0,
                    max: 5.0,
                    invert: false,
                },
            },
            ScoringRuleConfig {
                name: "vitals".to_string(),
                weight: 0.15,
                default_score: 0.5,
                rule: RuleConfig::CategoricalScore {
                    attribute: "vitals_trend".to_string(),
                    mapping: vitals,
                },
            },
        ],
        combination: CombinationPolicy::WeightedSum,
        discharge: None,
        review_after_steps: None,
    }
}

#[test]
fn test_weighted_sum_priority() {
    let rule_set = RuleSet::from_config(&mcda_config());
    let view = patient(
        "P1",
        "ward",
        &[
            ("complexity", AttributeValue::Number(10.0)),
            ("acuity", AttributeValue::Number(5.0)),
            ("vitals_trend", AttributeValue::Text("Deteriorating".to_string())),
        ],
        0,
    );

    let decision = rule_set.decide(&view, &system(), &linear_graph());

    // Every component maxed: weights normalize to 1.0 total
    assert!((decision.priority - 1.0).abs() < 1e-9);
    assert_eq!(decision.ranking.len(), 1);
    assert_eq!(decision.rationale.len(), 3);
    assert!(!decision.degraded);
}

#[test]
fn test_weighted_sum_respects_weights() {
    let rule_set = RuleSet::from_config(&mcda_config());
    // Only complexity is high: priority = 0.5 weight share
    let view = patient(
        "P1",
        "ward",
        &[
            ("complexity", AttributeValue::Number(10.0)),
            ("acuity", AttributeValue::Number(1.0)),
            ("vitals_trend", AttributeValue::Text("Improving".to_string())),
        ],
        0,
    );

    let decision = rule_set.decide(&view, &system(), &linear_graph());
    assert!((decision.priority - 0.5).abs() < 1e-9);
}

#[test]
fn test_missing_attribute_falls_back_and_flags_degraded() {
    let rule_set = RuleSet::from_config(&mcda_config());
    let view = patient(
        "P1",
        "ward",
        &[("complexity", AttributeValue::Number(5.0))],
        0,
    );

    let decision = rule_set.decide(&view, &system(), &linear_graph());

    assert!(decision.degraded);
    let acuity = decision
        .rationale
        .iter()
        .find(|c| c.rule == "acuity")
        .unwrap();
    assert!(acuity.fallback);
    assert_eq!(acuity.value, 0.5); // configured default
    assert!(acuity.explanation.contains("missing"));
    // The run continues: a normal action was still chosen
    assert!(matches!(decision.action, Action::Advance { .. }));
}

#[test]
fn test_lexicographic_ranking_vector() {
    let mut config = mcda_config();
    config.combination = CombinationPolicy::Lexicographic;
    let rule_set = RuleSet::from_config(&config);

    let view = patient(
        "P1",
        "ward",
        &[
            ("complexity", AttributeValue::Number(5.0)),
            ("acuity", AttributeValue::Number(5.0)),
            ("vitals_trend", AttributeValue::Text("Stable".to_string())),
        ],
        0,
    );

    let decision = rule_set.decide(&view, &system(), &linear_graph());

    // One ranking component per rule, in declared order
    assert_eq!(decision.ranking.len(), 3);
    assert!((decision.ranking[0] - 0.5).abs() < 1e-9); // complexity 5/10
    assert!((decision.ranking[1] - 1.0).abs() < 1e-9); // acuity 5/5
    assert!((decision.ranking[2] - 0.5).abs() < 1e-9); // stable vitals
    assert_eq!(decision.priority, decision.ranking[0]);
}

#[test]
fn test_no_eligible_transition_waits() {
    let rule_set = RuleSet::from_config(&mcda_config());
    let view = patient(
        "P1",
        "isolated",
        &[
            ("complexity", AttributeValue::Number(5.0)),
            ("acuity", AttributeValue::Number(3.0)),
            ("vitals_trend", AttributeValue::Text("Stable".to_string())),
        ],
        0,
    );

    let decision = rule_set.decide(&view, &system(), &linear_graph());
    assert_eq!(
        decision.action,
        Action::Wait {
            reason: WaitReason::NoEligibleTransition
        }
    );
}

#[test]
fn test_stuck_patient_is_flagged_after_review_limit() {
    let mut config = mcda_config();
    config.review_after_steps = Some(3);
    let rule_set = RuleSet::from_config(&config);

    let stuck = patient("P1", "isolated", &[("complexity", AttributeValue::Number(5.0))], 4);
    let fresh = patient("P2", "isolated", &[("complexity", AttributeValue::Number(5.0))], 1);

    let flagged = rule_set.decide(&stuck, &system(), &linear_graph());
    let waiting = rule_set.decide(&fresh, &system(), &linear_graph());

    assert!(matches!(flagged.action, Action::FlagForReview { .. }));
    assert!(matches!(waiting.action, Action::Wait { .. }));
}

#[test]
fn test_discharge_gate_routes_to_exit() {
    let mut config = mcda_config();
    config.discharge = Some(DischargeGateConfig {
        threshold: 0.8,
        criteria: vec![DischargeCriterionConfig {
            label: "low acuity".to_string(),
            weight: 1.0,
            when: Predicate::NumberBelow {
                attribute: "acuity".to_string(),
                threshold: 2.0,
            },
        }],
    });
    let rule_set = RuleSet::from_config(&config);

    let safe = patient(
        "P1",
        "ward",
        &[
            ("complexity", AttributeValue::Number(1.0)),
            ("acuity", AttributeValue::Number(1.0)),
            ("vitals_trend", AttributeValue::Text("Improving".to_string())),
        ],
        0,
    );
    let unsafe_patient = patient(
        "P2",
        "ward",
        &[
            ("complexity", AttributeValue::Number(1.0)),
            ("acuity", AttributeValue::Number(5.0)),
            ("vitals_trend", AttributeValue::Text("Stable".to_string())),
        ],
        0,
    );

    let discharge = rule_set.decide(&safe, &system(), &linear_graph());
    let advance = rule_set.decide(&unsafe_patient, &system(), &linear_graph());

    assert_eq!(
        discharge.action,
        Action::Discharge {
            target: "exit".to_string()
        }
    );
    assert!(matches!(advance.action, Action::Advance { .. }));

    // Gate score is auditable in the rationale with zero priority weight
    let gate = discharge
        .rationale
        .iter()
        .find(|c| c.rule == DISCHARGE_SAFETY_RULE)
        .unwrap();
    assert_eq!(gate.weight, 0.0);
    assert_eq!(gate.value, 1.0);
}

#[test]
fn test_rationale_is_never_empty() {
    let rule_set = RuleSet::from_config(&mcda_config());
    // No attributes at all: every rule falls back, rationale still present
    let view = patient("P1", "ward", &[], 0);

    let decision = rule_set.decide(&view, &system(), &linear_graph());
    assert!(!decision.rationale.is_empty());
    assert!(decision.degraded);
}
