//! End-to-end orchestrator tests
//!
//! Exercises the worked admission-control example, the tie-break law,
//! the capacity invariant, degraded decisions, the discharge gate, review
//! flagging, and the structured exports.

use pathway_simulator_core_rs::rules::{
    CombinationPolicy, DischargeCriterionConfig, DischargeGateConfig, RuleConfig, RuleSetConfig,
    ScoringRuleConfig,
};
use pathway_simulator_core_rs::{
    early_discharge_flags, export_events, investment_recommendations, prioritisation_list,
    ArrivalRecord, AttributeValue, Event, Orchestrator, Predicate, RolloverPolicy, RunOutcome,
    ScenarioConfig, ServicePointConfig, TransitionConfig,
};
use std::collections::HashMap;

fn acuity_rules() -> RuleSetConfig {
    RuleSetConfig {
        scoring: vec![ScoringRuleConfig {
            name: "acuity".to_string(),
            weight: 1.0,
            default_score: 0.5,
            rule: RuleConfig::AttributeScore {
                attribute: "acuity".to_string(),
                min: 1.0,
                max: 5.0,
                invert: false,
            },
        }],
        combination: CombinationPolicy::WeightedSum,
        discharge: None,
        review_after_steps: None,
    }
}

/// referral (uncapacitated) → triage (capacitated) → exit
fn triage_scenario(triage_capacity: u32) -> ScenarioConfig {
    ScenarioConfig {
        description: String::new(),
        service_points: vec![
            ServicePointConfig {
                id: "referral".to_string(),
                activity: String::new(),
                capacity: None,
                exit: false,
                transitions: vec![TransitionConfig {
                    target: "triage".to_string(),
                    when: Predicate::Always,
                }],
            },
            ServicePointConfig {
                id: "triage".to_string(),
                activity: String::new(),
                capacity: Some(triage_capacity),
                exit: false,
                transitions: vec![TransitionConfig {
                    target: "exit".to_string(),
                    when: Predicate::Always,
                }],
            },
            ServicePointConfig {
                id: "exit".to_string(),
                activity: "discharged".to_string(),
                capacity: None,
                exit: true,
                transitions: vec![],
            },
        ],
        entry_point: "referral".to_string(),
        steps_per_period: 1,
        horizon: 60,
        rollover: RolloverPolicy::Reset,
        rules: acuity_rules(),
        capacity_deltas: HashMap::new(),
        workers: 1,
    }
}

fn arrival(id: &str, step: usize, acuity: f64) -> ArrivalRecord {
    let mut attributes = HashMap::new();
    attributes.insert("acuity".to_string(), AttributeValue::Number(acuity));
    ArrivalRecord {
        patient_id: id.to_string(),
        arrival_step: step,
        attributes,
    }
}

#[test]
fn test_worked_example_three_patients_capacity_two() {
    // 3 patients arrive at t=0 needing triage (capacity 2).
    // Evaluate ranks [P1, P2, P3]; Admit grants P1 and P2, denies P3;
    // at t=1 P3 is re-evaluated and admitted.
    let mut orchestrator = Orchestrator::new(
        triage_scenario(2),
        vec![
            arrival("P1", 0, 5.0),
            arrival("P2", 0, 4.0),
            arrival("P3", 0, 3.0),
        ],
    )
    .unwrap();

    let step0 = orchestrator.step().unwrap();
    assert_eq!(step0.num_arrivals, 3);
    assert_eq!(step0.num_admitted, 2);
    assert_eq!(step0.num_waiting, 1);
    assert_eq!(orchestrator.store().get("P1").unwrap().location(), "triage");
    assert_eq!(orchestrator.store().get("P2").unwrap().location(), "triage");
    assert_eq!(orchestrator.store().get("P3").unwrap().location(), "referral");

    let step1 = orchestrator.step().unwrap();
    // P3 admitted to triage; P1 and P2 complete their pathway to the exit
    assert_eq!(orchestrator.store().get("P3").unwrap().location(), "triage");
    assert!(step1.num_admitted >= 1);
}

#[test]
fn test_tie_break_earlier_arrival_wins() {
    // C takes the step-0 slot; A (arrived 0) and B (arrived 1) then compete
    // at step 1 with identical scores — the earlier arrival must win.
    let mut orchestrator = Orchestrator::new(
        triage_scenario(1),
        vec![
            arrival("C", 0, 5.0),
            arrival("A", 0, 3.0),
            arrival("B", 1, 3.0),
        ],
    )
    .unwrap();

    orchestrator.step().unwrap(); // C admitted, A denied
    assert_eq!(orchestrator.store().get("A").unwrap().location(), "referral");

    orchestrator.step().unwrap(); // A vs B, equal scores
    assert_eq!(orchestrator.store().get("A").unwrap().location(), "triage");
    assert_eq!(orchestrator.store().get("B").unwrap().location(), "referral");

    orchestrator.step().unwrap();
    assert_eq!(orchestrator.store().get("B").unwrap().location(), "triage");
}

#[test]
fn test_admissions_never_exceed_capacity() {
    let mut scenario = triage_scenario(2);
    scenario.steps_per_period = 2;

    let feed: Vec<ArrivalRecord> = (0..9)
        .map(|i| arrival(&format!("P{i}"), 0, 1.0 + (i % 5) as f64))
        .collect();

    let mut orchestrator = Orchestrator::new(scenario, feed).unwrap();
    orchestrator.run().unwrap();

    // Count committed admissions into triage per period
    let mut per_period: HashMap<usize, usize> = HashMap::new();
    for event in orchestrator.event_log().events() {
        if let Event::Admitted { step, to, .. } = event {
            if to == "triage" {
                *per_period.entry(step / 2).or_insert(0) += 1;
            }
        }
    }

    assert!(!per_period.is_empty());
    for (&period, &count) in &per_period {
        assert!(
            count <= 2,
            "period {period} admitted {count} patients into capacity 2"
        );
    }
}

#[test]
fn test_degraded_decision_logs_fallback_and_continues() {
    // P-missing has no acuity attribute: its rule falls back, the run
    // continues, and the fallback is logged
    let mut orchestrator = Orchestrator::new(
        triage_scenario(5),
        vec![
            arrival("P1", 0, 4.0),
            ArrivalRecord {
                patient_id: "P-missing".to_string(),
                arrival_step: 0,
                attributes: HashMap::new(),
            },
        ],
    )
    .unwrap();

    let outcome = orchestrator.run().unwrap();
    assert!(matches!(outcome, RunOutcome::Completed { .. }));
    assert!(orchestrator.store().get("P-missing").unwrap().is_terminal());

    let fallbacks = orchestrator.event_log().events_of_type("RuleFallback");
    assert!(!fallbacks.is_empty());
    assert_eq!(fallbacks[0].patient_id(), Some("P-missing"));
}

#[test]
fn test_capacity_starved_patient_is_flagged_for_review() {
    let mut scenario = triage_scenario(0); // nothing ever admitted
    scenario.rules.review_after_steps = Some(3);
    scenario.horizon = 8;

    let mut orchestrator =
        Orchestrator::new(scenario, vec![arrival("P1", 0, 4.0)]).unwrap();
    let outcome = orchestrator.run().unwrap();

    assert!(matches!(outcome, RunOutcome::HorizonReached { .. }));
    assert!(orchestrator.store().get("P1").unwrap().is_flagged());

    let flagged = orchestrator.event_log().events_of_type("FlaggedForReview");
    assert!(!flagged.is_empty());
    // Waits were logged before the flag threshold was crossed
    assert!(!orchestrator.event_log().events_of_type("Waited").is_empty());
}

#[test]
fn test_discharge_gate_end_to_end() {
    let mut scenario = triage_scenario(5);
    // Allow early discharge straight from triage for low-acuity patients
    scenario.rules.discharge = Some(DischargeGateConfig {
        threshold: 1.0,
        criteria: vec![DischargeCriterionConfig {
            label: "low acuity".to_string(),
            weight: 1.0,
            when: Predicate::NumberBelow {
                attribute: "acuity".to_string(),
                threshold: 2.0,
            },
        }],
    });

    let mut orchestrator =
        Orchestrator::new(scenario, vec![arrival("P1", 0, 1.0)]).unwrap();
    orchestrator.run().unwrap();

    let discharges = orchestrator.event_log().events_of_type("Discharged");
    assert_eq!(discharges.len(), 1);
    let patient = orchestrator.store().get("P1").unwrap();
    assert!(patient.is_terminal());
}

#[test]
fn test_partial_results_retained_at_horizon() {
    let mut scenario = triage_scenario(1);
    scenario.horizon = 2;

    let mut orchestrator = Orchestrator::new(
        scenario,
        vec![arrival("P1", 0, 5.0), arrival("P2", 0, 4.0), arrival("P3", 0, 3.0)],
    )
    .unwrap();

    let outcome = orchestrator.run().unwrap();
    assert!(matches!(
        outcome,
        RunOutcome::HorizonReached { steps: 2, .. }
    ));

    // Everything committed up to the horizon is still there
    assert_eq!(orchestrator.store().num_patients(), 3);
    assert!(orchestrator.event_count() > 0);
    assert_eq!(
        orchestrator.event_log().events_of_type("HorizonReached").len(),
        1
    );
}

#[test]
fn test_event_export_records() {
    let mut orchestrator = Orchestrator::new(
        triage_scenario(2),
        vec![arrival("P1", 0, 5.0), arrival("P2", 0, 4.0), arrival("P3", 0, 3.0)],
    )
    .unwrap();
    orchestrator.run().unwrap();

    let records = export_events(orchestrator.event_log());
    assert!(!records.is_empty());

    // Every non-arrival action record carries a rationale
    for record in &records {
        if record.action != "arrival" {
            assert!(
                !record.rationale.is_empty(),
                "record for {} action {} lacks rationale",
                record.patient_id,
                record.action
            );
        }
    }
}

#[test]
fn test_prioritisation_list_ranked_per_service_point() {
    let mut scenario = triage_scenario(0); // everyone stuck at referral
    scenario.horizon = 2;

    let mut orchestrator = Orchestrator::new(
        scenario,
        vec![arrival("P1", 0, 2.0), arrival("P2", 0, 5.0), arrival("P3", 0, 3.0)],
    )
    .unwrap();
    orchestrator.run().unwrap();

    let list = prioritisation_list(&orchestrator);
    assert_eq!(list.entries.len(), 3);

    let order: Vec<&str> = list.entries.iter().map(|e| e.patient_id.as_str()).collect();
    assert_eq!(order, vec!["P2", "P3", "P1"]); // priority descending
    for entry in &list.entries {
        assert!(!entry.rationale.is_empty());
    }
}

#[test]
fn test_early_discharge_flags_report() {
    let mut scenario = triage_scenario(0); // hold everyone at referral
    scenario.horizon = 2;
    scenario.rules.discharge = Some(DischargeGateConfig {
        threshold: 0.9,
        criteria: vec![DischargeCriterionConfig {
            label: "low acuity".to_string(),
            weight: 1.0,
            when: Predicate::NumberBelow {
                attribute: "acuity".to_string(),
                threshold: 2.0,
            },
        }],
    });

    let mut orchestrator = Orchestrator::new(
        scenario,
        vec![arrival("P-safe", 0, 1.0), arrival("P-sick", 0, 5.0)],
    )
    .unwrap();
    orchestrator.run().unwrap();

    let flags = early_discharge_flags(&orchestrator);
    assert_eq!(flags.threshold, Some(0.9));
    assert_eq!(flags.flags.len(), 1);
    assert_eq!(flags.flags[0].patient_id, "P-safe");
    assert_eq!(flags.flags[0].safety_score, 1.0);
}

#[test]
fn test_investment_recommendation_targets_bottleneck() {
    let mut scenario = triage_scenario(1);
    scenario.horizon = 30;

    let feed: Vec<ArrivalRecord> = (0..4)
        .map(|i| arrival(&format!("P{i}"), 0, 3.0))
        .collect();

    let mut orchestrator = Orchestrator::new(scenario, feed).unwrap();
    orchestrator.run().unwrap();

    let report = investment_recommendations(&orchestrator);
    assert_eq!(report.recommendations.len(), 1);

    let rec = &report.recommendations[0];
    assert_eq!(rec.service_point, "triage");
    assert_eq!(rec.capacity, Some(1));
    // 4 patients through a 1-wide gate: 3 denied in the worst period
    assert_eq!(rec.peak_period_denials, 3);
    assert_eq!(rec.recommended_capacity_increase, 3);
    assert!(rec.rationale.contains("denial"));
}
