//! Structured exports for external consumers
//!
//! The engine's outputs feed dashboards and analysis it knows nothing
//! about: event-level records for activity tables and waiting-list
//! profiles, plus the three decision exports the planning exercise asks
//! for — a prioritisation list, early-discharge flags, and investment
//! recommendations. Exports are read-only derivations; nothing here feeds
//! back into decisions.

use crate::models::decision::WaitReason;
use crate::models::event::{Event, EventLog};
use crate::orchestrator::Orchestrator;
use crate::rules::DISCHARGE_SAFETY_RULE;
use serde::Serialize;
use std::collections::HashMap;

/// One event-level export record: (patient, time, service point, action,
/// rationale), sufficient for external aggregation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRecord {
    pub patient_id: String,
    pub step: usize,
    pub service_point: String,
    pub action: String,
    pub rationale: String,
}

/// Flatten the event log into export records.
///
/// Bookkeeping events (period rollover, horizon, rule fallbacks) are not
/// patient actions and are omitted; fallbacks are already visible in the
/// rationale of the affected decision.
pub fn export_events(log: &EventLog) -> Vec<ExportRecord> {
    log.events()
        .iter()
        .filter_map(|event| match event {
            Event::Arrival {
                step,
                patient_id,
                service_point,
            } => Some(ExportRecord {
                patient_id: patient_id.clone(),
                step: *step,
                service_point: service_point.clone(),
                action: "arrival".to_string(),
                rationale: String::new(),
            }),
            Event::Admitted {
                step,
                patient_id,
                to,
                rationale,
                ..
            } => Some(ExportRecord {
                patient_id: patient_id.clone(),
                step: *step,
                service_point: to.clone(),
                action: "advance".to_string(),
                rationale: rationale.clone(),
            }),
            Event::Discharged {
                step,
                patient_id,
                to,
                rationale,
                ..
            } => Some(ExportRecord {
                patient_id: patient_id.clone(),
                step: *step,
                service_point: to.clone(),
                action: "discharge".to_string(),
                rationale: rationale.clone(),
            }),
            Event::Waited {
                step,
                patient_id,
                service_point,
                rationale,
                ..
            } => Some(ExportRecord {
                patient_id: patient_id.clone(),
                step: *step,
                service_point: service_point.clone(),
                action: "wait".to_string(),
                rationale: rationale.clone(),
            }),
            Event::FlaggedForReview {
                step,
                patient_id,
                service_point,
                rationale,
                ..
            } => Some(ExportRecord {
                patient_id: patient_id.clone(),
                step: *step,
                service_point: service_point.clone(),
                action: "flagged-for-review".to_string(),
                rationale: rationale.clone(),
            }),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Prioritisation List
// ============================================================================

/// One ranked entry on the prioritisation list
#[derive(Debug, Clone, Serialize)]
pub struct PrioritisationEntry {
    pub patient_id: String,
    pub service_point: String,
    pub priority: f64,
    pub degraded: bool,
    pub rationale: String,
}

/// Active patients ranked by latest decision priority, grouped per
/// service point
#[derive(Debug, Clone, Serialize)]
pub struct PrioritisationList {
    pub run_id: String,
    pub step: usize,
    pub entries: Vec<PrioritisationEntry>,
}

/// Build the prioritisation list from the latest committed state.
///
/// Entries are sorted by (service point, priority descending, patient ID),
/// mirroring per-speciality clinical ranking.
pub fn prioritisation_list(orchestrator: &Orchestrator) -> PrioritisationList {
    let step = orchestrator.current_step();
    let decisions = orchestrator.latest_decisions();

    let mut entries: Vec<PrioritisationEntry> = orchestrator
        .store()
        .active_snapshot(step)
        .into_iter()
        .filter_map(|view| {
            decisions.get(&view.id).map(|decision| PrioritisationEntry {
                patient_id: view.id.clone(),
                service_point: view.location.clone(),
                priority: decision.priority,
                degraded: decision.degraded,
                rationale: decision.rationale_summary(),
            })
        })
        .collect();

    entries.sort_by(|a, b| {
        a.service_point
            .cmp(&b.service_point)
            .then_with(|| b.priority.total_cmp(&a.priority))
            .then_with(|| a.patient_id.cmp(&b.patient_id))
    });

    PrioritisationList {
        run_id: orchestrator.run_id().to_string(),
        step,
        entries,
    }
}

// ============================================================================
// Early Discharge Flags
// ============================================================================

/// One patient whose discharge-safety score cleared the threshold
#[derive(Debug, Clone, Serialize)]
pub struct DischargeFlag {
    pub patient_id: String,
    pub service_point: String,
    pub safety_score: f64,
    pub rationale: String,
}

/// Early-discharge candidates among active patients
#[derive(Debug, Clone, Serialize)]
pub struct EarlyDischargeFlags {
    pub run_id: String,
    pub step: usize,
    /// Configured gate threshold; `None` when the scenario has no gate
    pub threshold: Option<f64>,
    pub flags: Vec<DischargeFlag>,
}

/// Build the early-discharge flag list from the latest decisions.
///
/// A patient is flagged when its latest discharge-safety contribution
/// meets the scenario threshold — whether or not an exit transition was
/// available at its current service point.
pub fn early_discharge_flags(orchestrator: &Orchestrator) -> EarlyDischargeFlags {
    let step = orchestrator.current_step();
    let threshold = orchestrator
        .scenario()
        .rules
        .discharge
        .as_ref()
        .map(|gate| gate.threshold);
    let decisions = orchestrator.latest_decisions();

    let mut flags = Vec::new();
    if let Some(threshold) = threshold {
        for view in orchestrator.store().active_snapshot(step) {
            let Some(decision) = decisions.get(&view.id) else {
                continue;
            };
            let Some(safety) = decision
                .rationale
                .iter()
                .find(|c| c.rule == DISCHARGE_SAFETY_RULE)
            else {
                continue;
            };
            if safety.value >= threshold {
                flags.push(DischargeFlag {
                    patient_id: view.id.clone(),
                    service_point: view.location.clone(),
                    safety_score: safety.value,
                    rationale: safety.explanation.clone(),
                });
            }
        }
    }

    EarlyDischargeFlags {
        run_id: orchestrator.run_id().to_string(),
        step,
        threshold,
        flags,
    }
}

// ============================================================================
// Investment Recommendations
// ============================================================================

/// Capacity-investment signal for one service point
#[derive(Debug, Clone, Serialize)]
pub struct InvestmentRecommendation {
    pub service_point: String,
    /// Effective per-period capacity in the scenario
    pub capacity: Option<u32>,
    /// Total admission denials over the run
    pub denials: usize,
    /// Worst single-period denial count
    pub peak_period_denials: usize,
    /// Extra per-period capacity that would have cleared the worst period
    pub recommended_capacity_increase: u32,
    pub rationale: String,
}

/// Investment recommendations derived from admission denials
#[derive(Debug, Clone, Serialize)]
pub struct InvestmentReport {
    pub run_id: String,
    pub recommendations: Vec<InvestmentRecommendation>,
}

/// Build investment recommendations from the run's denial pattern.
///
/// For every service point that denied admissions, the worst
/// single-period shortfall becomes the recommended capacity increase —
/// the smallest uplift that would have absorbed the peak.
pub fn investment_recommendations(orchestrator: &Orchestrator) -> InvestmentReport {
    let steps_per_period = orchestrator.scenario().steps_per_period;

    // Denials per (target service point, period)
    let mut denials_by_point: HashMap<&str, HashMap<usize, usize>> = HashMap::new();
    for event in orchestrator.event_log().events() {
        if let Event::Waited {
            step,
            reason: WaitReason::CapacityExhausted { service_point },
            ..
        } = event
        {
            *denials_by_point
                .entry(service_point.as_str())
                .or_default()
                .entry(step / steps_per_period)
                .or_insert(0) += 1;
        }
    }

    let mut recommendations: Vec<InvestmentRecommendation> = Vec::new();
    for id in orchestrator.graph().service_point_ids() {
        let Some(per_period) = denials_by_point.get(id.as_str()) else {
            continue;
        };
        let denials: usize = per_period.values().sum();
        let peak = per_period.values().copied().max().unwrap_or(0);
        let capacity = orchestrator
            .graph()
            .get(id)
            .and_then(|point| point.capacity());

        recommendations.push(InvestmentRecommendation {
            service_point: id.clone(),
            capacity,
            denials,
            peak_period_denials: peak,
            recommended_capacity_increase: peak as u32,
            rationale: format!(
                "{} admission denial(s) over {} period(s); worst period denied {} at capacity {}; +{} per period would have cleared the peak",
                denials,
                per_period.len(),
                peak,
                capacity.map_or("unlimited".to_string(), |c| c.to_string()),
                peak
            ),
        });
    }

    recommendations.sort_by(|a, b| {
        b.denials
            .cmp(&a.denials)
            .then_with(|| a.service_point.cmp(&b.service_point))
    });

    InvestmentReport {
        run_id: orchestrator.run_id().to_string(),
        recommendations,
    }
}
