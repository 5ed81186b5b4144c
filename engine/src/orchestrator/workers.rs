//! Evaluate-phase worker pool
//!
//! Per-patient rule evaluation is embarrassingly parallel: every evaluation
//! reads the same immutable Collect-phase views and touches nothing else.
//! This module fans a batch out over a small pool of named scoped threads
//! and collects results **by patient index**, so the returned vector is
//! identical regardless of which worker finished first — the Admit phase's
//! tie-break determinism never depends on scheduling.

use crate::graph::PathwayGraph;
use crate::models::decision::Decision;
use crate::models::state::{PatientView, SystemView};
use crate::rules::RuleSet;
use crossbeam_channel::bounded;
use std::thread;

/// Evaluate every patient view against the rule set.
///
/// With `workers <= 1` (or a single patient) evaluation runs inline on the
/// caller's thread; otherwise a bounded-channel pool of scoped threads is
/// used. Output order always matches input order.
pub fn evaluate_batch(
    rule_set: &RuleSet,
    graph: &PathwayGraph,
    patients: &[PatientView],
    system: &SystemView,
    workers: usize,
) -> Vec<Decision> {
    if workers <= 1 || patients.len() <= 1 {
        return patients
            .iter()
            .map(|patient| rule_set.decide(patient, system, graph))
            .collect();
    }

    let workers = workers.min(patients.len());
    let (job_tx, job_rx) = bounded::<usize>(patients.len());
    let (result_tx, result_rx) = bounded::<(usize, Decision)>(patients.len());

    thread::scope(|scope| {
        for worker_idx in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            thread::Builder::new()
                .name(format!("pathway-eval-{worker_idx}"))
                .spawn_scoped(scope, move || {
                    while let Ok(index) = job_rx.recv() {
                        let decision = rule_set.decide(&patients[index], system, graph);
                        if result_tx.send((index, decision)).is_err() {
                            break;
                        }
                    }
                })
                .expect("failed to spawn evaluate worker");
        }

        for index in 0..patients.len() {
            job_tx.send(index).expect("evaluate job channel closed");
        }
        // Close both ends held by the coordinator so workers drain and exit
        drop(job_tx);
        drop(result_tx);

        let mut slots: Vec<Option<Decision>> = vec![None; patients.len()];
        while let Ok((index, decision)) = result_rx.recv() {
            slots[index] = Some(decision);
        }
        slots
            .into_iter()
            .map(|slot| slot.expect("evaluate worker dropped a patient"))
            .collect()
    })
}
