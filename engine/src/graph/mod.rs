//! Pathway Graph
//!
//! Static definition of service points and the transitions connecting them.
//! The graph is built once at scenario load, validated by the scenario
//! module, and never mutated during a run.
//!
//! # Critical Invariants
//!
//! - `resolve_transitions` is deterministic: candidates come back in
//!   declaration order, filtered by pure eligibility predicates.
//! - Predicates read patient attributes only; they have no side effects and
//!   a missing attribute simply fails the predicate.

use crate::models::patient::AttributeValue;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// Pure eligibility predicate over a patient's attribute map
///
/// Composable via `All`, `Any`, and `Not`; the leaves compare a single
/// attribute. A predicate referencing a missing attribute evaluates to
/// false rather than erroring — routing eligibility is a yes/no question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    /// Always eligible
    Always,

    /// Numeric attribute is at least `threshold`
    NumberAtLeast { attribute: String, threshold: f64 },

    /// Numeric attribute is strictly below `threshold`
    NumberBelow { attribute: String, threshold: f64 },

    /// Text attribute equals `value`
    TextEquals { attribute: String, value: String },

    /// Negation
    Not { inner: Box<Predicate> },

    /// All sub-predicates hold
    All { preds: Vec<Predicate> },

    /// At least one sub-predicate holds
    Any { preds: Vec<Predicate> },
}

impl Predicate {
    /// Evaluate against an attribute map
    pub fn matches(&self, attributes: &HashMap<String, AttributeValue>) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::NumberAtLeast { attribute, threshold } => attributes
                .get(attribute)
                .and_then(AttributeValue::as_number)
                .map(|v| v >= *threshold)
                .unwrap_or(false),
            Predicate::NumberBelow { attribute, threshold } => attributes
                .get(attribute)
                .and_then(AttributeValue::as_number)
                .map(|v| v < *threshold)
                .unwrap_or(false),
            Predicate::TextEquals { attribute, value } => attributes
                .get(attribute)
                .and_then(AttributeValue::as_text)
                .map(|v| v == value)
                .unwrap_or(false),
            Predicate::Not { inner } => !inner.matches(attributes),
            Predicate::All { preds } => preds.iter().all(|p| p.matches(attributes)),
            Predicate::Any { preds } => preds.iter().any(|p| p.matches(attributes)),
        }
    }
}

/// One outbound transition of a service point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// Target service point ID
    pub target: String,

    /// Eligibility predicate guarding the transition
    pub when: Predicate,
}

/// A clinical activity or location a patient can occupy
///
/// Immutable during a run; capacity is scenario-scoped (investment deltas
/// are applied at load, never mid-run).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicePoint {
    id: String,
    /// Activity label (e.g. "triage", "ward bed") for reporting
    activity: String,
    /// Per-period capacity; `None` = uncapacitated (entry/exit points)
    capacity: Option<u32>,
    /// True if reaching this point ends the patient's pathway
    exit: bool,
    /// Outbound transitions in declaration order
    transitions: Vec<Transition>,
}

impl ServicePoint {
    pub fn new(
        id: String,
        activity: String,
        capacity: Option<u32>,
        exit: bool,
        transitions: Vec<Transition>,
    ) -> Self {
        Self {
            id,
            activity,
            capacity,
            exit,
            transitions,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn activity(&self) -> &str {
        &self.activity
    }

    pub fn capacity(&self) -> Option<u32> {
        self.capacity
    }

    pub fn is_exit(&self) -> bool {
        self.exit
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }
}

/// The static pathway network
///
/// # Example
///
/// ```rust
/// use pathway_simulator_core_rs::graph::{PathwayGraph, Predicate, ServicePoint, Transition};
///
/// let referral = ServicePoint::new(
///     "referral".to_string(),
///     "referral intake".to_string(),
///     None,
///     false,
///     vec![Transition { target: "exit".to_string(), when: Predicate::Always }],
/// );
/// let exit = ServicePoint::new(
///     "exit".to_string(),
///     "discharged".to_string(),
///     None,
///     true,
///     vec![],
/// );
///
/// let graph = PathwayGraph::new(vec![referral, exit], "referral".to_string());
/// assert!(graph.get("referral").is_some());
/// ```
#[derive(Debug, Clone)]
pub struct PathwayGraph {
    points: HashMap<String, ServicePoint>,
    /// Declaration order, used for deterministic iteration in reports
    order: Vec<String>,
    entry_point: String,
}

impl PathwayGraph {
    /// Build a graph from service points.
    ///
    /// Topology is NOT checked here: the scenario module validates
    /// duplicates, undefined targets, and terminal reachability before the
    /// graph reaches the orchestrator.
    pub fn new(points: Vec<ServicePoint>, entry_point: String) -> Self {
        let order: Vec<String> = points.iter().map(|p| p.id().to_string()).collect();
        let points = points
            .into_iter()
            .map(|p| (p.id().to_string(), p))
            .collect();
        Self {
            points,
            order,
            entry_point,
        }
    }

    /// Get a service point by ID
    pub fn get(&self, id: &str) -> Option<&ServicePoint> {
        self.points.get(id)
    }

    /// Entry point where arriving patients are placed
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Service point IDs in declaration order
    pub fn service_point_ids(&self) -> &[String] {
        &self.order
    }

    /// Number of service points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Resolve the eligible outbound transitions for a patient at a point.
    ///
    /// Deterministic given the same inputs: candidates are returned in
    /// declaration order, filtered by each transition's predicate.
    /// Transitions to undefined targets are skipped (validation rejects
    /// them before a run, so this only matters for ad-hoc graphs in tests).
    pub fn resolve_transitions(
        &self,
        service_point: &str,
        attributes: &HashMap<String, AttributeValue>,
    ) -> Vec<&ServicePoint> {
        let Some(point) = self.points.get(service_point) else {
            return Vec::new();
        };
        point
            .transitions()
            .iter()
            .filter(|t| t.when.matches(attributes))
            .filter_map(|t| self.points.get(&t.target))
            .collect()
    }

    // ========================================================================
    // Topology queries (consumed by scenario validation)
    // ========================================================================

    /// (from, target) pairs whose target is not a defined service point
    pub fn undefined_targets(&self) -> Vec<(String, String)> {
        let mut missing = Vec::new();
        for id in &self.order {
            let point = &self.points[id];
            for transition in point.transitions() {
                if !self.points.contains_key(&transition.target) {
                    missing.push((id.clone(), transition.target.clone()));
                }
            }
        }
        missing
    }

    /// Service points reachable from the entry that cannot reach any exit
    /// point — a cycle (or dead end) with no terminal path.
    pub fn points_without_terminal_path(&self) -> Vec<String> {
        let reachable = self.reachable_from_entry();

        // Reverse-reachability from all exit points
        let mut reverse: HashMap<&str, Vec<&str>> = HashMap::new();
        for id in &self.order {
            for transition in self.points[id].transitions() {
                reverse
                    .entry(transition.target.as_str())
                    .or_default()
                    .push(id.as_str());
            }
        }

        let mut can_terminate: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = self
            .points
            .values()
            .filter(|p| p.is_exit())
            .map(|p| p.id())
            .collect();
        while let Some(id) = queue.pop_front() {
            if !can_terminate.insert(id) {
                continue;
            }
            if let Some(sources) = reverse.get(id) {
                for source in sources {
                    queue.push_back(source);
                }
            }
        }

        let mut stuck: Vec<String> = reachable
            .iter()
            .filter(|id| !can_terminate.contains(id.as_str()))
            .cloned()
            .collect();
        stuck.sort();
        stuck
    }

    /// Service point IDs reachable from the entry point (including it)
    fn reachable_from_entry(&self) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        if self.points.contains_key(&self.entry_point) {
            queue.push_back(self.entry_point.as_str());
        }
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(point) = self.points.get(id) {
                for transition in point.transitions() {
                    if self.points.contains_key(&transition.target) {
                        queue.push_back(transition.target.as_str());
                    }
                }
            }
        }
        self.order
            .iter()
            .filter(|id| seen.contains(id.as_str()))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: &str, exit: bool, transitions: Vec<Transition>) -> ServicePoint {
        ServicePoint::new(id.to_string(), id.to_string(), Some(2), exit, transitions)
    }

    fn always(target: &str) -> Transition {
        Transition {
            target: target.to_string(),
            when: Predicate::Always,
        }
    }

    #[test]
    fn test_predicate_missing_attribute_is_false() {
        let pred = Predicate::NumberAtLeast {
            attribute: "acuity".to_string(),
            threshold: 3.0,
        };
        assert!(!pred.matches(&HashMap::new()));
    }

    #[test]
    fn test_predicate_composition() {
        let mut attrs = HashMap::new();
        attrs.insert("acuity".to_string(), AttributeValue::Number(4.0));
        attrs.insert(
            "vitals_trend".to_string(),
            AttributeValue::Text("Stable".to_string()),
        );

        let pred = Predicate::All {
            preds: vec![
                Predicate::NumberAtLeast {
                    attribute: "acuity".to_string(),
                    threshold: 3.0,
                },
                Predicate::Not {
                    inner: Box::new(Predicate::TextEquals {
                        attribute: "vitals_trend".to_string(),
                        value: "Deteriorating".to_string(),
                    }),
                },
            ],
        };
        assert!(pred.matches(&attrs));
    }

    #[test]
    fn test_resolve_transitions_declaration_order() {
        let graph = PathwayGraph::new(
            vec![
                point("a", false, vec![always("c"), always("b")]),
                point("b", false, vec![always("exit")]),
                point("c", false, vec![always("exit")]),
                point("exit", true, vec![]),
            ],
            "a".to_string(),
        );

        let candidates = graph.resolve_transitions("a", &HashMap::new());
        let ids: Vec<&str> = candidates.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["c", "b"]);
    }

    #[test]
    fn test_undefined_targets() {
        let graph = PathwayGraph::new(
            vec![point("a", false, vec![always("ghost")]), point("exit", true, vec![])],
            "a".to_string(),
        );
        assert_eq!(
            graph.undefined_targets(),
            vec![("a".to_string(), "ghost".to_string())]
        );
    }

    #[test]
    fn test_cycle_without_terminal_path_detected() {
        let graph = PathwayGraph::new(
            vec![
                point("a", false, vec![always("b")]),
                point("b", false, vec![always("a")]),
                point("exit", true, vec![]),
            ],
            "a".to_string(),
        );

        assert_eq!(
            graph.points_without_terminal_path(),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn test_cycle_with_escape_is_fine() {
        let graph = PathwayGraph::new(
            vec![
                point("a", false, vec![always("b")]),
                point("b", false, vec![always("a"), always("exit")]),
                point("exit", true, vec![]),
            ],
            "a".to_string(),
        );

        assert!(graph.points_without_terminal_path().is_empty());
    }
}
