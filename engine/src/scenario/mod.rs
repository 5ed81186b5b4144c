//! Scenario Configuration
//!
//! A scenario is a named, frozen bundle of pathway graph + capacities +
//! rule configuration. Scenarios are validated before any simulation step
//! runs, and validation collects **every** violation it can find — an
//! operator fixes a scenario in one pass, not one error at a time.
//!
//! Comparative runs (Scenario A/B/C/D) come from a [`ScenarioSet`]: one
//! JSON document holding several named scenarios, selected by name.
//! Investment scenarios are expressed as `capacity_deltas` applied at load
//! time — the only sanctioned way capacity differs from the base bundle;
//! nothing mutates capacity mid-run.
//!
//! Missing required fields (e.g. a rule without a weight) surface as serde
//! parse errors before validation even starts.

use crate::graph::{PathwayGraph, Predicate, ServicePoint, Transition};
use crate::ledger::RolloverPolicy;
use crate::rules::{CombinationPolicy, RuleSetConfig};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// One validation violation. A scenario can carry many at once.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigViolation {
    #[error("duplicate service point {0}")]
    DuplicateServicePoint(String),

    #[error("transition from {from} references undefined service point {target}")]
    UndefinedTransitionTarget { from: String, target: String },

    #[error("entry point {0} is not a defined service point")]
    UndefinedEntryPoint(String),

    #[error("no exit service point defined")]
    NoExitPoint,

    #[error("service point {0} is reachable from the entry but has no path to any exit")]
    NoTerminalPath(String),

    #[error("steps_per_period must be > 0")]
    ZeroStepsPerPeriod,

    #[error("horizon must be > 0")]
    ZeroHorizon,

    #[error("workers must be > 0")]
    ZeroWorkers,

    #[error("at least one scoring rule is required")]
    NoScoringRules,

    #[error("duplicate rule name {0}")]
    DuplicateRuleName(String),

    #[error("rule {rule} has negative weight {weight}")]
    NegativeRuleWeight { rule: String, weight: f64 },

    #[error("scoring rule weights sum to zero")]
    ZeroWeightSum,

    #[error("discharge threshold {0} is outside [0, 1]")]
    DischargeThresholdOutOfRange(f64),

    #[error("discharge criterion {label} has negative weight {weight}")]
    NegativeCriterionWeight { label: String, weight: f64 },

    #[error("capacity delta references undefined service point {0}")]
    DeltaUnknownServicePoint(String),

    #[error("capacity delta on uncapacitated service point {0}")]
    DeltaOnUncapacitated(String),

    #[error("capacity delta on {service_point} yields negative capacity {resulting}")]
    DeltaBelowZero {
        service_point: String,
        resulting: i64,
    },

    #[error("unknown scenario {0}")]
    UnknownScenario(String),
}

/// Scenario validation failure listing all violations found
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationError {
    violations: Vec<ConfigViolation>,
}

impl ConfigurationError {
    pub fn new(violations: Vec<ConfigViolation>) -> Self {
        assert!(!violations.is_empty(), "ConfigurationError needs violations");
        Self { violations }
    }

    pub fn violations(&self) -> &[ConfigViolation] {
        &self.violations
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "scenario validation failed with {} violation(s):",
            self.violations.len()
        )?;
        for violation in &self.violations {
            writeln!(f, "  - {}", violation)?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigurationError {}

// ============================================================================
// Configuration Types
// ============================================================================

/// One transition in a service point's outbound set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionConfig {
    pub target: String,

    #[serde(default = "default_predicate")]
    pub when: Predicate,
}

fn default_predicate() -> Predicate {
    Predicate::Always
}

/// Static definition of one service point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicePointConfig {
    pub id: String,

    /// Activity label for reporting; defaults to the ID
    #[serde(default)]
    pub activity: String,

    /// Per-period capacity; omit for uncapacitated (entry/exit points)
    #[serde(default)]
    pub capacity: Option<u32>,

    /// Reaching this point ends the patient's pathway
    #[serde(default)]
    pub exit: bool,

    #[serde(default)]
    pub transitions: Vec<TransitionConfig>,
}

/// Complete configuration for one named scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub description: String,

    pub service_points: Vec<ServicePointConfig>,

    /// Where arriving patients are placed
    pub entry_point: String,

    /// Steps per capacity period
    pub steps_per_period: usize,

    /// Maximum steps before the run is reported incomplete
    pub horizon: usize,

    #[serde(default)]
    pub rollover: RolloverPolicy,

    pub rules: RuleSetConfig,

    /// Investment deltas applied to base capacities at load
    #[serde(default)]
    pub capacity_deltas: HashMap<String, i64>,

    /// Evaluate-phase worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_workers() -> usize {
    1
}

impl ScenarioConfig {
    /// Validate the bundle, collecting every violation found.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let mut violations = Vec::new();

        // Service points and topology
        let mut ids: HashSet<&str> = HashSet::new();
        for point in &self.service_points {
            if !ids.insert(point.id.as_str()) {
                violations.push(ConfigViolation::DuplicateServicePoint(point.id.clone()));
            }
        }

        if !ids.contains(self.entry_point.as_str()) {
            violations.push(ConfigViolation::UndefinedEntryPoint(self.entry_point.clone()));
        }

        if !self.service_points.iter().any(|p| p.exit) {
            violations.push(ConfigViolation::NoExitPoint);
        }

        let graph = self.build_graph_unchecked();
        for (from, target) in graph.undefined_targets() {
            violations.push(ConfigViolation::UndefinedTransitionTarget { from, target });
        }
        for stuck in graph.points_without_terminal_path() {
            violations.push(ConfigViolation::NoTerminalPath(stuck));
        }

        // Time and execution parameters
        if self.steps_per_period == 0 {
            violations.push(ConfigViolation::ZeroStepsPerPeriod);
        }
        if self.horizon == 0 {
            violations.push(ConfigViolation::ZeroHorizon);
        }
        if self.workers == 0 {
            violations.push(ConfigViolation::ZeroWorkers);
        }

        // Rules
        if self.rules.scoring.is_empty() {
            violations.push(ConfigViolation::NoScoringRules);
        }
        let mut rule_names: HashSet<&str> = HashSet::new();
        for rule in &self.rules.scoring {
            if !rule_names.insert(rule.name.as_str()) {
                violations.push(ConfigViolation::DuplicateRuleName(rule.name.clone()));
            }
            if rule.weight < 0.0 {
                violations.push(ConfigViolation::NegativeRuleWeight {
                    rule: rule.name.clone(),
                    weight: rule.weight,
                });
            }
        }
        if self.rules.combination == CombinationPolicy::WeightedSum
            && !self.rules.scoring.is_empty()
        {
            let sum: f64 = self.rules.scoring.iter().map(|r| r.weight).sum();
            if sum <= 0.0 {
                violations.push(ConfigViolation::ZeroWeightSum);
            }
        }
        if let Some(gate) = &self.rules.discharge {
            if !(0.0..=1.0).contains(&gate.threshold) {
                violations.push(ConfigViolation::DischargeThresholdOutOfRange(gate.threshold));
            }
            for criterion in &gate.criteria {
                if criterion.weight < 0.0 {
                    violations.push(ConfigViolation::NegativeCriterionWeight {
                        label: criterion.label.clone(),
                        weight: criterion.weight,
                    });
                }
            }
        }

        // Investment deltas
        for (id, delta) in sorted_deltas(&self.capacity_deltas) {
            match self.service_points.iter().find(|p| p.id == *id) {
                None => violations.push(ConfigViolation::DeltaUnknownServicePoint(id.clone())),
                Some(point) => match point.capacity {
                    None => violations.push(ConfigViolation::DeltaOnUncapacitated(id.clone())),
                    Some(capacity) => {
                        let resulting = capacity as i64 + delta;
                        if resulting < 0 {
                            violations.push(ConfigViolation::DeltaBelowZero {
                                service_point: id.clone(),
                                resulting,
                            });
                        }
                    }
                },
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ConfigurationError::new(violations))
        }
    }

    /// Build the pathway graph with investment deltas applied.
    ///
    /// Call after `validate()`; topology problems in an unvalidated config
    /// surface as missing lookups, not panics.
    pub fn build_graph(&self) -> PathwayGraph {
        self.build_graph_unchecked()
    }

    /// Effective per-period capacities after investment deltas
    pub fn effective_capacities(&self) -> HashMap<String, Option<u32>> {
        self.service_points
            .iter()
            .map(|p| (p.id.clone(), self.effective_capacity(p)))
            .collect()
    }

    fn effective_capacity(&self, point: &ServicePointConfig) -> Option<u32> {
        match (point.capacity, self.capacity_deltas.get(&point.id)) {
            (Some(capacity), Some(delta)) => Some((capacity as i64 + delta).max(0) as u32),
            (capacity, _) => capacity,
        }
    }

    fn build_graph_unchecked(&self) -> PathwayGraph {
        let points = self
            .service_points
            .iter()
            .map(|p| {
                let activity = if p.activity.is_empty() {
                    p.id.clone()
                } else {
                    p.activity.clone()
                };
                ServicePoint::new(
                    p.id.clone(),
                    activity,
                    self.effective_capacity(p),
                    p.exit,
                    p.transitions
                        .iter()
                        .map(|t| Transition {
                            target: t.target.clone(),
                            when: t.when.clone(),
                        })
                        .collect(),
                )
            })
            .collect();
        PathwayGraph::new(points, self.entry_point.clone())
    }
}

/// Deterministic iteration order for delta validation output
fn sorted_deltas(deltas: &HashMap<String, i64>) -> Vec<(&String, &i64)> {
    let mut entries: Vec<(&String, &i64)> = deltas.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

/// A JSON document of named scenarios (A/B/C/D …)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSet {
    /// BTreeMap keeps listing order deterministic
    pub scenarios: BTreeMap<String, ScenarioConfig>,
}

impl ScenarioSet {
    /// Select a scenario by name
    pub fn select(&self, name: &str) -> Result<&ScenarioConfig, ConfigurationError> {
        self.scenarios.get(name).ok_or_else(|| {
            ConfigurationError::new(vec![ConfigViolation::UnknownScenario(name.to_string())])
        })
    }

    /// Scenario names in deterministic order
    pub fn names(&self) -> Vec<&str> {
        self.scenarios.keys().map(String::as_str).collect()
    }
}
