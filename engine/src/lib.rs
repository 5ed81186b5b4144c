//! Pathway Simulator Core - Rust Engine
//!
//! Decision engine advancing simulated patients through a network of
//! service points under configurable clinical and resource constraints,
//! producing prioritization, discharge, and investment signals.
//!
//! # Architecture
//!
//! - **core**: Time management (steps grouped into capacity periods)
//! - **models**: Domain types (Patient, Decision, Event, PatientStore)
//! - **graph**: Static pathway network with eligibility predicates
//! - **ledger**: Per-(service point, period) capacity accounting
//! - **rules**: Pluggable decision rules and combination policies
//! - **arrivals**: External population/need feed
//! - **scenario**: Named, validated configuration bundles
//! - **orchestrator**: Batch-synchronous step loop and checkpointing
//! - **report**: Structured exports (prioritisation, discharge, investment)
//!
//! # Critical Invariants
//!
//! 1. Admissions per (service point, period) never exceed capacity
//! 2. Every decision carries a non-empty rationale
//! 3. Identical scenario + feed produce identical event sequences,
//!    regardless of Evaluate-phase worker count

// Module declarations
pub mod arrivals;
pub mod core;
pub mod graph;
pub mod ledger;
pub mod models;
pub mod orchestrator;
pub mod report;
pub mod rules;
pub mod scenario;

// Re-exports for convenience
pub use arrivals::{ArrivalRecord, ArrivalSchedule, FeedError};
pub use crate::core::time::TimeManager;
pub use graph::{PathwayGraph, Predicate, ServicePoint, Transition};
pub use ledger::{ResourceAllocation, ResourceError, ResourceLedger, RolloverPolicy};
pub use models::{
    decision::{Action, Decision, ReviewReason, RuleContribution, WaitReason},
    event::{Event, EventLog},
    patient::{AttributeValue, HistoryAction, HistoryEntry, Patient, PatientError},
    state::{PatientStore, PatientView, StoreError, SystemView},
};
pub use orchestrator::{
    scenario_hash, Orchestrator, RunOutcome, SimulationError, StateSnapshot, StepResult,
};
pub use report::{
    early_discharge_flags, export_events, investment_recommendations, prioritisation_list,
    EarlyDischargeFlags, ExportRecord, InvestmentReport, PrioritisationList,
};
pub use rules::{
    CombinationPolicy, DecisionRule, RuleConfig, RuleEvaluationError, RuleScore, RuleSet,
    RuleSetConfig, ScoringRuleConfig,
};
pub use scenario::{
    ConfigViolation, ConfigurationError, ScenarioConfig, ScenarioSet, ServicePointConfig,
    TransitionConfig,
};
