//! Orchestrator - main simulation loop
//!
//! Implements the batch-synchronous step state machine
//! (Collect → Evaluate → Admit → Commit → Terminal check).
//!
//! See `engine.rs` for the full implementation, `workers.rs` for the
//! Evaluate-phase worker pool, and `checkpoint.rs` for between-step
//! save/restore.

pub mod checkpoint;
pub mod engine;
pub mod workers;

// Re-export main types for convenience
pub use engine::{Orchestrator, RunOutcome, SimulationError, StepResult};

// Re-export checkpoint types
pub use checkpoint::{scenario_hash, AllocationSnapshot, StateSnapshot};
