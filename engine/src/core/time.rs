//! Time management for the simulation
//!
//! The simulation operates in discrete steps. Multiple steps form a capacity
//! period (the window over which the resource ledger accounts for capacity).
//! This module provides deterministic time advancement.

use serde::{Deserialize, Serialize};

/// Manages simulation time in discrete steps and capacity periods
///
/// # Example
/// ```
/// use pathway_simulator_core_rs::TimeManager;
///
/// let mut time = TimeManager::new(4); // 4 steps per period
/// assert_eq!(time.current_step(), 0);
/// assert_eq!(time.current_period(), 0);
///
/// time.advance_step();
/// assert_eq!(time.current_step(), 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeManager {
    /// Total steps elapsed since simulation start
    current_step: usize,
    /// Number of steps in one capacity period
    steps_per_period: usize,
}

impl TimeManager {
    /// Create a new TimeManager
    ///
    /// # Arguments
    /// * `steps_per_period` - Number of steps in one capacity period
    ///
    /// # Panics
    /// Panics if `steps_per_period` is zero (rejected earlier by scenario
    /// validation; this guard catches direct construction).
    pub fn new(steps_per_period: usize) -> Self {
        assert!(steps_per_period > 0, "steps_per_period must be positive");
        Self {
            current_step: 0,
            steps_per_period,
        }
    }

    /// Restore a TimeManager at a given step (checkpoint restoration)
    pub fn at_step(steps_per_period: usize, current_step: usize) -> Self {
        let mut time = Self::new(steps_per_period);
        time.current_step = current_step;
        time
    }

    /// Advance time by one step
    pub fn advance_step(&mut self) {
        self.current_step += 1;
    }

    /// Get the current step (total steps since start)
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Get the current capacity period (0-indexed)
    ///
    /// # Example
    /// ```
    /// use pathway_simulator_core_rs::TimeManager;
    ///
    /// let mut time = TimeManager::new(4);
    /// for _ in 0..4 {
    ///     time.advance_step();
    /// }
    /// assert_eq!(time.current_period(), 1);
    /// ```
    pub fn current_period(&self) -> usize {
        self.current_step / self.steps_per_period
    }

    /// Get the step within the current period (0-indexed)
    pub fn step_within_period(&self) -> usize {
        self.current_step % self.steps_per_period
    }

    /// Check if the current step is the first step of a period
    ///
    /// Used by the orchestrator to roll the resource ledger forward.
    pub fn is_period_start(&self) -> bool {
        self.step_within_period() == 0
    }

    /// Get steps per period
    pub fn steps_per_period(&self) -> usize {
        self.steps_per_period
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "steps_per_period must be positive")]
    fn test_zero_steps_per_period_panics() {
        TimeManager::new(0);
    }

    #[test]
    fn test_period_boundaries() {
        let mut time = TimeManager::new(3);
        assert!(time.is_period_start());

        time.advance_step();
        assert!(!time.is_period_start());
        assert_eq!(time.current_period(), 0);

        time.advance_step();
        time.advance_step();
        assert!(time.is_period_start());
        assert_eq!(time.current_period(), 1);
        assert_eq!(time.step_within_period(), 0);
    }

    #[test]
    fn test_at_step_restores_position() {
        let time = TimeManager::at_step(5, 12);
        assert_eq!(time.current_step(), 12);
        assert_eq!(time.current_period(), 2);
        assert_eq!(time.step_within_period(), 2);
    }
}
