//! Resource Ledger
//!
//! Tracks finite capacity per (service point, capacity period) and enforces
//! admission control: the sum of granted reservations never exceeds
//! capacity, and over-release is a fatal engine error rather than a
//! silently clamped value — the audit trail depends on it.
//!
//! # Concurrency Note
//!
//! The ledger is the only shared mutable resource touched during the Admit
//! phase, and Admit is sequential: every `try_reserve` is a single
//! check-and-commit on `&mut self`, so no two grants can interleave. The
//! Evaluate phase never sees the ledger — it reads the remaining-capacity
//! map captured by Collect.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors indicating an engine-internal accounting bug. Fatal: a run must
/// abort rather than continue with an untrustworthy ledger.
#[derive(Debug, Error, PartialEq)]
pub enum ResourceError {
    #[error(
        "over-release on {service_point} period {period}: releasing {count} with only {used} reserved"
    )]
    OverRelease {
        service_point: String,
        period: usize,
        count: u32,
        used: u32,
    },

    #[error("reservation count must be positive")]
    ZeroCount,

    #[error("unknown service point {0}")]
    UnknownServicePoint(String),
}

/// What happens to unused capacity at a period boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloverPolicy {
    /// Fresh capacity each period; unused slots are lost
    #[default]
    Reset,

    /// Unused capacity rolls forward into the next period
    Carry,
}

/// Capacity used vs. available for one (service point, period)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAllocation {
    /// Capacity for this period; `None` = uncapacitated
    pub capacity: Option<u32>,

    /// Reservations granted so far
    pub used: u32,
}

impl ResourceAllocation {
    /// Remaining capacity (`None` = unlimited)
    pub fn remaining(&self) -> Option<u32> {
        self.capacity.map(|c| c.saturating_sub(self.used))
    }
}

/// Per-(service point, period) capacity accounting
///
/// # Example
///
/// ```rust
/// use pathway_simulator_core_rs::ledger::{ResourceLedger, RolloverPolicy};
/// use std::collections::HashMap;
///
/// let mut capacities = HashMap::new();
/// capacities.insert("triage".to_string(), Some(2));
///
/// let mut ledger = ResourceLedger::new(capacities, RolloverPolicy::Reset);
/// assert!(ledger.try_reserve("triage", 0, 1).unwrap());
/// assert!(ledger.try_reserve("triage", 0, 1).unwrap());
/// assert!(!ledger.try_reserve("triage", 0, 1).unwrap()); // capacity exhausted
/// ```
#[derive(Debug, Clone)]
pub struct ResourceLedger {
    /// Base per-period capacity per service point
    base_capacity: HashMap<String, Option<u32>>,

    /// Materialized allocations, keyed by (service point, period)
    allocations: HashMap<(String, usize), ResourceAllocation>,

    rollover: RolloverPolicy,
}

impl ResourceLedger {
    /// Create a ledger from per-service-point base capacities
    pub fn new(base_capacity: HashMap<String, Option<u32>>, rollover: RolloverPolicy) -> Self {
        Self {
            base_capacity,
            allocations: HashMap::new(),
            rollover,
        }
    }

    /// Materialize allocations for a new period, applying the rollover
    /// policy. The orchestrator calls this at every period start, in
    /// order, so carry-forward only ever looks back one period.
    pub fn roll_period(&mut self, period: usize) {
        let ids: Vec<String> = self.base_capacity.keys().cloned().collect();
        for id in ids {
            self.ensure_allocation(&id, period);
        }
    }

    /// Attempt to reserve `count` units of capacity.
    ///
    /// Atomic: the check and the commit are one operation; either the whole
    /// count is granted or nothing is.
    ///
    /// # Returns
    /// * `Ok(true)` - Reservation granted
    /// * `Ok(false)` - Insufficient remaining capacity (not an error:
    ///   admission control working as designed)
    /// * `Err(ResourceError)` - Zero count or unknown service point
    ///   (engine bug)
    pub fn try_reserve(
        &mut self,
        service_point: &str,
        period: usize,
        count: u32,
    ) -> Result<bool, ResourceError> {
        if count == 0 {
            return Err(ResourceError::ZeroCount);
        }
        if !self.base_capacity.contains_key(service_point) {
            return Err(ResourceError::UnknownServicePoint(service_point.to_string()));
        }

        let allocation = self.ensure_allocation(service_point, period);
        let granted = match allocation.capacity {
            None => true,
            Some(capacity) => allocation.used + count <= capacity,
        };
        if granted {
            allocation.used += count;
        }
        Ok(granted)
    }

    /// Release previously granted capacity.
    ///
    /// Safe only up to previously granted counts: releasing more than was
    /// reserved is an `OverRelease` error, never clamped.
    pub fn release(
        &mut self,
        service_point: &str,
        period: usize,
        count: u32,
    ) -> Result<(), ResourceError> {
        if count == 0 {
            return Err(ResourceError::ZeroCount);
        }
        if !self.base_capacity.contains_key(service_point) {
            return Err(ResourceError::UnknownServicePoint(service_point.to_string()));
        }

        let allocation = self.ensure_allocation(service_point, period);
        if count > allocation.used {
            return Err(ResourceError::OverRelease {
                service_point: service_point.to_string(),
                period,
                count,
                used: allocation.used,
            });
        }
        allocation.used -= count;
        Ok(())
    }

    /// Current allocation for a (service point, period), if materialized
    pub fn allocation(&self, service_point: &str, period: usize) -> Option<ResourceAllocation> {
        self.allocations
            .get(&(service_point.to_string(), period))
            .copied()
    }

    /// Remaining capacity for every service point in a period
    /// (`None` = uncapacitated). Unmaterialized entries report base capacity.
    pub fn remaining_capacities(&self, period: usize) -> HashMap<String, Option<u32>> {
        self.base_capacity
            .keys()
            .map(|id| {
                let remaining = match self.allocations.get(&(id.clone(), period)) {
                    Some(allocation) => allocation.remaining(),
                    None => self.base_capacity[id],
                };
                (id.clone(), remaining)
            })
            .collect()
    }

    /// All materialized allocations (reporting, checkpointing)
    pub fn allocations(&self) -> &HashMap<(String, usize), ResourceAllocation> {
        &self.allocations
    }

    /// Base capacity of a service point
    pub fn base_capacity(&self, service_point: &str) -> Option<Option<u32>> {
        self.base_capacity.get(service_point).copied()
    }

    pub fn rollover(&self) -> RolloverPolicy {
        self.rollover
    }

    /// Restore a materialized allocation (checkpoint restoration)
    pub fn restore_allocation(
        &mut self,
        service_point: String,
        period: usize,
        allocation: ResourceAllocation,
    ) {
        self.allocations.insert((service_point, period), allocation);
    }

    fn ensure_allocation(
        &mut self,
        service_point: &str,
        period: usize,
    ) -> &mut ResourceAllocation {
        let key = (service_point.to_string(), period);
        if !self.allocations.contains_key(&key) {
            let base = self.base_capacity[service_point];
            let capacity = match (self.rollover, base, period) {
                (RolloverPolicy::Carry, Some(base_cap), p) if p > 0 => {
                    let carried = self
                        .allocations
                        .get(&(service_point.to_string(), p - 1))
                        .and_then(|prev| prev.remaining())
                        .unwrap_or(0);
                    Some(base_cap + carried)
                }
                _ => base,
            };
            self.allocations
                .insert(key.clone(), ResourceAllocation { capacity, used: 0 });
        }
        self.allocations.get_mut(&key).unwrap()
    }
}
