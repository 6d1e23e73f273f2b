//! Per-tick and per-run reports returned by the cell.

use crate::error::Rejection;
use crate::planner::PlannerState;

/// What one control tick did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub from: PlannerState,
    pub state: PlannerState,
    /// Telemetry lines decoded into sensor events.
    pub events: usize,
    /// Commands written to the transport.
    pub commands: usize,
    /// Set when the gateway refused a request; the transition was not committed.
    pub rejected: Option<Rejection>,
    /// Target id marked processed this tick.
    pub processed: Option<String>,
}

/// Totals for a run of the tick loop.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    pub processed: u64,
    /// Planner state when the loop stopped, before the drain sequence.
    pub final_state: PlannerState,
    /// Drain commands that reached the transport.
    pub drained: usize,
}
