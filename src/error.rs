//! Error taxonomy (spec §7). One variant per kind, not per type — the
//! orchestrator and mission state machine convert lower-level local errors
//! into these at their boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("vehicle {vehicle_id} infeasible: {reason}")]
    VehicleInfeasible { vehicle_id: String, reason: String },

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("solver timeout for vehicle {vehicle_id}, using greedy fallback")]
    SolverTimeout { vehicle_id: String },

    #[error("geometry degeneracy: {0}")]
    GeometryDegenerate(String),

    #[error("import error: {0}")]
    ImportError(String),
}

pub type Result<T> = std::result::Result<T, PlannerError>;

/// Per-vehicle orienteering failure kinds (spec §4.5).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolveError {
    #[error("infeasible fuel budget")]
    InfeasibleFuel,
    #[error("frozen edge violation")]
    FrozenViolation,
    #[error("no eligible candidates")]
    EmptyCandidates,
}
