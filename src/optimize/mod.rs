//! Post-optimizers (C6, spec §4.6): insert-missed, trajectory-swap, and
//! 2-opt uncross, run in that fixed order by the orchestrator. Each one
//! only ever accepts a change that strictly improves its own metric and
//! never violates a frozen edge, fuel budget, or eligibility/priority
//! filter.

mod insert;
mod swap;
mod two_opt;

use std::collections::BTreeMap;

use crate::distance::DistanceMatrix;
use crate::domain::{NodeId, Route, TargetId, VehicleContract, VehicleId};

pub use insert::{insert_missed, InsertReport};
pub use swap::{trajectory_swap, SwapReport};
pub use two_opt::{two_opt_uncross, TwoOptReport};

/// Sum of matrix distances along `route`'s edges. `None` if any
/// consecutive pair is missing from the matrix (should not happen for
/// an already-solved route, but callers must not unwrap blindly).
pub fn route_length(route: &Route, matrix: &DistanceMatrix) -> Option<f64> {
    route.edges().try_fold(0.0, |acc, (a, b)| matrix.distance(a, b).map(|d| acc + d))
}

/// Whether `(a, b)` (in either order) is a frozen edge of `vehicle`.
pub fn is_frozen_edge(vehicle: &VehicleContract, a: &NodeId, b: &NodeId) -> bool {
    vehicle.frozen_edges.iter().any(|(x, y)| (x == a && y == b) || (x == b && y == a))
}

#[derive(Debug, Clone, Default)]
pub struct PostOptSummary {
    pub insert: Option<InsertReport>,
    pub swaps: Vec<SwapReport>,
    pub two_opt: BTreeMap<VehicleId, TwoOptReport>,
}

/// Runs the fixed post-optimizer sequence: insert -> swap (iterated to a
/// fixpoint) -> 2-opt (spec §4.6/§5). Mutates `routes` in place.
pub fn run_all(
    env: &crate::domain::Environment,
    matrix: &DistanceMatrix,
    vehicles: &[VehicleContract],
    routes: &mut BTreeMap<VehicleId, Route>,
    candidates: &[(TargetId, i64)],
    flags: crate::config::PostOptFlags,
) -> PostOptSummary {
    let mut summary = PostOptSummary::default();

    if flags.insert_missed {
        let report = insert::insert_missed(env, matrix, vehicles, routes, candidates);
        summary.insert = Some(report);
    }

    if flags.trajectory_swap {
        loop {
            let report = swap::trajectory_swap(env, matrix, vehicles, routes);
            let applied = report.applied;
            summary.swaps.push(report);
            if !applied {
                break;
            }
        }
    }

    if flags.two_opt {
        for vehicle in vehicles {
            if let Some(route) = routes.get_mut(&vehicle.id) {
                let report = two_opt::two_opt_uncross(route, matrix, vehicle);
                summary.two_opt.insert(vehicle.id.clone(), report);
            }
        }
    }

    summary
}
