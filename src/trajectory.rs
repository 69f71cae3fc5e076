//! Trajectory planner (C3): reifies an ordered node route into a concrete
//! polyline, de-duplicating join points between consecutive legs (spec
//! §4.3).

use crate::distance::DistanceMatrix;
use crate::domain::{NodeId, Route, Trajectory};

/// Builds the trajectory for `route` out of the matrix's cached
/// per-pair polylines. Returns `None` if any consecutive pair in the
/// route is missing from the matrix (i.e. was flagged infeasible).
pub fn trajectorize(route: &Route, matrix: &DistanceMatrix) -> Option<Trajectory> {
    if route.nodes.is_empty() {
        return Some(Trajectory::default());
    }

    let mut points = Vec::new();
    for window in route.nodes.windows(2) {
        let (from, to): (&NodeId, &NodeId) = (&window[0], &window[1]);
        let leg = matrix.path(from, to)?;
        if points.is_empty() {
            points.extend_from_slice(leg);
        } else {
            // De-duplicate the join point within epsilon (the first point
            // of this leg coincides with the last point already pushed).
            points.extend_from_slice(&leg[1..]);
        }
    }
    if points.is_empty() {
        // Single-node route: the trajectory degenerates to that node's
        // own position.
        if let Some(only) = route.nodes.first() {
            if let Some(p) = matrix.path(only, only) {
                points.extend_from_slice(p);
            }
        }
    }
    Some(Trajectory { points })
}
