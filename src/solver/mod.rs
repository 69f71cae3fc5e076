//! Per-vehicle route solver (C5, spec §4.5): builds the ordered route a
//! single vehicle flies, subject to its fuel budget, endpoint mode, and
//! any frozen-edge prefix carried over from a prior mission segment.

mod greedy;
mod held_karp;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::warn;

use crate::config::SolvePolicy;
use crate::distance::DistanceMatrix;
use crate::domain::{EndpointMode, NodeId, Route, TargetId, VehicleContract};
use crate::error::SolveError;

#[derive(Debug, Clone)]
pub struct VehicleSolution {
    pub route: Route,
    pub priority: i64,
    pub length: f64,
    /// Set when the exact DP hit its deadline and the greedy fallback
    /// was substituted (spec §5 warm-baseline-fallback behavior).
    pub timed_out: bool,
}

/// Solves one vehicle's route over `candidates` (target id, priority),
/// honoring `vehicle.frozen_edges` as a mandatory contiguous prefix from
/// `vehicle.start`, and `vehicle.end`'s endpoint mode.
pub fn solve_vehicle(
    vehicle: &VehicleContract,
    candidates: &[(TargetId, i64)],
    matrix: &DistanceMatrix,
    policy: &SolvePolicy,
) -> Result<VehicleSolution, SolveError> {
    let (chain_prefix, chain_targets, chain_length, virtual_start) = walk_frozen_chain(vehicle, matrix)?;
    let remaining_budget = vehicle.fuel_budget - chain_length;
    if remaining_budget < 0.0 {
        return Err(SolveError::FrozenViolation);
    }

    let mut free_candidates: Vec<(TargetId, i64)> =
        candidates.iter().filter(|(tid, _)| !chain_targets.contains(tid)).cloned().collect();
    // Shuffle with a per-vehicle seeded RNG so exact value-density ties
    // (e.g. two candidates the same distance away) don't always resolve
    // toward whichever one happened to sort first in the input, while
    // staying reproducible run to run for a given vehicle/candidate set.
    let mut rng = ChaCha8Rng::seed_from_u64(seed_for(&vehicle.id, &free_candidates));
    free_candidates.shuffle(&mut rng);

    let ends = match &vehicle.end {
        EndpointMode::Return => vec![vehicle.start.clone()],
        EndpointMode::FixedEnd(node) => vec![node.clone()],
        EndpointMode::BestEnd(nodes) => nodes.clone(),
    };

    let mut best: Option<VehicleSolution> = None;
    for end in &ends {
        let attempt = solve_single_end(&virtual_start, end, &free_candidates, matrix, policy, remaining_budget);
        let Ok((order, priority, length, timed_out)) = attempt else { continue };
        let full_priority = priority + chain_target_priority(&chain_targets, candidates);
        let full_length = chain_length + length;
        let better = best.as_ref().is_none_or(|b| full_priority > b.priority
            || (full_priority == b.priority && full_length < b.length));
        if better {
            let mut nodes = chain_prefix.clone();
            nodes.extend(order.into_iter().map(NodeId::Target));
            if nodes.last() != Some(end) {
                nodes.push(end.clone());
            }
            best = Some(VehicleSolution {
                route: Route { nodes },
                priority: full_priority,
                length: full_length,
                timed_out,
            });
        }
    }

    best.ok_or(SolveError::InfeasibleFuel)
}

fn seed_for(vehicle_id: &str, candidates: &[(TargetId, i64)]) -> u64 {
    let mut hasher = DefaultHasher::new();
    vehicle_id.hash(&mut hasher);
    for (tid, prio) in candidates {
        tid.hash(&mut hasher);
        prio.hash(&mut hasher);
    }
    hasher.finish()
}

fn chain_target_priority(chain_targets: &[TargetId], candidates: &[(TargetId, i64)]) -> i64 {
    candidates.iter().filter(|(tid, _)| chain_targets.contains(tid)).map(|(_, p)| *p).sum()
}

/// Walks the vehicle's `frozen_edges` as a forced contiguous successor
/// chain from `vehicle.start`. Per spec: frozen edges are honored only
/// when they chain — (start, x), (x, y), (y, z)... — in order; a
/// dangling or non-chaining edge is an invariant violation.
fn walk_frozen_chain(
    vehicle: &VehicleContract,
    matrix: &DistanceMatrix,
) -> Result<(Vec<NodeId>, Vec<TargetId>, f64, NodeId), SolveError> {
    if vehicle.frozen_edges.is_empty() {
        return Ok((vec![vehicle.start.clone()], vec![], 0.0, vehicle.start.clone()));
    }

    let mut prefix = vec![vehicle.start.clone()];
    let mut targets = vec![];
    let mut length = 0.0;
    let mut cursor = vehicle.start.clone();

    loop {
        let next_edge = vehicle.frozen_edges.iter().find(|(from, _)| *from == cursor);
        let Some((_, to)) = next_edge else { break };
        let d = matrix.distance(&cursor, to).ok_or(SolveError::FrozenViolation)?;
        length += d;
        prefix.push(to.clone());
        if let NodeId::Target(id) = to {
            targets.push(id.clone());
        }
        cursor = to.clone();
    }

    Ok((prefix, targets, length, cursor))
}

/// Solves for one candidate end node: runs the exact DP when the
/// candidate count is within the policy cap, otherwise the greedy
/// fallback directly. Within the DP path, a warm greedy baseline is
/// computed first so a deadline expiry still yields a usable route.
fn solve_single_end(
    start: &NodeId,
    end: &NodeId,
    candidates: &[(TargetId, i64)],
    matrix: &DistanceMatrix,
    policy: &SolvePolicy,
    budget: f64,
) -> Result<(Vec<TargetId>, i64, f64, bool), SolveError> {
    if candidates.len() > policy.max_candidates {
        let g = greedy::solve(start, end, candidates, matrix, budget)?;
        return Ok((g.order, g.priority, g.length, false));
    }

    let baseline = greedy::solve(start, end, candidates, matrix, budget).ok();
    let deadline = Instant::now() + Duration::from_millis(policy.per_vehicle_timeout_ms);
    match held_karp::solve(start, end, candidates, matrix, budget, Some(deadline)) {
        Ok(result) => Ok((result.order, result.priority, result.length, false)),
        Err(_) => match baseline {
            Some(g) => {
                warn!(start = %start, end = %end, "held-karp deadline exceeded, using greedy fallback");
                Ok((g.order, g.priority, g.length, true))
            }
            None => Err(SolveError::InfeasibleFuel),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SolvePolicy;
    use crate::distance::DistanceService;
    use crate::domain::{Airport, Eligibility, Environment, Target};
    use crate::geometry::Point;

    fn env() -> Environment {
        Environment {
            airports: vec![Airport { id: "A".into(), position: Point::new(0.0, 0.0) }],
            targets: vec![
                Target { id: "T1".into(), position: Point::new(10.0, 0.0), priority: 5, sensor_class: "eo".into() },
                Target { id: "T2".into(), position: Point::new(0.0, 10.0), priority: 5, sensor_class: "eo".into() },
                Target { id: "T3".into(), position: Point::new(10.0, 10.0), priority: 10, sensor_class: "eo".into() },
            ],
            threats: vec![],
            synthetic_starts: Default::default(),
        }
    }

    fn vehicle(fuel_budget: f64, frozen_edges: Vec<(NodeId, NodeId)>) -> VehicleContract {
        VehicleContract {
            id: "D1".into(),
            enabled: true,
            fuel_budget,
            start: NodeId::Airport("A".into()),
            end: EndpointMode::Return,
            eligibility: Eligibility::All,
            priority_filter: None,
            frozen_edges,
        }
    }

    #[test]
    fn solves_all_three_targets_within_budget() {
        let env = env();
        let nodes = env.all_nodes();
        let mut svc = DistanceService::new();
        let matrix = svc.matrix(&env, &nodes);
        let v = vehicle(60.0, vec![]);
        let candidates = vec![("T1".to_string(), 5), ("T2".to_string(), 5), ("T3".to_string(), 10)];
        let policy = SolvePolicy::default();
        let sol = solve_vehicle(&v, &candidates, matrix, &policy).unwrap();
        assert_eq!(sol.priority, 20);
        assert_eq!(sol.route.targets().count(), 3);
    }

    #[test]
    fn frozen_prefix_is_honored_and_reduces_budget() {
        let env = env();
        let nodes = env.all_nodes();
        let mut svc = DistanceService::new();
        let matrix = svc.matrix(&env, &nodes);
        let frozen = vec![(NodeId::Airport("A".into()), NodeId::Target("T1".into()))];
        let v = vehicle(60.0, frozen);
        let candidates = vec![("T1".to_string(), 5), ("T2".to_string(), 5), ("T3".to_string(), 10)];
        let policy = SolvePolicy::default();
        let sol = solve_vehicle(&v, &candidates, matrix, &policy).unwrap();
        assert_eq!(sol.route.nodes[1], NodeId::Target("T1".into()));
        assert!(sol.route.targets().any(|t| t == "T1"));
    }
}
