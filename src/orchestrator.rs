//! Mission orchestrator (C7, spec §4.7): the end-to-end pipeline from an
//! environment snapshot and vehicle contracts to a solution envelope.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn};

use crate::allocation::{self, AllocationResult};
use crate::config::SolvePolicy;
use crate::distance::DistanceService;
use crate::domain::{Environment, Exclusion, Route, TargetId, Trajectory, VehicleContract, VehicleId};
use crate::error::SolveError;
use crate::optimize;
use crate::solver;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleOutcome {
    pub route: Route,
    pub trajectory: Trajectory,
    pub length: f64,
    pub fuel_remaining: f64,
    pub points: i64,
    pub feasible: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Metrics {
    pub total_points: i64,
    pub total_length: f64,
    pub per_vehicle_margins: BTreeMap<VehicleId, f64>,
    pub unvisited_targets: Vec<TargetId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    pub routes: BTreeMap<VehicleId, VehicleOutcome>,
    pub allocation: BTreeMap<VehicleId, Vec<TargetId>>,
    pub excluded: Vec<Exclusion>,
    pub metrics: Metrics,
}

/// Runs the full pipeline described in spec §4.7: fingerprint/build the
/// distance matrix, derive eligibility and allocation, solve each
/// vehicle (in parallel, bounded by `min(8, #enabled vehicles)` per
/// spec §5), trajectorize, run the requested post-optimizers, and
/// compute final metrics.
pub fn solve(
    env: &Environment,
    vehicles: &[VehicleContract],
    policy: &SolvePolicy,
    distance_service: &mut DistanceService,
) -> Solution {
    let span = info_span!("orchestrator.solve", vehicles = vehicles.len(), targets = env.targets.len());
    let _enter = span.enter();

    let nodes = env.all_nodes();
    let matrix = distance_service.matrix(env, &nodes);

    let AllocationResult { assignment, excluded } = allocation::allocate(env, vehicles, matrix, policy, None);

    let pool_cap = crate::config::constant::DEFAULT_WORKER_POOL_CAP
        .min(vehicles.iter().filter(|v| v.enabled).count().max(1));
    let pool = rayon::ThreadPoolBuilder::new().num_threads(pool_cap).build();

    let solve_one = |vehicle: &VehicleContract| -> (VehicleId, Result<solver::VehicleSolution, SolveError>) {
        if !vehicle.enabled {
            return (vehicle.id.clone(), Err(SolveError::EmptyCandidates));
        }
        let candidates: Vec<(TargetId, i64)> = assignment
            .get(&vehicle.id)
            .into_iter()
            .flatten()
            .filter_map(|tid| env.target(tid).map(|t| (tid.clone(), t.priority)))
            .collect();
        (vehicle.id.clone(), solver::solve_vehicle(vehicle, &candidates, matrix, policy))
    };

    let solved: Vec<(VehicleId, Result<solver::VehicleSolution, SolveError>)> = match pool {
        Ok(pool) => pool.install(|| vehicles.par_iter().map(solve_one).collect()),
        Err(_) => vehicles.iter().map(solve_one).collect(),
    };

    let mut routes: BTreeMap<VehicleId, Route> = BTreeMap::new();
    let mut solve_errors: BTreeMap<VehicleId, SolveError> = BTreeMap::new();
    for (vid, result) in solved {
        match result {
            Ok(solution) => {
                if solution.timed_out {
                    warn!(vehicle = %vid, "vehicle solve fell back to greedy after deadline");
                }
                routes.insert(vid, solution.route);
            }
            Err(e) => {
                solve_errors.insert(vid.clone(), e.clone());
                // Trivial route fallback: start -> end, if that much is
                // affordable; otherwise the vehicle is fully infeasible.
                if let Some(vehicle) = vehicles.iter().find(|v| v.id == vid) {
                    let end = match &vehicle.end {
                        crate::domain::EndpointMode::Return => vehicle.start.clone(),
                        crate::domain::EndpointMode::FixedEnd(n) => n.clone(),
                        crate::domain::EndpointMode::BestEnd(nodes) => {
                            nodes.first().cloned().unwrap_or_else(|| vehicle.start.clone())
                        }
                    };
                    if matrix.distance(&vehicle.start, &end).is_some_and(|d| d <= vehicle.fuel_budget) {
                        routes.insert(vid, Route { nodes: vec![vehicle.start.clone(), end] });
                    } else {
                        routes.insert(vid, Route::default());
                    }
                }
            }
        }
    }

    let candidates_for_optimize: Vec<(TargetId, i64)> =
        env.targets.iter().map(|t| (t.id.clone(), t.priority)).collect();

    if policy.post_opt.insert_missed || policy.post_opt.trajectory_swap || policy.post_opt.two_opt {
        optimize::run_all(env, matrix, vehicles, &mut routes, &candidates_for_optimize, policy.post_opt);
    }

    let mut outcomes: BTreeMap<VehicleId, VehicleOutcome> = BTreeMap::new();
    let mut total_points = 0i64;
    let mut total_length = 0.0;
    let mut margins = BTreeMap::new();

    for vehicle in vehicles {
        let route = routes.remove(&vehicle.id).unwrap_or_default();
        let trajectory = crate::trajectory::trajectorize(&route, matrix).unwrap_or_default();
        let length = trajectory.length();
        let feasible = vehicle.enabled && length <= vehicle.fuel_budget + crate::config::constant::EPSILON_LENGTH;
        let points: i64 = route.targets().filter_map(|tid| env.target(tid)).map(|t| t.priority).sum();
        let reason = solve_errors.get(&vehicle.id).map(|e| e.to_string());

        total_points += points;
        total_length += length;
        margins.insert(vehicle.id.clone(), vehicle.fuel_budget - length);

        outcomes.insert(
            vehicle.id.clone(),
            VehicleOutcome { route, trajectory, length, fuel_remaining: vehicle.fuel_budget - length, points, feasible, reason },
        );
    }

    let all_visited: std::collections::BTreeSet<TargetId> =
        outcomes.values().flat_map(|o| o.route.targets().cloned()).collect();
    let unvisited_targets: Vec<TargetId> =
        env.targets.iter().map(|t| t.id.clone()).filter(|id| !all_visited.contains(id)).collect();

    info!(total_points, total_length, unvisited = unvisited_targets.len(), "solve complete");

    Solution {
        routes: outcomes,
        allocation: assignment,
        excluded,
        metrics: Metrics { total_points, total_length, per_vehicle_margins: margins, unvisited_targets },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SolvePolicy;
    use crate::domain::{Airport, Eligibility, EndpointMode, NodeId, Target};
    use crate::geometry::Point;

    #[test]
    fn e1_single_vehicle_no_threats() {
        let env = Environment {
            airports: vec![Airport { id: "A".into(), position: Point::new(0.0, 0.0) }],
            targets: vec![
                Target { id: "T1".into(), position: Point::new(10.0, 0.0), priority: 5, sensor_class: "eo".into() },
                Target { id: "T2".into(), position: Point::new(0.0, 10.0), priority: 5, sensor_class: "eo".into() },
                Target { id: "T3".into(), position: Point::new(10.0, 10.0), priority: 10, sensor_class: "eo".into() },
            ],
            threats: vec![],
            synthetic_starts: Default::default(),
        };
        let vehicle = VehicleContract {
            id: "D1".into(),
            enabled: true,
            fuel_budget: 60.0,
            start: NodeId::Airport("A".into()),
            end: EndpointMode::Return,
            eligibility: Eligibility::All,
            priority_filter: None,
            frozen_edges: vec![],
        };
        let policy = SolvePolicy::default();
        let mut svc = DistanceService::new();
        let solution = solve(&env, &[vehicle], &policy, &mut svc);
        let outcome = &solution.routes["D1"];
        assert!(outcome.feasible);
        assert_eq!(outcome.points, 20);
        assert!((outcome.length - 40.0).abs() < 1e-6);
        assert!(solution.metrics.unvisited_targets.is_empty());
    }
}
