//! Mission state transitions: first solve, cut, and replan (spec §4.8).

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::config::SolvePolicy;
use crate::config::constant::{EPSILON_LENGTH, THREAT_MARGIN};
use crate::distance::DistanceService;
use crate::domain::{
    Airport, EndState, Environment, Mission, Segment, Target, TargetId, Threat, VehicleContract,
    VehicleId, VehicleTrajectoryRecord,
};
use crate::error::PlannerError;
use crate::geometry::point::{point_at_length, polyline_length, truncate_at_length};
use crate::geometry::{Disk, Point};
use crate::orchestrator::{self, Solution};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionState {
    Empty,
    Open(usize),
    Closed(usize),
    Terminated,
}

/// Outcome of a cut: the escaped-or-raw synthetic start position per
/// enabled vehicle, for use as the start node of the next segment's
/// solve (spec §4.8 step 4), and the set that actually needed escaping.
#[derive(Debug, Clone, Default)]
pub struct CutOutcome {
    pub synthetic_starts: BTreeMap<VehicleId, Airport>,
    pub escaped: BTreeSet<VehicleId>,
}

pub fn state(mission: &Mission) -> MissionState {
    if let Some(open) = &mission.open_segment {
        return MissionState::Open(open.index);
    }
    match mission.last_closed() {
        Some(last) if last.active_targets.is_empty() => MissionState::Terminated,
        Some(last) => MissionState::Closed(last.index),
        None => MissionState::Empty,
    }
}

/// Builds segment 0 as an open segment from a first solve (spec §4.8
/// `EMPTY -> OPEN(0)`).
pub fn start_first_segment(
    env: &Environment,
    vehicles: &[VehicleContract],
    policy: &SolvePolicy,
    distance_service: &mut DistanceService,
    timestamp: DateTime<Utc>,
) -> Result<Segment, PlannerError> {
    if !vehicles.iter().any(|v| v.enabled) {
        return Err(PlannerError::InvalidInput("mission has no enabled vehicle".into()));
    }
    let solution = orchestrator::solve(env, vehicles, policy, distance_service);
    Ok(build_segment(BuildSegment {
        index: 0,
        timestamp,
        start_dist: 0.0,
        env,
        vehicles,
        solution: &solution,
        frozen_targets: vec![],
        prev: None,
    }))
}

/// Inputs to [`build_segment`]; bundled because a closed segment needs
/// every piece of context a fresh solve produces (spec §4.8).
struct BuildSegment<'a> {
    index: usize,
    timestamp: DateTime<Utc>,
    start_dist: f64,
    env: &'a Environment,
    vehicles: &'a [VehicleContract],
    solution: &'a Solution,
    frozen_targets: Vec<Target>,
    prev: Option<&'a Segment>,
}

fn build_segment(args: BuildSegment) -> Segment {
    let BuildSegment { index, timestamp, start_dist, env, vehicles, solution, frozen_targets, prev } = args;
    let frozen_ids: BTreeSet<TargetId> = frozen_targets.iter().map(|t| t.id.clone()).collect();
    let active_targets: Vec<Target> =
        env.targets.iter().filter(|t| !frozen_ids.contains(&t.id)).cloned().collect();

    let mut trajectories = BTreeMap::new();
    for vehicle in vehicles {
        let prev_record = prev.and_then(|s| s.trajectories.get(&vehicle.id));

        if !vehicle.enabled {
            let carry = prev_record.cloned().unwrap_or_else(|| VehicleTrajectoryRecord {
                render_full: vec![],
                delta: vec![],
                frozen_end_index: -1,
                route: Default::default(),
                delta_distance: 0.0,
                end_state: EndState {
                    position: env.position_of(&vehicle.start).unwrap_or(Point::new(0.0, 0.0)),
                    fuel_remaining: vehicle.fuel_budget,
                },
            });
            trajectories.insert(vehicle.id.clone(), VehicleTrajectoryRecord::disabled(&carry));
            continue;
        }

        let outcome = solution.routes.get(&vehicle.id);
        let delta = outcome.map(|o| o.trajectory.points.clone()).unwrap_or_default();
        let delta_distance = outcome.map(|o| o.length).unwrap_or(0.0);
        let route = outcome.map(|o| o.route.clone()).unwrap_or_default();
        let fuel_remaining = outcome.map(|o| o.fuel_remaining).unwrap_or(vehicle.fuel_budget);

        let prev_render_full = prev_record.map(|r| r.render_full.clone()).unwrap_or_default();
        let frozen_end_index = prev_render_full.len() as i64 - 1;
        let mut render_full = prev_render_full;
        match (render_full.last(), delta.first()) {
            (Some(last), Some(first)) if last.approx_eq(first) => render_full.extend(delta.iter().skip(1).copied()),
            _ => render_full.extend(delta.iter().copied()),
        }

        let end_state = EndState {
            position: render_full
                .last()
                .copied()
                .unwrap_or_else(|| env.position_of(&vehicle.start).unwrap_or(Point::new(0.0, 0.0))),
            fuel_remaining,
        };

        trajectories.insert(
            vehicle.id.clone(),
            VehicleTrajectoryRecord { render_full, delta, frozen_end_index, route, delta_distance, end_state },
        );
    }

    let all = frozen_targets.iter().chain(active_targets.iter()).cloned().collect();

    Segment {
        index,
        timestamp,
        start_dist,
        end_dist: None,
        contracts: vehicles.iter().map(|v| (v.id.clone(), v.clone())).collect(),
        airports: env.airports.clone(),
        synthetic_starts: env.synthetic_starts.clone(),
        frozen_targets,
        active_targets,
        all,
        threats: env.threats.clone(),
        trajectories,
        cut_positions_at_end: None,
    }
}

/// Cuts the open `segment` at global distance `d` (spec §4.8 "Cut
/// operation"). Truncates each enabled vehicle's `delta`/`render_full`
/// to the interpolated cut point, escaping any position that lands
/// inside a threat from `next_threats`, and closes the segment.
pub fn cut(segment: &mut Segment, d: f64, next_threats: &[Threat]) -> Result<CutOutcome, PlannerError> {
    if segment.end_dist.is_some() {
        return Err(PlannerError::InvalidInput("segment is already closed".into()));
    }
    if d <= segment.start_dist {
        return Err(PlannerError::InvalidInput(format!(
            "cut distance {d} must be greater than segment start {}",
            segment.start_dist
        )));
    }
    let max_delta = segment.trajectories.values().map(|r| r.delta_distance).fold(0.0_f64, f64::max);
    let range_end = segment.start_dist + max_delta;
    if d > range_end + EPSILON_LENGTH {
        return Err(PlannerError::InvalidInput(format!(
            "cut distance {d} outside open segment range [{}, {range_end}]",
            segment.start_dist
        )));
    }

    let local_d = (d - segment.start_dist).max(0.0);
    let disks: Vec<Disk> = next_threats.iter().map(|t| Disk::new(t.center, t.radius)).collect();

    let mut outcome = CutOutcome::default();
    let mut cut_positions = BTreeMap::new();

    for (vid, record) in segment.trajectories.iter_mut() {
        let enabled = segment.contracts.get(vid).is_some_and(|c| c.enabled);
        if !enabled {
            continue;
        }

        let cut_point = point_at_length(&record.delta, local_d);
        cut_positions.insert(vid.clone(), cut_point);

        let escape = disks.iter().find(|disk| disk.engulfs(&cut_point));
        let start_pos = match escape {
            Some(disk) => {
                outcome.escaped.insert(vid.clone());
                disk.escape_point(&cut_point, THREAT_MARGIN)
            }
            None => cut_point,
        };
        outcome
            .synthetic_starts
            .insert(vid.clone(), Airport { id: format!("{vid}_START"), position: start_pos });

        let prefix_len = ((record.frozen_end_index + 1).max(0) as usize).min(record.render_full.len());
        record.render_full.truncate(prefix_len);
        let truncated_delta = truncate_at_length(&record.delta, local_d);
        match (record.render_full.last(), truncated_delta.first()) {
            (Some(last), Some(first)) if last.approx_eq(first) => {
                record.render_full.extend(truncated_delta.iter().skip(1).copied())
            }
            _ => record.render_full.extend(truncated_delta.iter().copied()),
        }
        record.delta = truncated_delta;
        record.delta_distance = polyline_length(&record.delta);
        record.end_state.position = cut_point;
    }

    segment.end_dist = Some(d);
    segment.cut_positions_at_end = Some(cut_positions);

    Ok(outcome)
}

/// Replans the mission from a closed segment, producing the next open
/// segment (spec §4.8 "Replan"). `new_env` must already carry the
/// escaped synthetic starts (from `cut`'s `CutOutcome`) and any
/// mutations to targets/threats; `vehicle_contracts` must start
/// continuing vehicles at `NodeId::SyntheticStart(id)` and any
/// newly-enabled vehicle at its home airport with no frozen prefix
/// (spec "New-vehicle rule").
pub fn replan(
    prior_closed: &Segment,
    new_env: &Environment,
    vehicle_contracts: &[VehicleContract],
    policy: &SolvePolicy,
    distance_service: &mut DistanceService,
    timestamp: DateTime<Utc>,
) -> Result<Segment, PlannerError> {
    let end_dist = prior_closed
        .end_dist
        .ok_or_else(|| PlannerError::InvariantViolation("cannot replan from an open segment".into()))?;

    let solution = orchestrator::solve(new_env, vehicle_contracts, policy, distance_service);

    // Target identity rule: frozen = every target id visited in any
    // prior segment, keeping the coordinates recorded at time of visit.
    let mut frozen_by_id: BTreeMap<TargetId, Target> =
        prior_closed.frozen_targets.iter().map(|t| (t.id.clone(), t.clone())).collect();
    for record in prior_closed.trajectories.values() {
        for tid in record.route.targets() {
            if let Some(t) = prior_closed.active_targets.iter().find(|t| &t.id == tid) {
                frozen_by_id.entry(tid.clone()).or_insert_with(|| t.clone());
            }
        }
    }

    Ok(build_segment(BuildSegment {
        index: prior_closed.index + 1,
        timestamp,
        start_dist: end_dist,
        env: new_env,
        vehicles: vehicle_contracts,
        solution: &solution,
        frozen_targets: frozen_by_id.into_values().collect(),
        prev: Some(prior_closed),
    }))
}
