//! Insert-missed optimizer (spec §4.6): targets unvisited by any
//! vehicle are offered, in descending priority order, to every eligible
//! vehicle at every non-frozen insertion position; the cheapest
//! feasible insertion is accepted.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::constant::EPSILON_LENGTH;
use crate::distance::DistanceMatrix;
use crate::domain::{Environment, NodeId, Route, TargetId, VehicleContract, VehicleId};

use super::is_frozen_edge;

#[derive(Debug, Clone, Default)]
pub struct InsertReport {
    pub inserted: Vec<(TargetId, VehicleId)>,
    pub still_missing: Vec<TargetId>,
}

/// Attempts to insert every target in `candidates` that is not already
/// present in any route. Mutates `routes` in place.
pub fn insert_missed(
    env: &Environment,
    matrix: &DistanceMatrix,
    vehicles: &[VehicleContract],
    routes: &mut BTreeMap<VehicleId, Route>,
    candidates: &[(TargetId, i64)],
) -> InsertReport {
    let visited: BTreeSet<TargetId> =
        routes.values().flat_map(|r| r.targets().cloned()).collect();

    let mut missing: Vec<&(TargetId, i64)> =
        candidates.iter().filter(|(tid, _)| !visited.contains(tid)).collect();
    missing.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut report = InsertReport::default();

    for (tid, _prio) in missing {
        let Some(target) = env.target(tid) else { continue };
        if env.is_threatened(&target.position) {
            report.still_missing.push(tid.clone());
            continue;
        }

        let mut best: Option<(VehicleId, usize, f64)> = None;
        for vehicle in vehicles {
            if !vehicle.enabled || !vehicle.eligibility.allows(&target.sensor_class) {
                continue;
            }
            if !vehicle.priority_filter.is_none_or(|f| f.matches(target.priority)) {
                continue;
            }
            let Some(route) = routes.get(&vehicle.id) else { continue };
            let node = NodeId::Target(tid.clone());
            let current_len = super::route_length(route, matrix).unwrap_or(f64::INFINITY);

            for pos in 0..route.nodes.len().saturating_sub(1) {
                let (a, b) = (&route.nodes[pos], &route.nodes[pos + 1]);
                if is_frozen_edge(vehicle, a, b) {
                    continue;
                }
                let (Some(da), Some(db), Some(dab)) =
                    (matrix.distance(a, &node), matrix.distance(&node, b), matrix.distance(a, b))
                else {
                    continue;
                };
                let added = da + db - dab;
                let new_len = current_len + added;
                if new_len > vehicle.fuel_budget + EPSILON_LENGTH {
                    continue;
                }
                if best.as_ref().is_none_or(|(_, _, b)| added < *b) {
                    best = Some((vehicle.id.clone(), pos, added));
                }
            }
        }

        // Accept only if the insertion strictly increases total priority, or
        // (priority unchanged, i.e. a zero-priority target) strictly
        // decreases total length — a positive-priority target always
        // qualifies; a zero/negative-priority one almost never does, since
        // the triangle inequality makes `added` non-negative.
        match best {
            Some((vid, pos, added))
                if target.priority > 0 || (target.priority == 0 && added < -EPSILON_LENGTH) =>
            {
                let route = routes.get_mut(&vid).unwrap();
                route.nodes.insert(pos + 1, NodeId::Target(tid.clone()));
                report.inserted.push((tid.clone(), vid));
            }
            _ => report.still_missing.push(tid.clone()),
        }
    }

    report
}
