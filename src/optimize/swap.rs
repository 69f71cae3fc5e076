//! Trajectory-swap optimizer (spec §4.6): moves a target from its
//! current vehicle to a trajectory edge of another vehicle that passes
//! closer to it, when doing so strictly shortens total mission length.

use std::collections::BTreeMap;

use crate::config::constant::EPSILON_LENGTH;
use crate::distance::DistanceMatrix;
use crate::domain::{Environment, NodeId, Route, TargetId, VehicleContract, VehicleId};
use crate::geometry::point::perpendicular_distance;

use super::is_frozen_edge;

#[derive(Debug, Clone, Default)]
pub struct SwapReport {
    pub applied: bool,
    pub moved: Option<(TargetId, VehicleId, VehicleId)>,
}

/// Evaluates every assigned target for a single best-gain swap and, if
/// one exists, applies it. Callers iterate this to a fixpoint (spec
/// §4.6 "one swap per call").
pub fn trajectory_swap(
    env: &Environment,
    matrix: &DistanceMatrix,
    vehicles: &[VehicleContract],
    routes: &mut BTreeMap<VehicleId, Route>,
) -> SwapReport {
    let mut best: Option<(f64, TargetId, VehicleId, VehicleId, usize)> = None; // (gain, target, from, to, insert_pos)

    for vehicle_a in vehicles {
        let Some(route_a) = routes.get(&vehicle_a.id) else { continue };
        for i in 1..route_a.nodes.len().saturating_sub(1) {
            let NodeId::Target(tid) = &route_a.nodes[i] else { continue };
            let Some(target) = env.target(tid) else { continue };
            let (prev, next) = (&route_a.nodes[i - 1], &route_a.nodes[i + 1]);
            if is_frozen_edge(vehicle_a, prev, &route_a.nodes[i])
                || is_frozen_edge(vehicle_a, &route_a.nodes[i], next)
            {
                continue;
            }
            let (Some(prev_point), Some(next_point)) =
                (node_point(matrix, prev), node_point(matrix, next))
            else {
                continue;
            };
            let ssd = perpendicular_distance(&target.position, &prev_point, &next_point);
            if ssd < crate::config::constant::EPSILON_GEOM {
                continue; // NO-SSD NO-MOVE
            }

            let removed_len = match (
                matrix.distance(prev, &route_a.nodes[i]),
                matrix.distance(&route_a.nodes[i], next),
                matrix.distance(prev, next),
            ) {
                (Some(d1), Some(d2), Some(d3)) => d1 + d2 - d3,
                _ => continue,
            };

            for vehicle_b in vehicles {
                if vehicle_b.id == vehicle_a.id
                    || !vehicle_b.enabled
                    || !vehicle_b.eligibility.allows(&target.sensor_class)
                    || !vehicle_b.priority_filter.is_none_or(|f| f.matches(target.priority))
                {
                    continue;
                }
                let Some(route_b) = routes.get(&vehicle_b.id) else { continue };
                for pos in 0..route_b.nodes.len().saturating_sub(1) {
                    let (a, b) = (&route_b.nodes[pos], &route_b.nodes[pos + 1]);
                    if is_frozen_edge(vehicle_b, a, b) {
                        continue;
                    }
                    let (Some(a_pt), Some(b_pt)) = (node_point(matrix, a), node_point(matrix, b)) else {
                        continue;
                    };
                    let osd = perpendicular_distance(&target.position, &a_pt, &b_pt);
                    let gain = ssd - osd;
                    if gain <= 0.0 {
                        continue;
                    }
                    let node = NodeId::Target(tid.clone());
                    let (Some(da), Some(db), Some(dab)) =
                        (matrix.distance(a, &node), matrix.distance(&node, b), matrix.distance(a, b))
                    else {
                        continue;
                    };
                    let added_len = da + db - dab;
                    let b_current = super::route_length(route_b, matrix).unwrap_or(0.0);
                    if b_current + added_len > vehicle_b.fuel_budget + EPSILON_LENGTH {
                        continue;
                    }
                    let total_delta = added_len - removed_len;
                    if total_delta >= -EPSILON_LENGTH {
                        continue; // must strictly decrease total length
                    }
                    if best.as_ref().is_none_or(|(g, ..)| gain > *g) {
                        best = Some((gain, tid.clone(), vehicle_a.id.clone(), vehicle_b.id.clone(), pos));
                    }
                }
            }
        }
    }

    let Some((_, tid, from, to, pos)) = best else {
        return SwapReport::default();
    };

    {
        let route_a = routes.get_mut(&from).unwrap();
        route_a.nodes.retain(|n| n != &NodeId::Target(tid.clone()));
    }
    {
        let route_b = routes.get_mut(&to).unwrap();
        route_b.nodes.insert(pos + 1, NodeId::Target(tid.clone()));
    }

    SwapReport { applied: true, moved: Some((tid, from, to)) }
}

fn node_point(matrix: &DistanceMatrix, node: &NodeId) -> Option<crate::geometry::Point> {
    matrix.path(node, node).and_then(|p| p.first().copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceService;
    use crate::domain::{Airport, EndpointMode, Eligibility, Target};
    use crate::geometry::Point;

    fn vehicle(id: &str, start: NodeId, budget: f64) -> VehicleContract {
        VehicleContract {
            id: id.into(),
            enabled: true,
            fuel_budget: budget,
            start,
            end: EndpointMode::Return,
            eligibility: Eligibility::All,
            priority_filter: None,
            frozen_edges: vec![],
        }
    }

    #[test]
    fn swap_moves_target_to_closer_vehicle_and_shortens_mission() {
        let env = Environment {
            airports: vec![
                Airport { id: "A1".into(), position: Point::new(0.0, 0.0) },
                Airport { id: "A2".into(), position: Point::new(20.0, 0.0) },
            ],
            targets: vec![Target {
                id: "T3".into(),
                // Much nearer A2 than A1: wrongly assigned to D1 below,
                // so its SSD (distance back to A1) dwarfs its OSD
                // (distance to A2), giving the swap a clear gain.
                position: Point::new(18.0, 0.0),
                priority: 0,
                sensor_class: "eo".into(),
            }],
            threats: vec![],
            synthetic_starts: Default::default(),
        };
        let nodes = env.all_nodes();
        let mut svc = DistanceService::new();
        let matrix = svc.matrix(&env, &nodes).clone();
        let vehicles = vec![
            vehicle("D1", NodeId::Airport("A1".into()), 60.0),
            vehicle("D2", NodeId::Airport("A2".into()), 60.0),
        ];
        let mut routes = BTreeMap::new();
        routes.insert(
            "D1".to_string(),
            Route {
                nodes: vec![
                    NodeId::Airport("A1".into()),
                    NodeId::Target("T3".into()),
                    NodeId::Airport("A1".into()),
                ],
            },
        );
        routes.insert(
            "D2".to_string(),
            Route { nodes: vec![NodeId::Airport("A2".into()), NodeId::Airport("A2".into())] },
        );
        let report = trajectory_swap(&env, &matrix, &vehicles, &mut routes);
        assert!(report.applied);
        assert_eq!(report.moved.unwrap().0, "T3".to_string());
        assert!(routes["D2"].targets().any(|t| t == "T3"));
        assert!(!routes["D1"].targets().any(|t| t == "T3"));
    }
}
