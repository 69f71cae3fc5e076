//! 2-opt uncross optimizer (spec §4.6): repeatedly reverses a segment
//! bounded by two non-frozen edges when doing so strictly shortens the
//! route, up to a bounded iteration cap.

use crate::config::constant::{EPSILON_LENGTH, TWO_OPT_ITERATION_CAP};
use crate::distance::DistanceMatrix;
use crate::domain::{Route, VehicleContract};

use super::is_frozen_edge;

#[derive(Debug, Clone, Default)]
pub struct TwoOptReport {
    pub reversals_applied: usize,
    pub hit_iteration_cap: bool,
}

pub fn two_opt_uncross(route: &mut Route, matrix: &DistanceMatrix, vehicle: &VehicleContract) -> TwoOptReport {
    let mut report = TwoOptReport::default();
    let n = route.nodes.len();
    if n < 4 {
        return report;
    }

    for _ in 0..TWO_OPT_ITERATION_CAP {
        let mut improved = false;

        'search: for i in 0..n - 3 {
            if is_frozen_edge(vehicle, &route.nodes[i], &route.nodes[i + 1]) {
                continue;
            }
            for j in (i + 2)..n - 1 {
                if is_frozen_edge(vehicle, &route.nodes[j], &route.nodes[j + 1]) {
                    continue;
                }
                let (a, b, c, d) = (&route.nodes[i], &route.nodes[i + 1], &route.nodes[j], &route.nodes[j + 1]);
                let (Some(ab), Some(cd), Some(ac), Some(bd)) = (
                    matrix.distance(a, b),
                    matrix.distance(c, d),
                    matrix.distance(a, c),
                    matrix.distance(b, d),
                ) else {
                    continue;
                };
                if ac + bd < ab + cd - EPSILON_LENGTH {
                    route.nodes[i + 1..=j].reverse();
                    report.reversals_applied += 1;
                    improved = true;
                    break 'search;
                }
            }
        }

        if !improved {
            return report;
        }
    }

    report.hit_iteration_cap = true;
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceService;
    use crate::domain::{Airport, Eligibility, EndpointMode, Environment, NodeId, Target};
    use crate::geometry::Point;

    #[test]
    fn uncrosses_a_crossed_route() {
        // A(0,0) -> T2(10,10) -> T1(10,0) -> T3(0,10) -> A crosses itself;
        // visiting in x-then-y order removes the crossing.
        let env = Environment {
            airports: vec![Airport { id: "A".into(), position: Point::new(0.0, 0.0) }],
            targets: vec![
                Target { id: "T1".into(), position: Point::new(10.0, 0.0), priority: 1, sensor_class: "eo".into() },
                Target { id: "T2".into(), position: Point::new(10.0, 10.0), priority: 1, sensor_class: "eo".into() },
                Target { id: "T3".into(), position: Point::new(0.0, 10.0), priority: 1, sensor_class: "eo".into() },
            ],
            threats: vec![],
            synthetic_starts: Default::default(),
        };
        let nodes = env.all_nodes();
        let mut svc = DistanceService::new();
        let matrix = svc.matrix(&env, &nodes);
        let vehicle = VehicleContract {
            id: "D1".into(),
            enabled: true,
            fuel_budget: 1000.0,
            start: NodeId::Airport("A".into()),
            end: EndpointMode::Return,
            eligibility: Eligibility::All,
            priority_filter: None,
            frozen_edges: vec![],
        };
        let mut route = Route {
            nodes: vec![
                NodeId::Airport("A".into()),
                NodeId::Target("T2".into()),
                NodeId::Target("T1".into()),
                NodeId::Target("T3".into()),
                NodeId::Airport("A".into()),
            ],
        };
        let before = super::super::route_length(&route, matrix).unwrap();
        two_opt_uncross(&mut route, matrix, &vehicle);
        let after = super::super::route_length(&route, matrix).unwrap();
        assert!(after <= before + 1e-9);
    }
}
