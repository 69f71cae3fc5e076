//! Greedy orienteering fallback (spec §4.5): used when the candidate
//! count exceeds the Held-Karp cap `K`. Repeatedly inserts the
//! candidate/position pair with the best priority-per-added-length
//! ratio until the budget is exhausted.

use crate::config::constant::AUCTION_EPSILON;
use crate::distance::DistanceMatrix;
use crate::domain::{NodeId, TargetId};
use crate::error::SolveError;

pub struct GreedyResult {
    pub order: Vec<TargetId>,
    pub priority: i64,
    pub length: f64,
}

pub fn solve(
    start: &NodeId,
    end: &NodeId,
    candidates: &[(TargetId, i64)],
    matrix: &DistanceMatrix,
    budget: f64,
) -> Result<GreedyResult, SolveError> {
    let trivial = matrix.distance(start, end).ok_or(SolveError::InfeasibleFuel)?;
    if trivial > budget {
        return Err(SolveError::InfeasibleFuel);
    }

    let mut route: Vec<NodeId> = vec![start.clone(), end.clone()];
    let mut length = trivial;
    let mut priority = 0i64;
    let mut remaining: Vec<&(TargetId, i64)> = candidates.iter().collect();

    loop {
        let mut best: Option<(f64, usize, usize, f64)> = None; // (score, cand_idx, insert_pos, added_len)
        for (cand_idx, (tid, prio)) in remaining.iter().enumerate() {
            let node = NodeId::Target(tid.clone());
            for pos in 0..(route.len() - 1) {
                let (a, b) = (&route[pos], &route[pos + 1]);
                let (Some(da), Some(db), Some(dab)) =
                    (matrix.distance(a, &node), matrix.distance(&node, b), matrix.distance(a, b))
                else {
                    continue;
                };
                let added = da + db - dab;
                if length + added > budget + crate::config::constant::EPSILON_LENGTH {
                    continue;
                }
                let score = (*prio as f64) / (added + AUCTION_EPSILON);
                if best.is_none_or(|(b, ..)| score > b) {
                    best = Some((score, cand_idx, pos, added));
                }
            }
        }

        let Some((_, cand_idx, pos, added)) = best else { break };
        let (tid, prio) = remaining.remove(cand_idx).clone();
        route.insert(pos + 1, NodeId::Target(tid));
        length += added;
        priority += prio;
    }

    let order = route[1..route.len() - 1]
        .iter()
        .map(|n| match n {
            NodeId::Target(id) => id.clone(),
            other => unreachable!("greedy route body must only contain targets, found {other:?}"),
        })
        .collect();

    Ok(GreedyResult { order, priority, length })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceService;
    use crate::domain::{Airport, Environment, Target};
    use crate::geometry::Point;

    #[test]
    fn greedy_fills_budget_with_high_value_targets() {
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
        let nodes = env.all_nodes();
        let mut svc = DistanceService::new();
        let matrix = svc.matrix(&env, &nodes);
        let start = NodeId::Airport("A".into());
        let candidates = vec![("T1".to_string(), 5), ("T2".to_string(), 5), ("T3".to_string(), 10)];
        let result = solve(&start, &start, &candidates, matrix, 60.0).unwrap();
        assert_eq!(result.order.len(), 3);
        assert_eq!(result.priority, 20);
    }
}
