//! Exact Held-Karp DP orienteering solver (spec §4.5): maximizes total
//! priority subject to a length budget, for up to `K` candidate targets.

use std::time::Instant;

use crate::distance::DistanceMatrix;
use crate::domain::{NodeId, TargetId};
use crate::error::SolveError;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Value {
    priority: i64,
    length: f64,
}

impl Value {
    /// Tie-break per spec §4.5: higher priority wins; same priority,
    /// lower length wins.
    fn better_than(&self, other: &Value) -> bool {
        (self.priority, std::cmp::Reverse(ordered_float(self.length)))
            > (other.priority, std::cmp::Reverse(ordered_float(other.length)))
    }
}

fn ordered_float(f: f64) -> i64 {
    // Length is always finite and nonnegative here; scale to an
    // orderable integer so Value can derive a total order for tuple
    // comparison without pulling in an external ordered-float crate.
    (f * 1e9) as i64
}

#[derive(Debug)]
pub struct HeldKarpResult {
    pub order: Vec<TargetId>,
    pub priority: i64,
    pub length: f64,
}

/// Runs the exact DP over `candidates` from `start` to `end`, returning
/// the best subset/order within `budget`, or a `SolveError` if even the
/// empty route is infeasible.
pub fn solve(
    start: &NodeId,
    end: &NodeId,
    candidates: &[(TargetId, i64)],
    matrix: &DistanceMatrix,
    budget: f64,
    deadline: Option<Instant>,
) -> Result<HeldKarpResult, SolveError> {
    let m = candidates.len();
    let nodes: Vec<NodeId> = candidates.iter().map(|(id, _)| NodeId::Target(id.clone())).collect();

    let trivial_length = matrix.distance(start, end).ok_or(SolveError::InfeasibleFuel)?;
    let mut best = Value { priority: 0, length: trivial_length };
    let mut best_mask = 0u32;
    let mut best_last: Option<usize> = None;

    if trivial_length > budget {
        return Err(SolveError::InfeasibleFuel);
    }

    if m == 0 {
        return Ok(HeldKarpResult { order: vec![], priority: 0, length: trivial_length });
    }

    let full = 1u32 << m;
    // dp[mask][j] = best (priority, length) visiting exactly `mask`
    // ending at target j, measured from `start`. `None` = unreachable.
    let mut dp: Vec<Vec<Option<Value>>> = vec![vec![None; m]; full as usize];

    for j in 0..m {
        if let Some(d) = matrix.distance(start, &nodes[j]) {
            dp[1 << j][j] = Some(Value { priority: candidates[j].1, length: d });
        }
    }

    for mask in 1..full {
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Err(SolveError::InfeasibleFuel);
            }
        }
        for last in 0..m {
            if mask & (1 << last) == 0 {
                continue;
            }
            let Some(cur) = dp[mask as usize][last] else { continue };

            // Consider terminating here.
            if let Some(d_end) = matrix.distance(&nodes[last], end) {
                let total_len = cur.length + d_end;
                if total_len <= budget {
                    let candidate = Value { priority: cur.priority, length: total_len };
                    if candidate.better_than(&best) {
                        best = candidate;
                        best_mask = mask;
                        best_last = Some(last);
                    }
                }
            }

            // Extend to every unvisited candidate.
            for next in 0..m {
                if mask & (1 << next) != 0 {
                    continue;
                }
                let Some(d) = matrix.distance(&nodes[last], &nodes[next]) else { continue };
                let candidate_len = cur.length + d;
                if candidate_len > budget {
                    continue;
                }
                let candidate = Value { priority: cur.priority + candidates[next].1, length: candidate_len };
                let next_mask = (mask | (1 << next)) as usize;
                let better = match dp[next_mask][next] {
                    Some(existing) => candidate.better_than(&existing),
                    None => true,
                };
                if better {
                    dp[next_mask][next] = Some(candidate);
                }
            }
        }
    }

    if best_last.is_none() {
        // No non-trivial route fit; the trivial route (already seeded in
        // `best`) stands, which is the EMPTY_CANDIDATES / fully-pruned
        // fallback from spec §4.5.
        return Ok(HeldKarpResult { order: vec![], priority: best.priority, length: best.length });
    }

    let order = reconstruct(&dp, best_mask, best_last.unwrap(), candidates, &nodes, matrix);
    Ok(HeldKarpResult { order, priority: best.priority, length: best.length })
}

fn reconstruct(
    dp: &[Vec<Option<Value>>],
    mut mask: u32,
    mut last: usize,
    candidates: &[(TargetId, i64)],
    nodes: &[NodeId],
    matrix: &DistanceMatrix,
) -> Vec<TargetId> {
    let mut order = vec![candidates[last].0.clone()];
    while mask.count_ones() > 1 {
        let cur = dp[mask as usize][last].unwrap();
        let prev_mask = mask & !(1 << last);
        // Find the predecessor `p` whose recorded length plus the edge
        // to `last` reproduces `cur.length` — priority alone doesn't
        // disambiguate since it only depends on the visited set, not
        // the path, but length does.
        let mut found = None;
        for p in 0..candidates.len() {
            if prev_mask & (1 << p) == 0 {
                continue;
            }
            if let Some(prev_val) = dp[prev_mask as usize][p] {
                if let Some(edge) = matrix.distance(&nodes[p], &nodes[last]) {
                    if (prev_val.length + edge - cur.length).abs() < 1e-6 {
                        found = Some(p);
                        break;
                    }
                }
            }
        }
        match found {
            Some(p) => {
                order.push(candidates[p].0.clone());
                mask = prev_mask;
                last = p;
            }
            None => break,
        }
    }
    order.reverse();
    order
}
