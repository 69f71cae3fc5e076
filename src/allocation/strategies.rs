//! The five allocation strategies (spec §4.4).

use std::collections::BTreeMap;

use crate::config::constant::AUCTION_EPSILON;
use crate::config::AllocationStrategy;
use crate::distance::DistanceMatrix;
use crate::domain::{Environment, NodeId, Target, TargetId, VehicleContract, VehicleId};
use crate::geometry::Point;

/// Per-vehicle running state used by the insertion-cost heuristics: the
/// position the next candidate's insertion delta is measured from, and
/// how many targets have been assigned so far (for the soft cap).
struct VehicleCursor {
    start: NodeId,
    current: NodeId,
    count: usize,
}

pub struct StrategyContext<'a> {
    pub env: &'a Environment,
    pub matrix: &'a DistanceMatrix,
    pub vehicles: &'a [VehicleContract],
    pub cap: usize,
}

/// `eligible[target_id]` lists the ids of vehicles eligible to service
/// that target (already filtered for threat/eligibility/priority by the
/// caller).
pub fn assign(
    strategy: AllocationStrategy,
    targets: &[&Target],
    eligible: &BTreeMap<TargetId, Vec<VehicleId>>,
    ctx: &StrategyContext,
) -> (BTreeMap<VehicleId, Vec<TargetId>>, Vec<TargetId>) {
    match strategy {
        AllocationStrategy::Efficient => efficient(targets, eligible, ctx),
        AllocationStrategy::Greedy => greedy(targets, eligible, ctx),
        AllocationStrategy::Balanced => balanced(targets, eligible, ctx),
        AllocationStrategy::Geographic => geographic(targets, eligible, ctx),
        AllocationStrategy::Exclusive => exclusive(targets, eligible, ctx),
    }
}

fn init_cursors(ctx: &StrategyContext) -> BTreeMap<VehicleId, VehicleCursor> {
    ctx.vehicles
        .iter()
        .filter(|v| v.enabled)
        .map(|v| {
            (
                v.id.clone(),
                VehicleCursor { start: v.start.clone(), current: v.start.clone(), count: 0 },
            )
        })
        .collect()
}

fn insertion_delta(cursor: &VehicleCursor, target_node: &NodeId, matrix: &DistanceMatrix) -> Option<f64> {
    matrix.distance(&cursor.current, target_node)
}

/// `priority / (insertion_delta + eps)`: the auction-style value ratio
/// shared by `efficient` and the tail of `exclusive`.
fn value_ratio(priority: i64, delta: f64) -> f64 {
    (priority as f64) / (delta + AUCTION_EPSILON)
}

fn efficient(
    targets: &[&Target],
    eligible: &BTreeMap<TargetId, Vec<VehicleId>>,
    ctx: &StrategyContext,
) -> (BTreeMap<VehicleId, Vec<TargetId>>, Vec<TargetId>) {
    let mut cursors = init_cursors(ctx);
    let mut assignment: BTreeMap<VehicleId, Vec<TargetId>> = cursors.keys().cloned().map(|k| (k, vec![])).collect();
    let mut remaining: Vec<&Target> = targets.to_vec();
    let mut at_cap_exclusions = Vec::new();

    loop {
        let mut best: Option<(f64, usize, VehicleId)> = None;
        for (idx, t) in remaining.iter().enumerate() {
            let Some(candidates) = eligible.get(&t.id) else { continue };
            for vid in candidates {
                let Some(cursor) = cursors.get(vid) else { continue };
                if cursor.count >= ctx.cap {
                    continue;
                }
                let node = NodeId::Target(t.id.clone());
                let Some(delta) = insertion_delta(cursor, &node, ctx.matrix) else { continue };
                let score = value_ratio(t.priority, delta);
                if best.as_ref().is_none_or(|(b, _, _)| score > *b) {
                    best = Some((score, idx, vid.clone()));
                }
            }
        }
        let Some((_, idx, vid)) = best else { break };
        let t = remaining.remove(idx);
        let node = NodeId::Target(t.id.clone());
        assignment.get_mut(&vid).unwrap().push(t.id.clone());
        if let Some(cursor) = cursors.get_mut(&vid) {
            cursor.current = node;
            cursor.count += 1;
        }
    }

    for t in remaining {
        if eligible.get(&t.id).is_some_and(|v| !v.is_empty()) {
            at_cap_exclusions.push(t.id.clone());
        }
    }
    (assignment, at_cap_exclusions)
}

fn greedy(
    targets: &[&Target],
    eligible: &BTreeMap<TargetId, Vec<VehicleId>>,
    ctx: &StrategyContext,
) -> (BTreeMap<VehicleId, Vec<TargetId>>, Vec<TargetId>) {
    let mut cursors = init_cursors(ctx);
    let mut assignment: BTreeMap<VehicleId, Vec<TargetId>> = cursors.keys().cloned().map(|k| (k, vec![])).collect();
    let mut sorted: Vec<&Target> = targets.to_vec();
    sorted.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));

    let mut excluded = Vec::new();
    for t in sorted {
        let node = NodeId::Target(t.id.clone());
        let Some(candidates) = eligible.get(&t.id) else { continue };
        let best = candidates
            .iter()
            .filter_map(|vid| {
                let cursor = cursors.get(vid)?;
                if cursor.count >= ctx.cap {
                    return None;
                }
                insertion_delta(cursor, &node, ctx.matrix).map(|d| (d, vid.clone()))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0));

        match best {
            Some((_, vid)) => {
                assignment.get_mut(&vid).unwrap().push(t.id.clone());
                let cursor = cursors.get_mut(&vid).unwrap();
                cursor.current = node;
                cursor.count += 1;
            }
            None if !candidates.is_empty() => excluded.push(t.id.clone()),
            None => {}
        }
    }
    (assignment, excluded)
}

fn balanced(
    targets: &[&Target],
    eligible: &BTreeMap<TargetId, Vec<VehicleId>>,
    ctx: &StrategyContext,
) -> (BTreeMap<VehicleId, Vec<TargetId>>, Vec<TargetId>) {
    let mut cursors = init_cursors(ctx);
    let mut assignment: BTreeMap<VehicleId, Vec<TargetId>> = cursors.keys().cloned().map(|k| (k, vec![])).collect();
    let mut sorted: Vec<&Target> = targets.to_vec();
    sorted.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));

    let mut excluded = Vec::new();
    for t in sorted {
        let node = NodeId::Target(t.id.clone());
        let Some(candidates) = eligible.get(&t.id) else { continue };
        let usable: Vec<&VehicleId> = candidates
            .iter()
            .filter(|vid| cursors.get(*vid).is_some_and(|c| c.count < ctx.cap))
            .collect();
        if usable.is_empty() {
            if !candidates.is_empty() {
                excluded.push(t.id.clone());
            }
            continue;
        }
        let min_count = usable.iter().map(|vid| cursors[*vid].count).min().unwrap();
        let chosen = usable
            .into_iter()
            .filter(|vid| cursors[*vid].count == min_count)
            .min_by(|a, b| {
                let da = insertion_delta(&cursors[*a], &node, ctx.matrix).unwrap_or(f64::INFINITY);
                let db = insertion_delta(&cursors[*b], &node, ctx.matrix).unwrap_or(f64::INFINITY);
                da.total_cmp(&db)
            })
            .unwrap()
            .clone();
        assignment.get_mut(&chosen).unwrap().push(t.id.clone());
        let cursor = cursors.get_mut(&chosen).unwrap();
        cursor.current = node;
        cursor.count += 1;
    }
    (assignment, excluded)
}

fn geographic(
    targets: &[&Target],
    eligible: &BTreeMap<TargetId, Vec<VehicleId>>,
    ctx: &StrategyContext,
) -> (BTreeMap<VehicleId, Vec<TargetId>>, Vec<TargetId>) {
    let mut cursors = init_cursors(ctx);
    let mut assignment: BTreeMap<VehicleId, Vec<TargetId>> = cursors.keys().cloned().map(|k| (k, vec![])).collect();

    let centroid = centroid_of_airports(ctx.env);
    // Sector ownership: order enabled vehicles by the angle of their
    // start node around the centroid; each owns an equal angular wedge.
    let mut vehicle_angles: Vec<(VehicleId, f64)> = cursors
        .iter()
        .map(|(vid, c)| {
            let pos = ctx.env.position_of(&c.start).unwrap_or(centroid);
            (vid.clone(), angle_of(&centroid, &pos))
        })
        .collect();
    vehicle_angles.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut excluded = Vec::new();
    for t in targets {
        let node = NodeId::Target(t.id.clone());
        let Some(candidates) = eligible.get(&t.id) else { continue };
        if candidates.is_empty() {
            continue;
        }
        let theta = angle_of(&centroid, &t.position);
        // Owner = the vehicle whose angle is nearest `theta`, among the
        // whole fleet; if that owner isn't eligible, fall back to the
        // nearest eligible vehicle by angular distance.
        let owner = vehicle_angles
            .iter()
            .filter(|(vid, _)| candidates.contains(vid) && cursors.get(vid).is_some_and(|c| c.count < ctx.cap))
            .min_by(|a, b| angular_distance(a.1, theta).total_cmp(&angular_distance(b.1, theta)));

        match owner {
            Some((vid, _)) => {
                let vid = vid.clone();
                assignment.get_mut(&vid).unwrap().push(t.id.clone());
                let cursor = cursors.get_mut(&vid).unwrap();
                cursor.current = node;
                cursor.count += 1;
            }
            None => excluded.push(t.id.clone()),
        }
    }
    (assignment, excluded)
}

fn exclusive(
    targets: &[&Target],
    eligible: &BTreeMap<TargetId, Vec<VehicleId>>,
    ctx: &StrategyContext,
) -> (BTreeMap<VehicleId, Vec<TargetId>>, Vec<TargetId>) {
    let mut cursors = init_cursors(ctx);
    let mut assignment: BTreeMap<VehicleId, Vec<TargetId>> = cursors.keys().cloned().map(|k| (k, vec![])).collect();

    let (sole, rest): (Vec<&Target>, Vec<&Target>) = targets
        .iter()
        .partition(|t| eligible.get(&t.id).is_some_and(|v| v.len() == 1));

    let mut excluded = Vec::new();
    let mut sole_sorted = sole;
    sole_sorted.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
    for t in sole_sorted {
        let vid = eligible[&t.id][0].clone();
        let Some(cursor) = cursors.get(&vid) else { continue };
        if cursor.count >= ctx.cap {
            excluded.push(t.id.clone());
            continue;
        }
        let node = NodeId::Target(t.id.clone());
        assignment.get_mut(&vid).unwrap().push(t.id.clone());
        let cursor = cursors.get_mut(&vid).unwrap();
        cursor.current = node;
        cursor.count += 1;
    }

    let ctx_remaining = StrategyContext { env: ctx.env, matrix: ctx.matrix, vehicles: ctx.vehicles, cap: ctx.cap };
    let (rest_assignment, rest_excluded) = efficient_with_cursors(&rest, eligible, &ctx_remaining, cursors);
    for (vid, mut ts) in rest_assignment {
        assignment.entry(vid).or_default().append(&mut ts);
    }
    excluded.extend(rest_excluded);
    (assignment, excluded)
}

/// Like `efficient`, but continuing from already-seeded cursors (used by
/// `exclusive` to keep insertion-delta bookkeeping coherent across its
/// two phases).
fn efficient_with_cursors(
    targets: &[&Target],
    eligible: &BTreeMap<TargetId, Vec<VehicleId>>,
    ctx: &StrategyContext,
    mut cursors: BTreeMap<VehicleId, VehicleCursor>,
) -> (BTreeMap<VehicleId, Vec<TargetId>>, Vec<TargetId>) {
    let mut assignment: BTreeMap<VehicleId, Vec<TargetId>> = cursors.keys().cloned().map(|k| (k, vec![])).collect();
    let mut remaining: Vec<&Target> = targets.to_vec();
    loop {
        let mut best: Option<(f64, usize, VehicleId)> = None;
        for (idx, t) in remaining.iter().enumerate() {
            let Some(candidates) = eligible.get(&t.id) else { continue };
            for vid in candidates {
                let Some(cursor) = cursors.get(vid) else { continue };
                if cursor.count >= ctx.cap {
                    continue;
                }
                let node = NodeId::Target(t.id.clone());
                let Some(delta) = insertion_delta(cursor, &node, ctx.matrix) else { continue };
                let score = value_ratio(t.priority, delta);
                if best.as_ref().is_none_or(|(b, _, _)| score > *b) {
                    best = Some((score, idx, vid.clone()));
                }
            }
        }
        let Some((_, idx, vid)) = best else { break };
        let t = remaining.remove(idx);
        let node = NodeId::Target(t.id.clone());
        assignment.get_mut(&vid).unwrap().push(t.id.clone());
        if let Some(cursor) = cursors.get_mut(&vid) {
            cursor.current = node;
            cursor.count += 1;
        }
    }
    let excluded = remaining
        .into_iter()
        .filter(|t| eligible.get(&t.id).is_some_and(|v| !v.is_empty()))
        .map(|t| t.id.clone())
        .collect();
    (assignment, excluded)
}

fn centroid_of_airports(env: &Environment) -> Point {
    if env.airports.is_empty() {
        return Point::new(0.0, 0.0);
    }
    let (sx, sy) = env.airports.iter().fold((0.0, 0.0), |(sx, sy), a| (sx + a.position.x, sy + a.position.y));
    let n = env.airports.len() as f64;
    Point::new(sx / n, sy / n)
}

fn angle_of(center: &Point, p: &Point) -> f64 {
    (p.y - center.y).atan2(p.x - center.x)
}

fn angular_distance(a: f64, b: f64) -> f64 {
    let two_pi = std::f64::consts::TAU;
    let d = (a - b).rem_euclid(two_pi);
    d.min(two_pi - d)
}
