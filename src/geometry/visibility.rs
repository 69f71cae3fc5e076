//! Shortest visibility path between two external points around a set of
//! threat disks (spec §4.1, §4.2 algorithm).
//!
//! Per spec: try the straight segment first; if it intersects any disk,
//! route through a visibility graph built from the two endpoints and the
//! tangent points of the disks the straight segment actually intersects,
//! wrapping each transited disk along the shorter arc, and take the
//! minimum over wrap choices. Chains of more than one intersected disk
//! are handled by letting Dijkstra hop between any two nodes (tangent
//! points of different disks included) whose connecting segment is
//! itself clear of every disk.

use std::collections::BinaryHeap;

use crate::config::constant::EPSILON_GEOM;
use crate::geometry::disk::Disk;
use crate::geometry::point::Point;

#[derive(Debug, Clone, Copy)]
struct Node {
    point: Point,
    disk_id: Option<usize>,
    /// For a tangent-point node, the index of the node (0 = `a`, 1 = `b`)
    /// it was constructed tangent to. A straight edge between a node and
    /// its own origin is exempt from that one disk's blocking check —
    /// it touches the boundary only at its endpoint by construction,
    /// which the grazing-epsilon in `segment_intersects` would otherwise
    /// flag as crossing. Any other pairing gets the full check.
    origin: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
enum EdgeKind {
    Straight,
    Arc { ccw: bool },
}

struct Edge {
    to: usize,
    cost: f64,
    kind: EdgeKind,
}

#[derive(PartialEq)]
struct HeapItem(f64, usize);
impl Eq for HeapItem {}
impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Min-heap via reversed total_cmp.
        other.0.total_cmp(&self.0)
    }
}
impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Result of a successful visibility-path query.
pub struct VisibilityPath {
    pub length: f64,
    pub polyline: Vec<Point>,
}

/// Computes the threat-avoiding shortest path from `a` to `b`. Returns
/// `None` if either endpoint is engulfed by a disk (caller must resolve
/// via the escape rule before calling) or if no path exists in the
/// constructed visibility graph.
pub fn shortest_path(a: Point, b: Point, disks: &[Disk]) -> Option<VisibilityPath> {
    if disks.iter().any(|d| d.engulfs(&a) || d.engulfs(&b)) {
        return None;
    }

    let intersected: Vec<usize> = (0..disks.len())
        .filter(|&i| disks[i].segment_intersects(&a, &b))
        .collect();

    if intersected.is_empty() {
        return Some(VisibilityPath {
            length: a.dist(&b),
            polyline: vec![a, b],
        });
    }

    let mut nodes = vec![
        Node { point: a, disk_id: None, origin: None },
        Node { point: b, disk_id: None, origin: None },
    ];
    for &idx in &intersected {
        if let Some((l, r)) = disks[idx].tangent_points(&a) {
            nodes.push(Node { point: l, disk_id: Some(idx), origin: Some(0) });
            nodes.push(Node { point: r, disk_id: Some(idx), origin: Some(0) });
        }
        if let Some((l, r)) = disks[idx].tangent_points(&b) {
            nodes.push(Node { point: l, disk_id: Some(idx), origin: Some(1) });
            nodes.push(Node { point: r, disk_id: Some(idx), origin: Some(1) });
        }
    }

    let n = nodes.len();
    let mut adj: Vec<Vec<Edge>> = (0..n).map(|_| Vec::new()).collect();

    for i in 0..n {
        for j in (i + 1)..n {
            let ni = nodes[i];
            let nj = nodes[j];
            match (ni.disk_id, nj.disk_id) {
                (Some(di), Some(dj)) if di == dj => {
                    let disk = &disks[di];
                    let ccw_len = disk.arc_length(&ni.point, &nj.point, true);
                    let cw_len = disk.arc_length(&ni.point, &nj.point, false);
                    let (cost, ccw) = if (ccw_len - cw_len).abs() < EPSILON_GEOM {
                        // Tie: take whichever side reaches the lower-y tangent point.
                        if ni.point.y <= nj.point.y { (ccw_len, true) } else { (cw_len, false) }
                    } else if ccw_len < cw_len {
                        (ccw_len, true)
                    } else {
                        (cw_len, false)
                    };
                    adj[i].push(Edge { to: j, cost, kind: EdgeKind::Arc { ccw } });
                    adj[j].push(Edge { to: i, cost, kind: EdgeKind::Arc { ccw: !ccw } });
                }
                _ => {
                    let blocked = disks.iter().enumerate().any(|(k, d)| {
                        let exempt = (ni.disk_id == Some(k) && ni.origin == Some(j))
                            || (nj.disk_id == Some(k) && nj.origin == Some(i));
                        if exempt {
                            return false;
                        }
                        d.segment_intersects(&ni.point, &nj.point)
                    });
                    if !blocked {
                        let cost = ni.point.dist(&nj.point);
                        adj[i].push(Edge { to: j, cost, kind: EdgeKind::Straight });
                        adj[j].push(Edge { to: i, cost, kind: EdgeKind::Straight });
                    }
                }
            }
        }
    }

    let (dist, prev) = dijkstra(&adj, 0, n);
    if dist[1].is_infinite() {
        return None;
    }

    let mut path_nodes = vec![1usize];
    let mut cur = 1usize;
    while cur != 0 {
        let p = prev[cur]?;
        path_nodes.push(p);
        cur = p;
    }
    path_nodes.reverse();

    let mut polyline = vec![nodes[path_nodes[0]].point];
    for w in path_nodes.windows(2) {
        let (from, to) = (w[0], w[1]);
        let edge = adj[from].iter().find(|e| e.to == to).unwrap();
        match edge.kind {
            EdgeKind::Straight => polyline.push(nodes[to].point),
            EdgeKind::Arc { ccw } => {
                let disk = &disks[nodes[from].disk_id.unwrap()];
                append_arc_samples(&mut polyline, disk, &nodes[from].point, &nodes[to].point, ccw);
            }
        }
    }
    dedup_consecutive(&mut polyline);

    Some(VisibilityPath { length: dist[1], polyline })
}

fn dijkstra(adj: &[Vec<Edge>], start: usize, n: usize) -> (Vec<f64>, Vec<Option<usize>>) {
    let mut dist = vec![f64::INFINITY; n];
    let mut prev: Vec<Option<usize>> = vec![None; n];
    dist[start] = 0.0;
    let mut heap = BinaryHeap::new();
    heap.push(HeapItem(0.0, start));
    while let Some(HeapItem(d, u)) = heap.pop() {
        if d > dist[u] + EPSILON_GEOM {
            continue;
        }
        for e in &adj[u] {
            let nd = d + e.cost;
            if nd < dist[e.to] - EPSILON_GEOM {
                dist[e.to] = nd;
                prev[e.to] = Some(u);
                heap.push(HeapItem(nd, e.to));
            }
        }
    }
    (dist, prev)
}

/// Subdivide an arc into enough samples that the polyline length
/// converges to the analytic arc length well within `epsilon_length`.
fn append_arc_samples(out: &mut Vec<Point>, disk: &Disk, from: &Point, to: &Point, ccw: bool) {
    let angle = if disk.radius < EPSILON_GEOM {
        0.0
    } else {
        disk.arc_length(from, to, ccw) / disk.radius
    };
    let samples = ((angle / 0.02).ceil() as usize).clamp(8, 4096);
    let a0 = (from.y - disk.center.y).atan2(from.x - disk.center.x);
    let dir = if ccw { 1.0 } else { -1.0 };
    for s in 1..=samples {
        let t = s as f64 / samples as f64;
        let theta = a0 + dir * angle * t;
        out.push(disk.point_at_angle(theta));
    }
}

fn dedup_consecutive(points: &mut Vec<Point>) {
    points.dedup_by(|a, b| a.approx_eq(b));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_path_is_straight() {
        let p = shortest_path(Point::new(0.0, 0.0), Point::new(10.0, 0.0), &[]).unwrap();
        assert!((p.length - 10.0).abs() < 1e-9);
        assert_eq!(p.polyline.len(), 2);
    }

    #[test]
    fn single_threat_forces_detour_longer_than_straight() {
        let disks = vec![Disk::new(Point::new(5.0, 5.0), 2.0)];
        let a = Point::new(0.0, 5.0);
        let b = Point::new(10.0, 5.0);
        let straight = a.dist(&b);
        let p = shortest_path(a, b, &disks).unwrap();
        assert!(p.length > straight);
        // Arc legs are rendered as chords between boundary samples, so
        // each one dips very slightly inside the true circle (the
        // sagitta of its subtended angle) — bounded well under
        // epsilon_length, not exactly zero. `segment_intersects`'s
        // grazing epsilon is for planning decisions, not this
        // render-fidelity check, so compare to the radius directly.
        for w in p.polyline.windows(2) {
            let (closest, _) = crate::geometry::point::closest_point_on_segment(&disks[0].center, &w[0], &w[1]);
            let depth = disks[0].radius - disks[0].center.dist(&closest);
            assert!(depth < 1e-3, "chord dips {depth} inside the disk");
        }
    }

    #[test]
    fn engulfed_endpoint_is_infeasible() {
        let disks = vec![Disk::new(Point::new(0.0, 0.0), 5.0)];
        let result = shortest_path(Point::new(0.0, 0.0), Point::new(10.0, 0.0), &disks);
        assert!(result.is_none());
    }

    #[test]
    fn trajectory_length_matches_matrix_length_within_tolerance() {
        let disks = vec![Disk::new(Point::new(5.0, 5.0), 2.0)];
        let a = Point::new(0.0, 5.0);
        let b = Point::new(10.0, 5.0);
        let p = shortest_path(a, b, &disks).unwrap();
        let realized = crate::geometry::point::polyline_length(&p.polyline);
        let tol = 1e-6 * p.length + 1e-3;
        assert!((realized - p.length).abs() < tol);
    }
}
