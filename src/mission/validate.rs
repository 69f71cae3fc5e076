//! Per-segment and cross-segment invariant validator (spec §4.8
//! "Invariant enforcement", §8 property 6). Runs read-only; an invalid
//! mission is reported, never silently repaired.

use std::collections::BTreeSet;

use crate::config::constant::EPSILON_LENGTH;
use crate::domain::Mission;
use crate::error::PlannerError;

pub fn validate_mission(mission: &Mission) -> Result<(), PlannerError> {
    let mut violations = Vec::new();

    let all_segments: Vec<&crate::domain::Segment> =
        mission.segments.iter().chain(mission.open_segment.iter()).collect();

    if let Some(first) = all_segments.first() {
        if first.start_dist.abs() > EPSILON_LENGTH {
            violations.push(format!("segment 0 startDist {} != 0", first.start_dist));
        }
    }

    for (i, segment) in all_segments.iter().enumerate() {
        if segment.index != i {
            violations.push(format!("segment at position {i} has index {}", segment.index));
        }
        if segment.start_dist < 0.0 {
            violations.push(format!("segment {i} has negative startDist {}", segment.start_dist));
        }
        if let Some(end_dist) = segment.end_dist {
            if end_dist < segment.start_dist {
                violations.push(format!("segment {i} endDist {end_dist} < startDist {}", segment.start_dist));
            }
        }

        let frozen_ids: BTreeSet<_> = segment.frozen_targets.iter().map(|t| &t.id).collect();
        let active_ids: BTreeSet<_> = segment.active_targets.iter().map(|t| &t.id).collect();
        if !frozen_ids.is_disjoint(&active_ids) {
            violations.push(format!("segment {i} has targets in both frozen and active sets"));
        }
        let all_ids: BTreeSet<_> = segment.all.iter().map(|t| &t.id).collect();
        let union_ids: BTreeSet<_> = frozen_ids.union(&active_ids).copied().collect();
        if union_ids != all_ids {
            violations.push(format!("segment {i} frozen ∪ active != all"));
        }

        for (vid, record) in &segment.trajectories {
            if record.frozen_end_index >= record.render_full.len() as i64 {
                violations.push(format!(
                    "segment {i} vehicle {vid} frozenEndIndex {} >= renderFull length {}",
                    record.frozen_end_index,
                    record.render_full.len()
                ));
            }
            let enabled = segment.contracts.get(vid).is_none_or(|c| c.enabled);
            if !enabled
                && (!record.delta.is_empty() || !record.route.nodes.is_empty() || record.delta_distance.abs() > EPSILON_LENGTH) {
                    violations.push(format!("segment {i} disabled vehicle {vid} has nonempty delta/route"));
                }
            let mut dedup_seen = false;
            for w in record.delta.windows(2) {
                if w[0].approx_eq(&w[1]) {
                    dedup_seen = true;
                }
            }
            if dedup_seen {
                violations.push(format!("segment {i} vehicle {vid} delta contains duplicate consecutive points"));
            }
        }

        if i > 0 {
            let prev = all_segments[i - 1];
            match prev.end_dist {
                Some(prev_end) if (prev_end - segment.start_dist).abs() > EPSILON_LENGTH => {
                    violations.push(format!(
                        "segment {i} startDist {} != segment {} endDist {prev_end}",
                        segment.start_dist,
                        i - 1
                    ));
                }
                None => violations.push(format!("segment {} has no endDist but segment {i} follows it", i - 1)),
                _ => {}
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(PlannerError::InvariantViolation(violations.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EndState, Mission, Segment, VehicleTrajectoryRecord};
    use crate::geometry::Point;
    use std::collections::BTreeMap;

    fn minimal_segment(index: usize, start_dist: f64, end_dist: Option<f64>) -> Segment {
        Segment {
            index,
            timestamp: chrono::DateTime::from_timestamp(0, 0).unwrap(),
            start_dist,
            end_dist,
            contracts: BTreeMap::new(),
            airports: vec![],
            synthetic_starts: BTreeMap::new(),
            frozen_targets: vec![],
            active_targets: vec![],
            all: vec![],
            threats: vec![],
            trajectories: BTreeMap::new(),
            cut_positions_at_end: None,
        }
    }

    #[test]
    fn accepts_well_formed_single_segment_mission() {
        let mission = Mission { segments: vec![], open_segment: Some(minimal_segment(0, 0.0, None)) };
        assert!(validate_mission(&mission).is_ok());
    }

    #[test]
    fn rejects_nonzero_first_segment_start() {
        let mission = Mission { segments: vec![], open_segment: Some(minimal_segment(0, 5.0, None)) };
        assert!(validate_mission(&mission).is_err());
    }

    #[test]
    fn rejects_non_monotonic_boundary() {
        let mut first = minimal_segment(0, 0.0, Some(10.0));
        let second = minimal_segment(1, 20.0, None);
        first.end_dist = Some(10.0);
        let mission = Mission { segments: vec![first], open_segment: Some(second) };
        assert!(validate_mission(&mission).is_err());
    }

    #[test]
    fn detects_duplicate_points_in_delta() {
        let mut seg = minimal_segment(0, 0.0, None);
        seg.trajectories.insert(
            "D1".into(),
            VehicleTrajectoryRecord {
                render_full: vec![Point::new(0.0, 0.0), Point::new(0.0, 0.0)],
                delta: vec![Point::new(0.0, 0.0), Point::new(0.0, 0.0)],
                frozen_end_index: -1,
                route: Default::default(),
                delta_distance: 0.0,
                end_state: EndState { position: Point::new(0.0, 0.0), fuel_remaining: 10.0 },
            },
        );
        let mission = Mission { segments: vec![], open_segment: Some(seg) };
        assert!(validate_mission(&mission).is_err());
    }
}
