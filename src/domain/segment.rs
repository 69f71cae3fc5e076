//! Segment and Mission records (spec §3 "Segment"/"Mission", §4.8).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::types::{Airport, Route, Target, Threat, VehicleContract, VehicleId};
use crate::geometry::Point;

/// Per-vehicle trajectory bookkeeping inside one segment (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleTrajectoryRecord {
    /// Cumulative polyline from the mission origin, for display.
    pub render_full: Vec<Point>,
    /// This-segment polyline only, for animation/length bookkeeping.
    pub delta: Vec<Point>,
    /// Last index inside `render_full` that belongs to prior segments.
    pub frozen_end_index: i64,
    pub route: Route,
    pub delta_distance: f64,
    pub end_state: EndState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndState {
    pub position: Point,
    pub fuel_remaining: f64,
}

impl VehicleTrajectoryRecord {
    pub fn disabled(carry_forward: &VehicleTrajectoryRecord) -> Self {
        VehicleTrajectoryRecord {
            render_full: carry_forward.render_full.clone(),
            delta: Vec::new(),
            frozen_end_index: carry_forward.render_full.len() as i64 - 1,
            route: Route::default(),
            delta_distance: 0.0,
            end_state: carry_forward.end_state.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub index: usize,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub start_dist: f64,
    pub end_dist: Option<f64>,
    pub contracts: BTreeMap<VehicleId, VehicleContract>,
    pub airports: Vec<Airport>,
    pub synthetic_starts: BTreeMap<VehicleId, Airport>,
    pub frozen_targets: Vec<Target>,
    pub active_targets: Vec<Target>,
    /// The stored union of `frozen_targets` and `active_targets` (spec
    /// §3 "union list"); every target id appears in exactly one of the
    /// two and both together equal this list.
    pub all: Vec<Target>,
    pub threats: Vec<Threat>,
    pub trajectories: BTreeMap<VehicleId, VehicleTrajectoryRecord>,
    pub cut_positions_at_end: Option<BTreeMap<VehicleId, Point>>,
}

impl Segment {
    pub fn all_targets(&self) -> impl Iterator<Item = &Target> {
        self.all.iter()
    }
}

/// Ordered sequence of segments plus a cursor onto the open (in-progress)
/// one, if any (spec §3 "Mission").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    pub segments: Vec<Segment>,
    /// `None` when the mission has not started, or when the last segment
    /// was accepted and no new open segment has been drafted yet.
    pub open_segment: Option<Segment>,
}

impl Mission {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty() && self.open_segment.is_none()
    }

    pub fn last_closed(&self) -> Option<&Segment> {
        self.segments.last()
    }
}
