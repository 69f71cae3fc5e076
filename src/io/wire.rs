//! Conversions between the core domain types and the external JSON
//! shapes from spec §6. Kept as separate wire DTOs (rather than serde
//! attributes on the domain types) because the wire field names differ
//! from the domain's own (`range` vs `radius`, `type` vs `sensor_class`,
//! flattened `x`/`y` vs a nested `position`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::constant::EPSILON_LENGTH;
use crate::domain::{
    Airport, EndState, Environment, Mission, Route, Segment, Target, Threat, VehicleContract,
    VehicleId, VehicleTrajectoryRecord,
};
use crate::error::PlannerError;
use crate::geometry::point::polyline_length;
use crate::geometry::Point;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireAirport {
    pub id: String,
    #[serde(flatten)]
    pub position: Point,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireTarget {
    pub id: String,
    #[serde(flatten)]
    pub position: Point,
    pub priority: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireThreat {
    pub id: String,
    #[serde(flatten)]
    pub position: Point,
    pub range: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireEnvironment {
    pub airports: Vec<WireAirport>,
    pub targets: Vec<WireTarget>,
    pub threats: Vec<WireThreat>,
    #[serde(default)]
    pub synthetic_starts: BTreeMap<VehicleId, WireAirport>,
}

impl From<&Environment> for WireEnvironment {
    fn from(env: &Environment) -> Self {
        WireEnvironment {
            airports: env.airports.iter().map(|a| WireAirport { id: a.id.clone(), position: a.position }).collect(),
            targets: env
                .targets
                .iter()
                .map(|t| WireTarget { id: t.id.clone(), position: t.position, priority: t.priority, kind: t.sensor_class.clone() })
                .collect(),
            threats: env
                .threats
                .iter()
                .map(|t| WireThreat { id: t.id.clone(), position: t.center, range: t.radius })
                .collect(),
            synthetic_starts: env
                .synthetic_starts
                .iter()
                .map(|(vid, a)| (vid.clone(), WireAirport { id: a.id.clone(), position: a.position }))
                .collect(),
        }
    }
}

impl From<WireEnvironment> for Environment {
    fn from(wire: WireEnvironment) -> Self {
        Environment {
            airports: wire.airports.into_iter().map(|a| Airport { id: a.id, position: a.position }).collect(),
            targets: wire
                .targets
                .into_iter()
                .map(|t| Target { id: t.id, position: t.position, priority: t.priority, sensor_class: t.kind })
                .collect(),
            threats: wire.threats.into_iter().map(|t| Threat { id: t.id, center: t.position, radius: t.range }).collect(),
            synthetic_starts: wire
                .synthetic_starts
                .into_iter()
                .map(|(vid, a)| (vid, Airport { id: a.id, position: a.position }))
                .collect(),
        }
    }
}

pub fn export_environment(env: &Environment) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&WireEnvironment::from(env))
}

pub fn import_environment(json: &str) -> serde_json::Result<Environment> {
    let wire: WireEnvironment = serde_json::from_str(json)?;
    Ok(wire.into())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireWaypoints {
    pub airports: Vec<Airport>,
    #[serde(default)]
    pub synthetic_starts: BTreeMap<VehicleId, Airport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireTargetSets {
    pub frozen: Vec<Target>,
    pub active: Vec<Target>,
    pub all: Vec<Target>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireTrajectoryRecord {
    pub render_full: Vec<Point>,
    pub delta: Vec<Point>,
    #[serde(rename = "frozenEndIndex")]
    pub frozen_end_index: i64,
    pub route: Route,
    #[serde(rename = "deltaDistance")]
    pub delta_distance: f64,
    #[serde(rename = "endState")]
    pub end_state: EndState,
}

impl From<&VehicleTrajectoryRecord> for WireTrajectoryRecord {
    fn from(r: &VehicleTrajectoryRecord) -> Self {
        WireTrajectoryRecord {
            render_full: r.render_full.clone(),
            delta: r.delta.clone(),
            frozen_end_index: r.frozen_end_index,
            route: r.route.clone(),
            delta_distance: r.delta_distance,
            end_state: r.end_state.clone(),
        }
    }
}

impl From<WireTrajectoryRecord> for VehicleTrajectoryRecord {
    fn from(w: WireTrajectoryRecord) -> Self {
        VehicleTrajectoryRecord {
            render_full: w.render_full,
            delta: w.delta,
            frozen_end_index: w.frozen_end_index,
            route: w.route,
            delta_distance: w.delta_distance,
            end_state: w.end_state,
        }
    }
}

/// Wire shape of one mission segment (spec §6 "Segmented-mission JSON").
/// Kept as its own DTO, matching `WireEnvironment`'s pattern, because the
/// wire schema nests `targets`/`waypoints` and camelCases a handful of
/// fields (`frozenEndIndex`, `deltaDistance`, `endState`, `startDist`,
/// `endDist`, `cutPositionsAtEnd`) that the domain `Segment` stores flat
/// and snake_case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireSegment {
    pub index: usize,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub drone_configs: BTreeMap<VehicleId, VehicleContract>,
    pub waypoints: WireWaypoints,
    pub targets: WireTargetSets,
    pub threats: Vec<Threat>,
    pub trajectories: BTreeMap<VehicleId, WireTrajectoryRecord>,
    #[serde(rename = "startDist")]
    pub start_dist: f64,
    #[serde(rename = "endDist")]
    pub end_dist: Option<f64>,
    #[serde(rename = "cutPositionsAtEnd")]
    pub cut_positions_at_end: Option<BTreeMap<VehicleId, Point>>,
}

impl From<&Segment> for WireSegment {
    fn from(s: &Segment) -> Self {
        WireSegment {
            index: s.index,
            timestamp: s.timestamp,
            drone_configs: s.contracts.clone(),
            waypoints: WireWaypoints {
                airports: s.airports.clone(),
                synthetic_starts: s.synthetic_starts.clone(),
            },
            targets: WireTargetSets {
                frozen: s.frozen_targets.clone(),
                active: s.active_targets.clone(),
                all: s.all.clone(),
            },
            threats: s.threats.clone(),
            trajectories: s.trajectories.iter().map(|(vid, r)| (vid.clone(), r.into())).collect(),
            start_dist: s.start_dist,
            end_dist: s.end_dist,
            cut_positions_at_end: s.cut_positions_at_end.clone(),
        }
    }
}

impl From<WireSegment> for Segment {
    fn from(w: WireSegment) -> Self {
        Segment {
            index: w.index,
            timestamp: w.timestamp,
            start_dist: w.start_dist,
            end_dist: w.end_dist,
            contracts: w.drone_configs,
            airports: w.waypoints.airports,
            synthetic_starts: w.waypoints.synthetic_starts,
            frozen_targets: w.targets.frozen,
            active_targets: w.targets.active,
            all: w.targets.all,
            threats: w.threats,
            trajectories: w.trajectories.into_iter().map(|(vid, r)| (vid, r.into())).collect(),
            cut_positions_at_end: w.cut_positions_at_end,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMission {
    pub version: String,
    pub segments: Vec<WireSegment>,
}

/// Exports the committed (closed) segments of `mission` as the
/// segmented-mission JSON, version 2.0 (spec §6).
pub fn export_mission(mission: &Mission) -> serde_json::Result<String> {
    let wire = WireMission {
        version: "2.0".to_string(),
        segments: mission.segments.iter().map(WireSegment::from).collect(),
    };
    serde_json::to_string_pretty(&wire)
}

/// Imports a segmented-mission JSON, falling back to legacy
/// reconciliation (spec §6 "Backward compatible import", §9 open
/// question) when a segment is missing `delta`/`start_dist`/`end_dist`.
/// Any reconciled value that disagrees with a value present in the
/// document by more than `EPSILON_LENGTH` is an import error, not a
/// silent repair (spec §9).
pub fn import_mission(json: &str) -> Result<Mission, PlannerError> {
    if let Ok(wire) = serde_json::from_str::<WireMission>(json) {
        return Ok(Mission { segments: wire.segments.into_iter().map(Segment::from).collect(), open_segment: None });
    }

    let mut value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| PlannerError::ImportError(e.to_string()))?;
    let segments_val = value
        .get_mut("segments")
        .and_then(|v| v.as_array_mut())
        .ok_or_else(|| PlannerError::ImportError("missing \"segments\" array".to_string()))?;

    let mut prev_render_full: BTreeMap<VehicleId, Vec<Point>> = BTreeMap::new();
    let mut cumulative = 0.0_f64;
    let mut segments = Vec::with_capacity(segments_val.len());

    for seg_val in segments_val.iter_mut() {
        let declared_start = seg_val.get("startDist").and_then(|v| v.as_f64());
        if seg_val.get("startDist").is_none() {
            seg_val["startDist"] = serde_json::json!(cumulative);
        }

        let mut max_delta = 0.0_f64;
        if let Some(trajectories) = seg_val.get_mut("trajectories").and_then(|v| v.as_object_mut()) {
            for (vid, record_val) in trajectories.iter_mut() {
                let render_full: Vec<Point> = serde_json::from_value(
                    record_val.get("render_full").cloned().unwrap_or(serde_json::json!([])),
                )
                .map_err(|e| PlannerError::ImportError(format!("vehicle {vid}: {e}")))?;
                let prev = prev_render_full.get(vid).cloned().unwrap_or_default();

                if record_val.get("delta").is_none() {
                    let delta = reconstruct_delta(&prev, &render_full)
                        .ok_or_else(|| PlannerError::ImportError(format!("vehicle {vid}: render_full does not extend previous segment's")))?;
                    record_val["delta"] = serde_json::to_value(&delta).unwrap();
                    if record_val.get("deltaDistance").is_none() {
                        record_val["deltaDistance"] = serde_json::json!(polyline_length(&delta));
                    }
                    if record_val.get("frozenEndIndex").is_none() {
                        record_val["frozenEndIndex"] = serde_json::json!(prev.len() as i64 - 1);
                    }
                } else {
                    let delta: Vec<Point> = serde_json::from_value(record_val["delta"].clone())
                        .map_err(|e| PlannerError::ImportError(format!("vehicle {vid}: {e}")))?;
                    if let Some(declared) = record_val.get("deltaDistance").and_then(|v| v.as_f64()) {
                        let recomputed = polyline_length(&delta);
                        if (recomputed - declared).abs() > EPSILON_LENGTH {
                            return Err(PlannerError::ImportError(format!(
                                "vehicle {vid}: declared deltaDistance {declared} disagrees with recomputed {recomputed}"
                            )));
                        }
                    }
                }

                let this_delta_distance =
                    record_val.get("deltaDistance").and_then(|v| v.as_f64()).unwrap_or(0.0);
                max_delta = max_delta.max(this_delta_distance);
                prev_render_full.insert(vid.clone(), render_full);
            }
        }

        if seg_val.get("endDist").is_none() || seg_val["endDist"].is_null() {
            // leave the last segment open-ended (null) only if this is the final entry;
            // intermediate legacy segments must close at the running cumulative total.
        }
        let start_dist = seg_val.get("startDist").and_then(|v| v.as_f64()).unwrap_or(cumulative);
        if let Some(declared) = declared_start {
            if (declared - start_dist).abs() > EPSILON_LENGTH {
                return Err(PlannerError::ImportError(format!(
                    "declared startDist {declared} disagrees with recomputed {start_dist}"
                )));
            }
        }
        cumulative = start_dist + max_delta;

        let segment: WireSegment =
            serde_json::from_value(seg_val.clone()).map_err(|e| PlannerError::ImportError(e.to_string()))?;
        segments.push(segment.into());
    }

    Ok(Mission { segments, open_segment: None })
}

/// `render_full` for this segment should equal the previous segment's
/// `render_full` with this segment's delta appended (spec §6 "missing
/// `delta` is reconstructed by subtracting the previous segment's
/// `render_full`"). Returns `None` if `render_full` doesn't actually
/// extend `prev`.
fn reconstruct_delta(prev: &[Point], render_full: &[Point]) -> Option<Vec<Point>> {
    if prev.is_empty() {
        return Some(render_full.to_vec());
    }
    if render_full.len() < prev.len() {
        return None;
    }
    for (a, b) in prev.iter().zip(render_full.iter()) {
        if !a.approx_eq(b) {
            return None;
        }
    }
    let mut delta = vec![*prev.last().unwrap()];
    delta.extend_from_slice(&render_full[prev.len()..]);
    Some(delta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_round_trips_through_wire_json() {
        let env = Environment {
            airports: vec![Airport { id: "A".into(), position: Point::new(1.0, 2.0) }],
            targets: vec![Target {
                id: "T1".into(),
                position: Point::new(3.0, 4.0),
                priority: 5,
                sensor_class: "eo".into(),
            }],
            threats: vec![Threat { id: "Z".into(), center: Point::new(5.0, 5.0), radius: 2.0 }],
            synthetic_starts: Default::default(),
        };
        let json = export_environment(&env).unwrap();
        assert!(json.contains("\"range\""));
        assert!(json.contains("\"type\""));
        let round_tripped = import_environment(&json).unwrap();
        assert_eq!(round_tripped.airports, env.airports);
        assert_eq!(round_tripped.targets, env.targets);
        assert_eq!(round_tripped.threats, env.threats);
    }
}
