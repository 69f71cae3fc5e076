//! Core data model (spec §3): airports, targets, threats, vehicle
//! contracts, nodes, routes, and trajectories.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

pub type AirportId = String;
pub type TargetId = String;
pub type ThreatId = String;
pub type VehicleId = String;
pub type SensorClass = String;

/// Any point the distance matrix / trajectory planner can route between:
/// a real airport, an active target, or a per-vehicle synthetic start.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub enum NodeId {
    Airport(AirportId),
    Target(TargetId),
    SyntheticStart(VehicleId),
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeId::Airport(id) => write!(f, "{id}"),
            NodeId::Target(id) => write!(f, "{id}"),
            NodeId::SyntheticStart(id) => write!(f, "{id}_START"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    pub id: AirportId,
    pub position: Point,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,
    pub position: Point,
    pub priority: i64,
    pub sensor_class: SensorClass,
}

/// A named threat; the environment carries a stable string id while the
/// geometry kernel only ever sees centers/radii (`Disk`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threat {
    pub id: ThreatId,
    pub center: Point,
    pub radius: f64,
}

/// Comparison predicate for a vehicle's priority filter (spec §3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PriorityOp {
    Ge,
    Gt,
    Le,
    Lt,
    Eq,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorityFilter {
    pub op: PriorityOp,
    pub value: i64,
}

impl PriorityFilter {
    pub fn matches(&self, priority: i64) -> bool {
        match self.op {
            PriorityOp::Ge => priority >= self.value,
            PriorityOp::Gt => priority > self.value,
            PriorityOp::Le => priority <= self.value,
            PriorityOp::Lt => priority < self.value,
            PriorityOp::Eq => priority == self.value,
        }
    }
}

/// Eligibility set: either "all sensor classes" or an explicit allowlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Eligibility {
    All,
    Classes(BTreeSet<SensorClass>),
}

impl Eligibility {
    pub fn allows(&self, class: &str) -> bool {
        match self {
            Eligibility::All => true,
            Eligibility::Classes(set) => set.contains(class),
        }
    }
}

/// Either a fixed end node or a flexible endpoint chosen by the solver
/// from an allowed set (spec §4.5 `best_end` mode).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EndpointMode {
    Return,
    FixedEnd(NodeId),
    BestEnd(Vec<NodeId>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleContract {
    pub id: VehicleId,
    pub enabled: bool,
    pub fuel_budget: f64,
    pub start: NodeId,
    pub end: EndpointMode,
    pub eligibility: Eligibility,
    pub priority_filter: Option<PriorityFilter>,
    pub frozen_edges: Vec<(NodeId, NodeId)>,
}

/// Ordered sequence of node ids: starts at the vehicle's start node, ends
/// at its end node, no repeats among target ids (spec §3 "Route").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub nodes: Vec<NodeId>,
}

impl Route {
    pub fn targets(&self) -> impl Iterator<Item = &TargetId> {
        self.nodes.iter().filter_map(|n| match n {
            NodeId::Target(id) => Some(id),
            _ => None,
        })
    }

    pub fn edges(&self) -> impl Iterator<Item = (&NodeId, &NodeId)> {
        self.nodes.windows(2).map(|w| (&w[0], &w[1]))
    }

    /// Whether `edge` (in order) appears contiguously within this route.
    pub fn contains_edge_in_order(&self, edge: &(NodeId, NodeId)) -> bool {
        self.edges().any(|(a, b)| a == &edge.0 && b == &edge.1)
    }
}

/// Ordered polyline realizing a route under threat avoidance (spec §3
/// "Trajectory").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub points: Vec<Point>,
}

impl Trajectory {
    pub fn length(&self) -> f64 {
        crate::geometry::point::polyline_length(&self.points)
    }
}

/// Reason a candidate target was excluded from a vehicle's allocation
/// (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExclusionReason {
    InThreatZone,
    NotEligible,
    PriorityFiltered,
    CandidateLimit,
    DominatedLowValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exclusion {
    pub target_id: TargetId,
    pub reason: ExclusionReason,
}
