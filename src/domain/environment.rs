//! Environment snapshot (spec §3, §6): airports, targets, threats, and
//! optional synthetic starts for a checkpoint replan.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::types::{Airport, AirportId, NodeId, Target, TargetId, Threat, VehicleId};
use crate::geometry::{Disk, Point};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Environment {
    pub airports: Vec<Airport>,
    pub targets: Vec<Target>,
    pub threats: Vec<Threat>,
    #[serde(default)]
    pub synthetic_starts: BTreeMap<VehicleId, Airport>,
}

impl Environment {
    pub fn airport(&self, id: &AirportId) -> Option<&Airport> {
        self.airports.iter().find(|a| &a.id == id)
    }

    pub fn target(&self, id: &TargetId) -> Option<&Target> {
        self.targets.iter().find(|t| &t.id == id)
    }

    pub fn position_of(&self, node: &NodeId) -> Option<Point> {
        match node {
            NodeId::Airport(id) => self.airport(id).map(|a| a.position),
            NodeId::Target(id) => self.target(id).map(|t| t.position),
            NodeId::SyntheticStart(vid) => self.synthetic_starts.get(vid).map(|a| a.position),
        }
    }

    pub fn disks(&self) -> Vec<Disk> {
        self.threats.iter().map(|t| Disk::new(t.center, t.radius)).collect()
    }

    /// Every node id visible in this environment: airports, targets, and
    /// synthetic starts. Used to build the full distance matrix.
    pub fn all_nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.airports.iter().map(|a| NodeId::Airport(a.id.clone())).collect();
        nodes.extend(self.targets.iter().map(|t| NodeId::Target(t.id.clone())));
        nodes.extend(self.synthetic_starts.keys().map(|v| NodeId::SyntheticStart(v.clone())));
        nodes
    }

    /// Whether `p` lies inside any active threat disk.
    pub fn is_threatened(&self, p: &Point) -> bool {
        self.disks().iter().any(|d| d.engulfs(p))
    }
}
