use serde::{Deserialize, Serialize};

use crate::models::{BoundingBox, Coordinate};

/// On-disk road graph consumed by [`crate::engine::GraphRouter`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GraphFile {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: u64,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub from: u64,
    pub to: u64,
    pub length_m: f64,
    /// Street name, used to group edges into maneuvers
    #[serde(default)]
    pub name: Option<String>,
    /// Intermediate geometry between `from` and `to`, in that direction
    #[serde(default)]
    pub waypoints: Vec<Coordinate>,
}

impl GraphFile {
    pub fn bounds(&self) -> Option<BoundingBox> {
        let first = self.nodes.first()?;
        let init = BoundingBox {
            min_lat: first.lat,
            max_lat: first.lat,
            min_lon: first.lon,
            max_lon: first.lon,
        };
        Some(self.nodes.iter().fold(init, |bbox, node| BoundingBox {
            min_lat: bbox.min_lat.min(node.lat),
            max_lat: bbox.max_lat.max(node.lat),
            min_lon: bbox.min_lon.min(node.lon),
            max_lon: bbox.max_lon.max(node.lon),
        }))
    }
}
