use std::{
    collections::{HashMap, HashSet},
    fs::File,
    io::{self, Read},
    path::Path,
};

use kdtree::distance::squared_euclidean;
use kdtree::KdTree;
use petgraph::{
    algo::astar,
    graph::{NodeIndex, UnGraph},
    visit::EdgeRef,
};

use crate::{
    geo,
    graph::GraphFile,
    models::{Coordinate, Route, RouteStep},
    reroute::{BoxFuture, RoutingProvider, RoutingProviderError},
};

/// Fixes farther than this from every graph node are not snapped
const MAX_SNAP_DISTANCE_M: f64 = 2_000.0;
/// Cost multiplier for edges of the primary route when looking for an alternate
const ALTERNATE_EDGE_PENALTY: f64 = 10.0;
const DEFAULT_CRUISE_SPEED_KMH: f64 = 30.0;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to read graph file: {0}")]
    Io(#[from] io::Error),
    #[error("invalid graph definition: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("graph is empty")]
    EmptyGraph,
    #[error("edge references unknown node {0}")]
    MissingNode(u64),
}

#[derive(Clone, Debug)]
struct EdgeData {
    length_m: f64,
    name: Option<String>,
    waypoints: Vec<Coordinate>,
}

/// Offline routing provider: A* over a road graph loaded from JSON.
#[derive(Clone)]
pub struct GraphRouter {
    graph: UnGraph<Coordinate, EdgeData>,
    /// Spatial index for O(log N) nearest node lookup
    spatial_index: KdTree<f64, usize, [f64; 2]>,
    /// cos(latitude) at the graph centre, applied to longitudes in the index
    lon_scale: f64,
    cruise_speed_mps: f64,
}

impl GraphRouter {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, EngineError> {
        let graph_file: GraphFile = serde_json::from_reader(reader)?;
        Self::from_graph_file(graph_file)
    }

    pub fn from_graph_file(graph_file: GraphFile) -> Result<Self, EngineError> {
        if graph_file.nodes.is_empty() {
            return Err(EngineError::EmptyGraph);
        }
        let bounds = graph_file.bounds();
        let lon_scale = bounds.map_or(1.0, |b| {
            ((b.min_lat + b.max_lat) / 2.0).to_radians().cos().max(1e-6)
        });
        let mut graph = UnGraph::new_undirected();
        let mut id_to_index = HashMap::new();

        for node in &graph_file.nodes {
            let idx = graph.add_node(Coordinate::new(node.lat, node.lon));
            id_to_index.insert(node.id, idx);
        }

        for edge in graph_file.edges {
            let from = *id_to_index
                .get(&edge.from)
                .ok_or(EngineError::MissingNode(edge.from))?;
            let to = *id_to_index
                .get(&edge.to)
                .ok_or(EngineError::MissingNode(edge.to))?;
            let data = EdgeData {
                length_m: edge.length_m,
                name: edge.name,
                waypoints: edge.waypoints,
            };
            graph.update_edge(from, to, data);
        }

        let mut spatial_index = KdTree::new(2);
        for idx in graph.node_indices() {
            let coord = graph[idx];
            // Stored as [scaled lon, lat] so index distances track meters
            let _ = spatial_index.add([coord.lon * lon_scale, coord.lat], idx.index());
        }

        tracing::debug!(
            "graph router ready: {} nodes, {} edges, bounds {:?}",
            graph.node_count(),
            graph.edge_count(),
            bounds
        );

        Ok(Self {
            graph,
            spatial_index,
            lon_scale,
            cruise_speed_mps: DEFAULT_CRUISE_SPEED_KMH / 3.6,
        })
    }

    pub fn with_cruise_speed_kmh(mut self, kmh: f64) -> Self {
        if kmh.is_finite() && kmh > 0.0 {
            self.cruise_speed_mps = kmh / 3.6;
        }
        self
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Find closest node using the k-d tree, rejecting matches farther than
    /// [`MAX_SNAP_DISTANCE_M`].
    pub fn closest_node(&self, target: Coordinate) -> Option<NodeIndex> {
        let nearest = self
            .spatial_index
            .nearest(&[target.lon * self.lon_scale, target.lat], 1, &squared_euclidean)
            .ok()?;
        let (_, &idx) = nearest.first()?;
        let node = NodeIndex::new(idx);

        (geo::distance_m(target, self.graph[node]) <= MAX_SNAP_DISTANCE_M).then_some(node)
    }

    /// Primary route plus, when asked, one alternate found by penalising the
    /// primary route's edges. Identical alternates are dropped.
    pub fn routes(
        &self,
        source: Coordinate,
        destination: Coordinate,
        want_alternates: bool,
    ) -> Result<Vec<Route>, RoutingProviderError> {
        let start = self
            .closest_node(source)
            .ok_or(RoutingProviderError::Unreachable(source))?;
        let end = self
            .closest_node(destination)
            .ok_or(RoutingProviderError::Unreachable(destination))?;

        let Some(primary) = self.shortest_path(start, end, &HashSet::new()) else {
            tracing::debug!("no path between nodes {} and {}", start.index(), end.index());
            return Ok(Vec::new());
        };

        let mut paths = vec![primary];
        if want_alternates && paths[0].len() > 1 {
            let used: HashSet<(NodeIndex, NodeIndex)> =
                paths[0].windows(2).map(|w| (w[0], w[1])).collect();
            if let Some(alternate) = self.shortest_path(start, end, &used) {
                if alternate != paths[0] {
                    paths.push(alternate);
                }
            }
        }

        Ok(paths.iter().map(|path| self.build_route(path)).collect())
    }

    fn shortest_path(
        &self,
        start: NodeIndex,
        end: NodeIndex,
        penalised: &HashSet<(NodeIndex, NodeIndex)>,
    ) -> Option<Vec<NodeIndex>> {
        let goal = self.graph[end];
        let edge_cost = |edge: petgraph::graph::EdgeReference<EdgeData>| {
            let (from, to) = (edge.source(), edge.target());
            let cost = edge.weight().length_m;
            if penalised.contains(&(from, to)) || penalised.contains(&(to, from)) {
                cost * ALTERNATE_EDGE_PENALTY
            } else {
                cost
            }
        };
        let heuristic = |idx: NodeIndex| geo::distance_m(self.graph[idx], goal);

        let (_cost, path) = astar(&self.graph, start, |n| n == end, edge_cost, heuristic)?;
        Some(path)
    }

    /// Turn a node path into steps, one per run of edges sharing a street name.
    fn build_route(&self, path: &[NodeIndex]) -> Route {
        let mut steps: Vec<RouteStep> = Vec::new();
        let mut current_name: Option<Option<String>> = None;

        for window in path.windows(2) {
            let (from, to) = (window[0], window[1]);
            let Some(edge_idx) = self.graph.find_edge(from, to) else {
                continue;
            };
            let edge = &self.graph[edge_idx];

            // Waypoints are stored in the edge's own direction
            let forward = self
                .graph
                .edge_endpoints(edge_idx)
                .is_some_and(|(source, _)| source == from);
            let mut geometry = edge.waypoints.clone();
            if !forward {
                geometry.reverse();
            }
            geometry.push(self.graph[to]);

            let same_street = current_name.as_ref() == Some(&edge.name);
            match steps.last_mut() {
                Some(step) if same_street => {
                    step.coordinates.extend(geometry);
                    step.distance_m += edge.length_m;
                }
                _ => {
                    let instruction = instruction_for(edge.name.as_deref(), steps.is_empty());
                    let mut coordinates = vec![self.graph[from]];
                    coordinates.extend(geometry);
                    steps.push(RouteStep {
                        coordinates,
                        instruction,
                        distance_m: edge.length_m,
                    });
                    current_name = Some(edge.name.clone());
                }
            }
        }

        if steps.is_empty() {
            // Source and destination snapped to the same node
            if let Some(&node) = path.first() {
                steps.push(RouteStep {
                    coordinates: vec![self.graph[node]],
                    instruction: "Arrive at destination".into(),
                    distance_m: 0.0,
                });
            }
        }

        let total_distance_m: f64 = steps.iter().map(|step| step.distance_m).sum();
        Route {
            steps,
            total_distance_m,
            total_duration_s: total_distance_m / self.cruise_speed_mps,
        }
    }
}

fn instruction_for(name: Option<&str>, first: bool) -> String {
    match (name, first) {
        (Some(name), true) => format!("Head along {name}"),
        (Some(name), false) => format!("Turn onto {name}"),
        (None, true) => "Head out".into(),
        (None, false) => "Continue".into(),
    }
}

impl RoutingProvider for GraphRouter {
    fn compute_routes(
        &self,
        source: Coordinate,
        destination: Coordinate,
        want_alternates: bool,
    ) -> BoxFuture<'_, Result<Vec<Route>, RoutingProviderError>> {
        let result = self.routes(source, destination, want_alternates);
        Box::pin(async move { result })
    }
}
