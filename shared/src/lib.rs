use serde::{Deserialize, Serialize};

/// Meters per degree of latitude on a sphere of radius 6 371 km.
pub const METERS_PER_DEGREE: f64 = 111_194.93;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// One maneuver of a route: its polyline, the instruction shown to the
/// driver, and the provider-reported length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    pub coordinates: Vec<Coordinate>,
    pub instruction: String,
    pub distance_m: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub steps: Vec<RouteStep>,
    pub total_distance_m: f64,
    pub total_duration_s: f64,
}

impl Route {
    /// Last coordinate of the last step that has any geometry.
    pub fn destination(&self) -> Option<Coordinate> {
        self.steps
            .iter()
            .rev()
            .find_map(|step| step.coordinates.last().copied())
    }

    pub fn origin(&self) -> Option<Coordinate> {
        self.steps
            .iter()
            .find_map(|step| step.coordinates.first().copied())
    }

    pub fn point_count(&self) -> usize {
        self.steps.iter().map(|step| step.coordinates.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkingSpot {
    pub id: String,
    pub coordinate: Coordinate,
    pub name: String,
    pub available: bool,
    #[serde(default)]
    pub distance_from_reference_m: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn contains(&self, coord: Coordinate) -> bool {
        coord.lat >= self.min_lat
            && coord.lat <= self.max_lat
            && coord.lon >= self.min_lon
            && coord.lon <= self.max_lon
    }

    /// Box enclosing a circle of `radius_m` around `center`.
    pub fn around(center: Coordinate, radius_m: f64) -> Self {
        let lat_margin = radius_m / METERS_PER_DEGREE;
        // Clamp so the margin stays finite near the poles
        let cos_lat = center.lat.to_radians().cos().max(1e-6);
        let lon_margin = radius_m / (METERS_PER_DEGREE * cos_lat);

        Self {
            min_lat: center.lat - lat_margin,
            max_lat: center.lat + lat_margin,
            min_lon: center.lon - lon_margin,
            max_lon: center.lon + lon_margin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationState {
    Idle,
    Navigating,
    Completed,
}

/// What the tracker reports after each position fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub state: NavigationState,
    pub current_step_index: usize,
    pub remaining_distance_m: f64,
    pub remaining_time_s: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_instruction: Option<String>,
    pub off_route: bool,
    pub approaching_destination_fired: bool,
}

impl ProgressSnapshot {
    pub fn idle() -> Self {
        Self {
            state: NavigationState::Idle,
            current_step_index: 0,
            remaining_distance_m: 0.0,
            remaining_time_s: 0.0,
            current_instruction: None,
            off_route: false,
            approaching_destination_fired: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub origin: Coordinate,
    pub destination: Coordinate,
    #[serde(default)]
    pub prefer_alternates: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionResponse {
    pub session_id: u64,
    pub route: Route,
    pub route_gpx_base64: String,
    pub snapshot: ProgressSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectRequest {
    pub destination: Coordinate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotQuery {
    pub lat: f64,
    pub lon: f64,
    #[serde(default = "default_spot_radius")]
    pub radius_m: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}

pub fn default_spot_radius() -> f64 {
    500.0
}
