use crate::{error::NavigationError, models::Coordinate};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Nearest polyline vertex to a query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestPoint {
    pub index: usize,
    pub coordinate: Coordinate,
    pub distance_m: f64,
}

pub fn distance_m(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();

    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    // min() keeps asin in domain when rounding pushes h past 1 for antipodes
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Scan the vertices of `polyline` for the one nearest to `point`.
///
/// This is a vertex-level approximation: segments are not projected onto,
/// so the reported distance is an upper bound of the true distance to the
/// line. Ties keep the earliest vertex.
pub fn closest_point(
    point: Coordinate,
    polyline: &[Coordinate],
) -> Result<ClosestPoint, NavigationError> {
    let mut best: Option<ClosestPoint> = None;

    for (index, &vertex) in polyline.iter().enumerate() {
        let distance = distance_m(point, vertex);
        let is_better = match &best {
            Some(prev) => distance < prev.distance_m,
            None => true,
        };
        if is_better {
            best = Some(ClosestPoint {
                index,
                coordinate: vertex,
                distance_m: distance,
            });
        }
    }

    best.ok_or(NavigationError::EmptyPolyline)
}

pub fn polyline_length_m(polyline: &[Coordinate]) -> f64 {
    polyline.windows(2).map(|w| distance_m(w[0], w[1])).sum()
}

/// Displace `origin` by a flat-earth offset in meters.
pub fn offset(origin: Coordinate, north_m: f64, east_m: f64) -> Coordinate {
    let cos_lat = origin.lat.to_radians().cos().max(1e-6);
    Coordinate {
        lat: origin.lat + north_m / shared::METERS_PER_DEGREE,
        lon: origin.lon + east_m / (shared::METERS_PER_DEGREE * cos_lat),
    }
}
