use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use geo_types::Point;
use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};

use crate::error::ExportError;
use crate::models::{Coordinate, Route};

/// Serializes a route as a base64-encoded GPX 1.1 document.
///
/// Each step becomes one track segment, and the first point of every step is
/// also emitted as a named waypoint carrying the step instruction.
pub fn encode_route_as_gpx(route: &Route) -> Result<String, ExportError> {
    let mut gpx = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some("parksmart".into()),
        ..Default::default()
    };
    let mut track = Track {
        name: Some("parksmart route".into()),
        ..Default::default()
    };

    for step in &route.steps {
        let mut segment = TrackSegment::new();
        segment.points.extend(step.coordinates.iter().map(to_waypoint));
        track.segments.push(segment);

        if let Some(first) = step.coordinates.first() {
            let mut waypoint = to_waypoint(first);
            waypoint.name = Some(step.instruction.clone());
            gpx.waypoints.push(waypoint);
        }
    }
    gpx.tracks.push(track);

    let mut buffer = Vec::new();
    gpx::write(&gpx, &mut buffer)?;
    Ok(BASE64.encode(buffer))
}

fn to_waypoint(coord: &Coordinate) -> Waypoint {
    Waypoint::new(Point::new(coord.lon, coord.lat))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RouteStep;

    fn two_step_route() -> Route {
        Route {
            steps: vec![
                RouteStep {
                    coordinates: vec![Coordinate::new(45.0, 5.0), Coordinate::new(45.0, 5.0014)],
                    instruction: "Head along Rue Basse".into(),
                    distance_m: 110.1,
                },
                RouteStep {
                    coordinates: vec![
                        Coordinate::new(45.0, 5.0014),
                        Coordinate::new(45.0005, 5.0014),
                        Coordinate::new(45.001, 5.0014),
                    ],
                    instruction: "Turn onto Avenue Centrale".into(),
                    distance_m: 111.2,
                },
            ],
            total_distance_m: 221.3,
            total_duration_s: 26.6,
        }
    }

    #[test]
    fn gpx_document_mirrors_route_steps() {
        let encoded = encode_route_as_gpx(&two_step_route()).unwrap();
        let bytes = BASE64.decode(encoded).unwrap();
        let gpx = gpx::read(bytes.as_slice()).unwrap();

        assert_eq!(gpx.tracks.len(), 1);
        let segments = &gpx.tracks[0].segments;
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].points.len(), 2);
        assert_eq!(segments[1].points.len(), 3);

        let last = segments[1].points[2].point();
        assert!((last.y() - 45.001).abs() < 1e-9);
        assert!((last.x() - 5.0014).abs() < 1e-9);

        let names: Vec<_> = gpx.waypoints.iter().filter_map(|w| w.name.as_deref()).collect();
        assert_eq!(names, ["Head along Rue Basse", "Turn onto Avenue Centrale"]);
    }

    #[test]
    fn empty_route_still_produces_a_document() {
        let route = Route {
            steps: Vec::new(),
            total_distance_m: 0.0,
            total_duration_s: 0.0,
        };
        let encoded = encode_route_as_gpx(&route).unwrap();
        assert!(!encoded.is_empty());
    }
}
