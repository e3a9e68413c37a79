use std::time::Duration;

use serde::Deserialize;

use crate::{
    models::{Coordinate, Route, RouteStep},
    reroute::{BoxFuture, RoutingProvider, RoutingProviderError},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Routing provider backed by an OSRM-compatible HTTP service.
#[derive(Clone)]
pub struct OsrmRouter {
    client: reqwest::Client,
    base_url: String,
    profile: String,
}

impl OsrmRouter {
    pub fn new(base_url: impl Into<String>) -> Result<Self, RoutingProviderError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            profile: "driving".into(),
        })
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }

    fn route_url(&self, source: Coordinate, destination: Coordinate) -> String {
        format!(
            "{}/route/v1/{}/{},{};{},{}",
            self.base_url, self.profile, source.lon, source.lat, destination.lon, destination.lat
        )
    }

    pub async fn fetch_routes(
        &self,
        source: Coordinate,
        destination: Coordinate,
        want_alternates: bool,
    ) -> Result<Vec<Route>, RoutingProviderError> {
        let url = self.route_url(source, destination);
        tracing::debug!("requesting {url}");

        // OSRM reports routing failures in the JSON body, often with a 4xx status
        let response: OsrmResponse = self
            .client
            .get(&url)
            .query(&[
                ("steps", "true"),
                ("geometries", "geojson"),
                ("overview", "false"),
                ("alternatives", if want_alternates { "true" } else { "false" }),
            ])
            .send()
            .await?
            .json()
            .await?;

        response.into_routes()
    }
}

impl RoutingProvider for OsrmRouter {
    fn compute_routes(
        &self,
        source: Coordinate,
        destination: Coordinate,
        want_alternates: bool,
    ) -> BoxFuture<'_, Result<Vec<Route>, RoutingProviderError>> {
        Box::pin(self.fetch_routes(source, destination, want_alternates))
    }
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
    legs: Vec<OsrmLeg>,
}

#[derive(Debug, Deserialize)]
struct OsrmLeg {
    steps: Vec<OsrmStep>,
}

#[derive(Debug, Deserialize)]
struct OsrmStep {
    distance: f64,
    #[serde(default)]
    name: String,
    geometry: OsrmGeometry,
    maneuver: OsrmManeuver,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    /// GeoJSON order: [lon, lat]
    coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
struct OsrmManeuver {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    modifier: Option<String>,
}

impl OsrmResponse {
    fn into_routes(self) -> Result<Vec<Route>, RoutingProviderError> {
        match self.code.as_str() {
            "Ok" => Ok(self.routes.into_iter().map(OsrmRoute::into_route).collect()),
            "NoRoute" => Ok(Vec::new()),
            _ => Err(RoutingProviderError::Service {
                message: self.message.unwrap_or_default(),
                code: self.code,
            }),
        }
    }
}

impl OsrmRoute {
    fn into_route(self) -> Route {
        let steps = self
            .legs
            .into_iter()
            .flat_map(|leg| leg.steps)
            .filter(|step| !step.geometry.coordinates.is_empty())
            .map(|step| RouteStep {
                instruction: instruction(&step.maneuver, &step.name),
                coordinates: step
                    .geometry
                    .coordinates
                    .iter()
                    .map(|&[lon, lat]| Coordinate { lat, lon })
                    .collect(),
                distance_m: step.distance,
            })
            .collect();

        Route {
            steps,
            total_distance_m: self.distance,
            total_duration_s: self.duration,
        }
    }
}

fn instruction(maneuver: &OsrmManeuver, name: &str) -> String {
    let modifier = maneuver.modifier.as_deref().unwrap_or("straight");
    let onto = if name.is_empty() {
        String::new()
    } else {
        format!(" onto {name}")
    };

    match maneuver.kind.as_str() {
        "depart" if name.is_empty() => "Head out".into(),
        "depart" => format!("Head along {name}"),
        "arrive" => "Arrive at destination".into(),
        "roundabout" | "rotary" => format!("Enter the roundabout and exit{onto}"),
        "turn" | "end of road" | "fork" | "on ramp" | "off ramp" => {
            format!("Turn {modifier}{onto}")
        }
        _ if name.is_empty() => "Continue".into(),
        _ => format!("Continue on {name}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_ROUTES: &str = r#"{
        "code": "Ok",
        "routes": [
            {
                "distance": 250.0,
                "duration": 30.0,
                "legs": [{
                    "steps": [
                        {
                            "distance": 100.0,
                            "name": "Rue Basse",
                            "geometry": {"type": "LineString", "coordinates": [[5.0, 45.0], [5.0014, 45.0]]},
                            "maneuver": {"type": "depart"}
                        },
                        {
                            "distance": 150.0,
                            "name": "Avenue Est",
                            "geometry": {"type": "LineString", "coordinates": [[5.0014, 45.0], [5.0014, 45.0013]]},
                            "maneuver": {"type": "turn", "modifier": "left"}
                        },
                        {
                            "distance": 0.0,
                            "name": "",
                            "geometry": {"type": "LineString", "coordinates": [[5.0014, 45.0013], [5.0014, 45.0013]]},
                            "maneuver": {"type": "arrive"}
                        }
                    ]
                }]
            },
            {
                "distance": 310.0,
                "duration": 41.0,
                "legs": [{"steps": [{
                    "distance": 310.0,
                    "name": "",
                    "geometry": {"type": "LineString", "coordinates": []},
                    "maneuver": {"type": "depart"}
                }]}]
            }
        ]
    }"#;

    #[test]
    fn converts_routes_and_swaps_coordinate_order() {
        let response: OsrmResponse = serde_json::from_str(TWO_ROUTES).unwrap();
        let routes = response.into_routes().unwrap();

        assert_eq!(routes.len(), 2);
        let route = &routes[0];
        assert_eq!(route.total_distance_m, 250.0);
        assert_eq!(route.total_duration_s, 30.0);
        assert_eq!(route.steps.len(), 3);
        assert_eq!(route.steps[0].coordinates[1], Coordinate::new(45.0, 5.0014));
        assert_eq!(route.steps[0].instruction, "Head along Rue Basse");
        assert_eq!(route.steps[1].instruction, "Turn left onto Avenue Est");
        assert_eq!(route.steps[2].instruction, "Arrive at destination");

        // Steps without geometry are dropped
        assert!(routes[1].steps.is_empty());
    }

    #[test]
    fn no_route_code_means_no_candidates() {
        let response: OsrmResponse =
            serde_json::from_str(r#"{"code": "NoRoute", "message": "Impossible route"}"#).unwrap();
        assert!(response.into_routes().unwrap().is_empty());
    }

    #[test]
    fn other_codes_are_service_errors() {
        let response: OsrmResponse =
            serde_json::from_str(r#"{"code": "InvalidQuery", "message": "bad coordinates"}"#)
                .unwrap();
        let err = response.into_routes().unwrap_err();
        assert!(matches!(
            err,
            RoutingProviderError::Service { ref code, ref message }
                if code == "InvalidQuery" && message == "bad coordinates"
        ));
    }

    #[test]
    fn builds_lon_lat_url() {
        let router = OsrmRouter::new("http://localhost:5000/")
            .unwrap()
            .with_profile("car");
        let url = router.route_url(Coordinate::new(45.0, 5.0), Coordinate::new(45.1, 5.2));
        assert_eq!(url, "http://localhost:5000/route/v1/car/5,45;5.2,45.1");
    }

    #[test]
    fn instructions_cover_unnamed_roads() {
        let maneuver = |kind: &str, modifier: Option<&str>| OsrmManeuver {
            kind: kind.into(),
            modifier: modifier.map(Into::into),
        };
        assert_eq!(instruction(&maneuver("depart", None), ""), "Head out");
        assert_eq!(instruction(&maneuver("new name", None), ""), "Continue");
        assert_eq!(
            instruction(&maneuver("roundabout", Some("right")), "Place Bellecour"),
            "Enter the roundabout and exit onto Place Bellecour"
        );
        assert_eq!(instruction(&maneuver("fork", None), ""), "Turn straight");
    }
}
