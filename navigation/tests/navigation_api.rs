use std::sync::Arc;

use axum::{
    body::{Body, to_bytes},
    http::Request,
};
use hyper::StatusCode;
use navigation::{
    AppState, create_router,
    engine::GraphRouter,
    models::{NavigationState, ParkingSpot, ProgressSnapshot, Route, StartSessionResponse},
    proximity::{ProximityNotifier, StaticSpotProvider},
    reroute::RerouteCoordinator,
    session::SessionConfig,
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tower::ServiceExt;

const SAMPLE_GRAPH: &str = include_str!("../data/sample_graph.json");
const SAMPLE_SPOTS: &str = include_str!("../data/sample_spots.json");

fn test_app() -> axum::Router {
    let router = GraphRouter::from_reader(SAMPLE_GRAPH.as_bytes()).expect("graph");
    let spots = StaticSpotProvider::from_reader(SAMPLE_SPOTS.as_bytes()).expect("spots");
    let state = AppState::new(
        RerouteCoordinator::new(Arc::new(router)),
        ProximityNotifier::new(Arc::new(spots)),
        SessionConfig::default(),
    );
    create_router(state)
}

fn json_request(method: &str, uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    (status, bytes.to_vec())
}

async fn send_json<T: DeserializeOwned>(app: &axum::Router, request: Request<Body>) -> T {
    let (status, bytes) = send(app, request).await;
    assert_eq!(status, StatusCode::OK, "{}", String::from_utf8_lossy(&bytes));
    serde_json::from_slice(&bytes).unwrap()
}

async fn start_corner_to_corner(app: &axum::Router) -> StartSessionResponse {
    let payload = json!({
        "origin": {"lat": 45.0, "lon": 5.0},
        "destination": {"lat": 45.002, "lon": 5.0028}
    });
    send_json(app, json_request("POST", "/api/sessions", payload)).await
}

#[tokio::test]
async fn start_session_returns_route_and_gpx() {
    let app = test_app();
    let body = start_corner_to_corner(&app).await;

    assert!((body.route.total_distance_m - 442.6).abs() < 0.5);
    assert!(!body.route.steps.is_empty());
    assert!(!body.route_gpx_base64.is_empty());
    assert_eq!(body.snapshot.state, NavigationState::Navigating);
    assert_eq!(body.snapshot.current_step_index, 0);
    assert!(!body.snapshot.off_route);
}

#[tokio::test]
async fn sessions_get_distinct_ids() {
    let app = test_app();
    let first = start_corner_to_corner(&app).await;
    let second = start_corner_to_corner(&app).await;
    assert_ne!(first.session_id, second.session_id);
}

#[tokio::test]
async fn unreachable_destination_is_bad_gateway() {
    let app = test_app();
    let payload = json!({
        "origin": {"lat": 45.0, "lon": 5.0},
        "destination": {"lat": 48.8566, "lon": 2.3522}
    });
    let (status, _) = send(&app, json_request("POST", "/api/sessions", payload)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn positions_report_progress_and_drift() {
    let app = test_app();
    let session = start_corner_to_corner(&app).await;
    let uri = format!("/api/sessions/{}/positions", session.session_id);

    let on_route: ProgressSnapshot =
        send_json(&app, json_request("POST", &uri, json!({"lat": 45.0, "lon": 5.0}))).await;
    assert!(!on_route.off_route);
    assert!((on_route.remaining_distance_m - 442.6).abs() < 1.0);
    assert!(on_route.current_instruction.is_some());

    // Roughly a kilometre north of the grid
    let lost: ProgressSnapshot =
        send_json(&app, json_request("POST", &uri, json!({"lat": 45.01, "lon": 5.0}))).await;
    assert!(lost.off_route);
    assert!((lost.remaining_distance_m - on_route.remaining_distance_m).abs() < 1e-9);
}

#[tokio::test]
async fn redirect_routes_to_the_chosen_spot() {
    let app = test_app();
    let session = start_corner_to_corner(&app).await;
    let positions = format!("/api/sessions/{}/positions", session.session_id);
    let destination = format!("/api/sessions/{}/destination", session.session_id);

    let _: ProgressSnapshot =
        send_json(&app, json_request("POST", &positions, json!({"lat": 45.0, "lon": 5.0}))).await;
    let route: Route = send_json(
        &app,
        json_request(
            "POST",
            &destination,
            json!({"destination": {"lat": 45.0, "lon": 5.0028}}),
        ),
    )
    .await;
    assert!((route.total_distance_m - 220.2).abs() < 0.5);

    let snapshot: ProgressSnapshot =
        send_json(&app, json_request("POST", &positions, json!({"lat": 45.0, "lon": 5.0}))).await;
    assert!((snapshot.remaining_distance_m - 220.2).abs() < 1.0);
}

#[tokio::test]
async fn deleted_session_is_gone() {
    let app = test_app();
    let session = start_corner_to_corner(&app).await;
    let uri = format!("/api/sessions/{}", session.session_id);

    let delete = Request::builder()
        .method("DELETE")
        .uri(&uri)
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, delete).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        json_request("POST", &format!("{uri}/positions"), json!({"lat": 45.0, "lon": 5.0})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let app = test_app();
    let (status, bytes) = send(
        &app,
        json_request("POST", "/api/sessions/999/positions", json!({"lat": 45.0, "lon": 5.0})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["message"], "session 999 not found");
}

#[tokio::test]
async fn spots_are_filtered_and_sorted() {
    let app = test_app();
    let request = Request::builder()
        .uri("/api/spots?lat=45.002&lon=5.0028&radius_m=100")
        .body(Body::empty())
        .unwrap();
    let spots: Vec<ParkingSpot> = send_json(&app, request).await;

    let ids: Vec<_> = spots.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, ["p1", "p2"]);
    assert!(spots[0].distance_from_reference_m < spots[1].distance_from_reference_m);
}

#[tokio::test]
async fn spot_radius_defaults_to_500m() {
    let app = test_app();
    let request = Request::builder()
        .uri("/api/spots?lat=45.002&lon=5.0028")
        .body(Body::empty())
        .unwrap();
    let spots: Vec<ParkingSpot> = send_json(&app, request).await;

    let ids: Vec<_> = spots.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, ["p1", "p2", "p4"]);
}
