pub mod config;
pub mod engine;
pub mod error;
pub mod geo;
pub mod gpx_export;
pub mod graph;
pub mod models;
pub mod osrm;
pub mod position;
pub mod proximity;
pub mod reroute;
pub mod session;
pub mod session_handlers;
pub mod tracker;

use std::{
    collections::HashMap,
    sync::{Arc, atomic::AtomicU64},
};

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

use crate::models::{ApiError, Coordinate, ParkingSpot, SpotQuery};
use crate::proximity::{ProximityNotifier, SpotProviderError};
use crate::reroute::RerouteCoordinator;
use crate::session::{SessionConfig, SessionHandle};

#[derive(Clone)]
pub struct AppState {
    pub coordinator: RerouteCoordinator,
    pub notifier: ProximityNotifier,
    pub sessions: Arc<RwLock<HashMap<u64, SessionHandle>>>,
    pub next_session_id: Arc<AtomicU64>,
    pub session_config: SessionConfig,
}

impl AppState {
    pub fn new(
        coordinator: RerouteCoordinator,
        notifier: ProximityNotifier,
        session_config: SessionConfig,
    ) -> Self {
        Self {
            coordinator,
            notifier,
            sessions: Arc::default(),
            next_session_id: Arc::new(AtomicU64::new(1)),
            session_config,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/sessions", post(session_handlers::start_session))
        .route("/api/sessions/:id", delete(session_handlers::stop_session))
        .route(
            "/api/sessions/:id/positions",
            post(session_handlers::report_position),
        )
        .route(
            "/api/sessions/:id/destination",
            post(session_handlers::redirect_session),
        )
        .route("/api/spots", get(spots_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /api/spots - Available spots around a point, nearest first
async fn spots_handler(
    State(state): State<AppState>,
    Query(query): Query<SpotQuery>,
) -> Result<Json<Vec<ParkingSpot>>, (StatusCode, Json<ApiError>)> {
    let reference = Coordinate::new(query.lat, query.lon);
    state
        .notifier
        .nearby_spots(reference, query.radius_m)
        .await
        .map(Json)
        .map_err(spot_error)
}

fn spot_error(err: SpotProviderError) -> (StatusCode, Json<ApiError>) {
    tracing::warn!("spot lookup failed: {err}");
    (
        StatusCode::BAD_GATEWAY,
        Json(ApiError {
            message: err.to_string(),
        }),
    )
}
