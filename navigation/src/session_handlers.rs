// Handlers for the navigation session endpoints

use std::sync::atomic::Ordering;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::AppState;
use crate::error::NavigationError;
use crate::gpx_export::encode_route_as_gpx;
use crate::models::{
    ApiError, Coordinate, ProgressSnapshot, RedirectRequest, Route, StartSessionRequest,
    StartSessionResponse,
};
use crate::session::{NavigationSession, SessionConfig, SessionHandle};

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

/// POST /api/sessions - Route from origin to destination and start tracking
pub async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> ApiResult<Json<StartSessionResponse>> {
    let route = state
        .coordinator
        .request_reroute(req.origin, req.destination, req.prefer_alternates)
        .await
        .map_err(navigation_error)?;
    let route_gpx_base64 = encode_route_as_gpx(&route).map_err(|err| {
        api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    })?;

    let config = SessionConfig {
        prefer_alternates: req.prefer_alternates,
        ..state.session_config
    };
    let handle = NavigationSession::spawn(route.clone(), state.coordinator.clone(), config)
        .map_err(navigation_error)?;
    let snapshot = handle.latest();

    let session_id = state.next_session_id.fetch_add(1, Ordering::Relaxed);
    {
        let mut sessions = state.sessions.write().await;
        sessions.retain(|_, handle| !handle.is_closed());
        sessions.insert(session_id, handle);
    }
    tracing::info!(
        "session {session_id} started, {:.0}m to go",
        route.total_distance_m
    );

    Ok(Json(StartSessionResponse {
        session_id,
        route,
        route_gpx_base64,
        snapshot,
    }))
}

/// POST /api/sessions/:id/positions - Feed one position fix
pub async fn report_position(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(fix): Json<Coordinate>,
) -> ApiResult<Json<ProgressSnapshot>> {
    let handle = find_session(&state, id).await?;
    let snapshot = handle.update(fix).await.map_err(navigation_error)?;
    // Fixes after arrival leave the tracker untouched
    Ok(Json(snapshot.unwrap_or_else(|| handle.latest())))
}

/// POST /api/sessions/:id/destination - Reroute to a new destination
pub async fn redirect_session(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(req): Json<RedirectRequest>,
) -> ApiResult<Json<Route>> {
    let handle = find_session(&state, id).await?;
    handle
        .redirect(req.destination)
        .await
        .map(Json)
        .map_err(navigation_error)
}

/// DELETE /api/sessions/:id - Stop and forget a session
pub async fn stop_session(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<StatusCode> {
    let handle = state
        .sessions
        .write()
        .await
        .remove(&id)
        .ok_or_else(|| unknown_session(id))?;
    handle.stop().await;
    tracing::info!("session {id} stopped");
    Ok(StatusCode::NO_CONTENT)
}

/// Handles whose session task has ended are forgotten on lookup.
async fn find_session(state: &AppState, id: u64) -> ApiResult<SessionHandle> {
    let handle = state
        .sessions
        .read()
        .await
        .get(&id)
        .cloned()
        .ok_or_else(|| unknown_session(id))?;
    if handle.is_closed() {
        state.sessions.write().await.remove(&id);
        return Err(unknown_session(id));
    }
    Ok(handle)
}

fn unknown_session(id: u64) -> (StatusCode, Json<ApiError>) {
    api_error(StatusCode::NOT_FOUND, format!("session {id} not found"))
}

fn navigation_error(err: NavigationError) -> (StatusCode, Json<ApiError>) {
    let status = match err {
        NavigationError::InvalidRoute | NavigationError::EmptyPolyline => StatusCode::BAD_REQUEST,
        NavigationError::NoRouteFound(_) => StatusCode::BAD_GATEWAY,
        NavigationError::NotNavigating | NavigationError::RerouteSuperseded => {
            StatusCode::CONFLICT
        }
        NavigationError::SessionClosed => StatusCode::NOT_FOUND,
    };
    api_error(status, err.to_string())
}

fn api_error(status: StatusCode, message: String) -> (StatusCode, Json<ApiError>) {
    (status, Json(ApiError { message }))
}
