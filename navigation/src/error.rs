use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum NavigationError {
    #[error("route is empty or has a step without geometry")]
    InvalidRoute,
    #[error("polyline has no points")]
    EmptyPolyline,
    #[error("no route found: {0}")]
    NoRouteFound(String),
    #[error("tracker is not navigating")]
    NotNavigating,
    #[error("reroute superseded by a newer request")]
    RerouteSuperseded,
    #[error("navigation session is closed")]
    SessionClosed,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to build GPX document: {0}")]
    Gpx(#[from] gpx::errors::GpxError),
}
