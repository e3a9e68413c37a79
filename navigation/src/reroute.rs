use std::{future::Future, pin::Pin, sync::Arc};

use crate::{
    error::NavigationError,
    models::{Coordinate, Route},
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, thiserror::Error)]
pub enum RoutingProviderError {
    #[error("routing request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("routing service answered {code}: {message}")]
    Service { code: String, message: String },
    #[error("no road near {0:?}")]
    Unreachable(Coordinate),
}

/// Source of candidate routes between two points (Dependency Inversion)
///
/// Implemented by the offline [`crate::engine::GraphRouter`], the HTTP
/// [`crate::osrm::OsrmRouter`], and by scripted providers in tests.
///
/// # Contract
/// - Return every candidate the backend produced; selection is the
///   coordinator's job
/// - An empty list means "no route" and is not an error
pub trait RoutingProvider: Send + Sync {
    fn compute_routes(
        &self,
        source: Coordinate,
        destination: Coordinate,
        want_alternates: bool,
    ) -> BoxFuture<'_, Result<Vec<Route>, RoutingProviderError>>;
}

/// Asks the routing provider for a fresh route and picks the shortest
/// candidate. Failures go back to the caller untouched by retries.
#[derive(Clone)]
pub struct RerouteCoordinator {
    provider: Arc<dyn RoutingProvider>,
}

impl RerouteCoordinator {
    pub fn new(provider: Arc<dyn RoutingProvider>) -> Self {
        Self { provider }
    }

    pub async fn request_reroute(
        &self,
        from: Coordinate,
        to: Coordinate,
        prefer_alternates: bool,
    ) -> Result<Route, NavigationError> {
        let candidates = self
            .provider
            .compute_routes(from, to, prefer_alternates)
            .await
            .map_err(|err| {
                tracing::warn!("routing provider failed: {err}");
                NavigationError::NoRouteFound(err.to_string())
            })?;

        let candidate_count = candidates.len();
        let route = candidates
            .into_iter()
            .filter(|route| !route.steps.is_empty())
            .min_by(|a, b| a.total_distance_m.total_cmp(&b.total_distance_m))
            .ok_or_else(|| {
                NavigationError::NoRouteFound("provider returned no usable candidate".into())
            })?;

        tracing::debug!(
            "selected {:.0}m route out of {} candidate(s)",
            route.total_distance_m,
            candidate_count
        );
        Ok(route)
    }
}
