use std::sync::Arc;

use clap::Parser;
use navigation::{
    AppState,
    config::Config,
    create_router,
    engine::GraphRouter,
    osrm::OsrmRouter,
    proximity::{ProximityNotifier, StaticSpotProvider},
    reroute::{RerouteCoordinator, RoutingProvider},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "navigation=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();

    let provider: Arc<dyn RoutingProvider> = match &config.osrm_url {
        Some(url) => {
            tracing::info!("routing through OSRM at {url}");
            Arc::new(OsrmRouter::new(url.as_str())?.with_profile(config.osrm_profile.as_str()))
        }
        None => {
            let router = GraphRouter::from_file(&config.graph)?
                .with_cruise_speed_kmh(config.cruise_speed_kmh);
            tracing::info!(
                "loaded routing graph from {:?} ({} nodes)",
                config.graph,
                router.node_count()
            );
            Arc::new(router)
        }
    };

    let spots = match &config.spots {
        Some(path) => {
            let spots = StaticSpotProvider::from_file(path)?;
            tracing::info!("loaded {} parking spot(s) from {path:?}", spots.len());
            spots
        }
        None => {
            tracing::warn!("no spot catalogue configured, spot search will return nothing");
            StaticSpotProvider::default()
        }
    };

    let state = AppState::new(
        RerouteCoordinator::new(provider),
        ProximityNotifier::new(Arc::new(spots)),
        config.session_config(),
    );
    let app = create_router(state);

    tracing::info!("starting navigation service on http://{}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
