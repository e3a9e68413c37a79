use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use navigation::{
    engine::GraphRouter,
    models::NavigationState,
    position::{GpxReplay, PositionSource},
    reroute::RerouteCoordinator,
    session::{NavigationSession, SessionConfig},
    tracker::TrackerConfig,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Drive a recorded GPX track through a navigation session"
)]
struct Args {
    /// Recorded drive; its first point is the origin and its last the destination
    #[arg(long)]
    gpx: PathBuf,

    /// Road graph JSON used for the initial route and reroutes
    #[arg(long, env = "GRAPH_JSON", default_value = "navigation/data/sample_graph.json")]
    graph: PathBuf,

    /// Delay between fixes; 0 replays as fast as possible
    #[arg(long, default_value_t = 0)]
    interval_ms: u64,

    #[arg(long, default_value_t = 50.0)]
    off_route_m: f64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "replay=info,navigation=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let interval = (args.interval_ms > 0).then(|| Duration::from_millis(args.interval_ms));
    let mut replay = GpxReplay::from_file(&args.gpx, interval)?;
    let (Some(&origin), Some(&destination)) = (replay.points().first(), replay.points().last())
    else {
        return Ok(());
    };

    let coordinator = RerouteCoordinator::new(Arc::new(GraphRouter::from_file(&args.graph)?));
    let route = coordinator.request_reroute(origin, destination, false).await?;
    tracing::info!(
        "route of {:.0}m in {} step(s), {} point(s)",
        route.total_distance_m,
        route.steps.len(),
        route.point_count()
    );

    let config = SessionConfig {
        tracker: TrackerConfig {
            off_route_threshold_m: args.off_route_m,
            ..TrackerConfig::default()
        },
        prefer_alternates: false,
    };
    let session = NavigationSession::spawn(route, coordinator, config)?;

    let mut fixes = replay.fixes();
    while let Some(fix) = fixes.recv().await {
        let Some(snapshot) = session.update(fix).await? else {
            break;
        };
        tracing::info!(
            "step {} | {:.0}m / {:.0}s left | off_route={} approaching={} | {}",
            snapshot.current_step_index,
            snapshot.remaining_distance_m,
            snapshot.remaining_time_s,
            snapshot.off_route,
            snapshot.approaching_destination_fired,
            snapshot.current_instruction.as_deref().unwrap_or("-")
        );
        if snapshot.state == NavigationState::Completed {
            tracing::info!("arrived");
            break;
        }
    }

    session.stop().await;
    Ok(())
}
