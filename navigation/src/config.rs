use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;

use crate::{session::SessionConfig, tracker::TrackerConfig};

/// Service configuration. Every flag can also be set through its environment
/// variable.
#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "ParkSmart navigation service")]
pub struct Config {
    /// Address the HTTP API listens on
    #[arg(long, env = "NAV_BIND", default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// Road graph JSON used by the offline router
    #[arg(long, env = "GRAPH_JSON", default_value = "navigation/data/sample_graph.json")]
    pub graph: PathBuf,

    /// Base URL of an OSRM-compatible service; replaces the offline router when set
    #[arg(long, env = "OSRM_URL")]
    pub osrm_url: Option<String>,

    /// OSRM profile segment of the request path
    #[arg(long, env = "OSRM_PROFILE", default_value = "driving")]
    pub osrm_profile: String,

    /// Parking spot catalogue (JSON array); no spots are served without it
    #[arg(long, env = "SPOTS_JSON")]
    pub spots: Option<PathBuf>,

    #[arg(long, default_value_t = 50.0)]
    pub off_route_m: f64,

    #[arg(long, default_value_t = 20.0)]
    pub step_complete_m: f64,

    #[arg(long, default_value_t = 200.0)]
    pub destination_m: f64,

    /// Speed used by the offline router to estimate durations
    #[arg(long, default_value_t = 30.0)]
    pub cruise_speed_kmh: f64,
}

impl Config {
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            off_route_threshold_m: self.off_route_m,
            step_completion_threshold_m: self.step_complete_m,
            destination_threshold_m: self.destination_m,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            tracker: self.tracker_config(),
            prefer_alternates: false,
        }
    }
}
