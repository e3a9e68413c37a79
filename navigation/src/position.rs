use std::{fs::File, io::BufReader, io::Read, path::Path, time::Duration};

use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::models::Coordinate;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to open GPX file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse GPX document: {0}")]
    Gpx(#[from] gpx::errors::GpxError),
    #[error("GPX document has no track or route points")]
    NoPoints,
}

/// Push stream of live position fixes.
pub trait PositionSource: Send {
    /// Starts a fresh stream. Any stream handed out earlier stops receiving.
    fn fixes(&mut self) -> mpsc::Receiver<Coordinate>;
}

/// Replays the points of a recorded GPX track as position fixes.
pub struct GpxReplay {
    points: Vec<Coordinate>,
    interval: Option<Duration>,
    feeder: Option<JoinHandle<()>>,
}

impl GpxReplay {
    pub fn from_file(path: impl AsRef<Path>, interval: Option<Duration>) -> Result<Self, ReplayError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), interval)
    }

    /// Track points are preferred; a document with only `<rte>` points is
    /// replayed from those instead.
    pub fn from_reader<R: Read>(reader: R, interval: Option<Duration>) -> Result<Self, ReplayError> {
        let gpx = gpx::read(reader)?;

        let mut points: Vec<Coordinate> = gpx
            .tracks
            .iter()
            .flat_map(|track| &track.segments)
            .flat_map(|segment| &segment.points)
            .map(to_coordinate)
            .collect();
        if points.is_empty() {
            points = gpx
                .routes
                .iter()
                .flat_map(|route| &route.points)
                .map(to_coordinate)
                .collect();
        }
        if points.is_empty() {
            return Err(ReplayError::NoPoints);
        }

        tracing::debug!("loaded {} replay points", points.len());
        Ok(Self {
            points,
            interval,
            feeder: None,
        })
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }
}

impl PositionSource for GpxReplay {
    /// Without an interval every point is queued immediately. With one, a
    /// tokio task paces the points, so a runtime must be running.
    fn fixes(&mut self) -> mpsc::Receiver<Coordinate> {
        if let Some(previous) = self.feeder.take() {
            previous.abort();
        }

        let (tx, rx) = mpsc::channel(self.points.len());
        match self.interval {
            None => {
                for &point in &self.points {
                    // capacity covers every point
                    let _ = tx.try_send(point);
                }
            }
            Some(interval) => {
                let points = self.points.clone();
                self.feeder = Some(tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(interval);
                    for point in points {
                        ticker.tick().await;
                        if tx.send(point).await.is_err() {
                            break;
                        }
                    }
                }));
            }
        }
        rx
    }
}

impl Drop for GpxReplay {
    fn drop(&mut self) {
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
    }
}

fn to_coordinate(waypoint: &gpx::Waypoint) -> Coordinate {
    let point = waypoint.point();
    Coordinate {
        lat: point.y(),
        lon: point.x(),
    }
}
