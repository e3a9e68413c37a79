use tokio::sync::{mpsc, oneshot, watch};

use crate::{
    error::NavigationError,
    models::{Coordinate, NavigationState, ProgressSnapshot, Route},
    reroute::RerouteCoordinator,
    tracker::{RouteProgressTracker, TrackerConfig},
};

const COMMAND_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionConfig {
    pub tracker: TrackerConfig,
    pub prefer_alternates: bool,
}

type RerouteReply = oneshot::Sender<Result<Route, NavigationError>>;

enum SessionCommand {
    Position {
        fix: Coordinate,
        reply: oneshot::Sender<Option<ProgressSnapshot>>,
    },
    Redirect {
        destination: Coordinate,
        reply: RerouteReply,
    },
    RerouteFinished {
        generation: u64,
        result: Result<Route, NavigationError>,
        reply: Option<RerouteReply>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable front of a running session. Every call is forwarded to the
/// session task, which applies them one at a time.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    snapshots: watch::Receiver<ProgressSnapshot>,
}

impl SessionHandle {
    pub async fn update(&self, fix: Coordinate) -> Result<Option<ProgressSnapshot>, NavigationError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Position { fix, reply }).await?;
        rx.await.map_err(|_| NavigationError::SessionClosed)
    }

    /// Route to a new destination, e.g. a parking spot picked by the driver.
    pub async fn redirect(&self, destination: Coordinate) -> Result<Route, NavigationError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Redirect { destination, reply })
            .await?;
        rx.await.map_err(|_| NavigationError::SessionClosed)?
    }

    /// Stop navigating. Stopping an already closed session is not an error.
    pub async fn stop(&self) {
        let (reply, rx) = oneshot::channel();
        if self.send(SessionCommand::Stop { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.snapshots.clone()
    }

    pub fn latest(&self) -> ProgressSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    async fn send(&self, command: SessionCommand) -> Result<(), NavigationError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| NavigationError::SessionClosed)
    }
}

/// Single owner of a [`RouteProgressTracker`].
///
/// # Concurrency
/// Fixes, redirects and reroute completions all arrive on one command
/// channel, so the tracker only ever has one writer. Reroutes run in
/// spawned tasks and report back through the same channel, tagged with the
/// generation they were requested at:
///
/// ```text
/// fix ──► update ──off route──► spawn request_reroute(fix, destination)
///                                        │
///            RerouteFinished { generation } ◄┘
///                 │
///                 ├─ generation current ──► replace_route
///                 └─ generation stale   ──► dropped
/// ```
///
/// Stop and redirect bump the generation. The task keeps only a weak
/// sender to itself, so dropping every handle also ends the session.
pub struct NavigationSession {
    tracker: RouteProgressTracker,
    coordinator: RerouteCoordinator,
    prefer_alternates: bool,
    generation: u64,
    pending_reroute: Option<u64>,
    last_fix: Option<Coordinate>,
    self_sender: mpsc::WeakSender<SessionCommand>,
    snapshots: watch::Sender<ProgressSnapshot>,
}

impl NavigationSession {
    /// Start tracking `route` on a new task. Must be called from within a
    /// tokio runtime.
    pub fn spawn(
        route: Route,
        coordinator: RerouteCoordinator,
        config: SessionConfig,
    ) -> Result<SessionHandle, NavigationError> {
        let mut tracker = RouteProgressTracker::new(config.tracker);
        tracker.start(route)?;

        let (commands, receiver) = mpsc::channel(COMMAND_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(tracker.snapshot());

        let session = Self {
            tracker,
            coordinator,
            prefer_alternates: config.prefer_alternates,
            generation: 0,
            pending_reroute: None,
            last_fix: None,
            self_sender: commands.downgrade(),
            snapshots: snapshot_tx,
        };
        tokio::spawn(session.run(receiver));

        Ok(SessionHandle {
            commands,
            snapshots: snapshot_rx,
        })
    }

    async fn run(mut self, mut receiver: mpsc::Receiver<SessionCommand>) {
        while let Some(command) = receiver.recv().await {
            match command {
                SessionCommand::Position { fix, reply } => {
                    let snapshot = self.handle_fix(fix);
                    let _ = reply.send(snapshot);
                }
                SessionCommand::Redirect { destination, reply } => {
                    self.generation += 1;
                    let from = self
                        .last_fix
                        .or_else(|| self.tracker.state().and_then(|s| s.active_route.origin()));
                    match from {
                        Some(from) => self.spawn_reroute(from, destination, Some(reply)),
                        None => {
                            let _ = reply.send(Err(NavigationError::NotNavigating));
                        }
                    }
                }
                SessionCommand::RerouteFinished {
                    generation,
                    result,
                    reply,
                } => self.finish_reroute(generation, result, reply),
                SessionCommand::Stop { reply } => {
                    self.generation += 1;
                    self.tracker.stop();
                    self.snapshots.send_replace(self.tracker.snapshot());
                    let _ = reply.send(());
                    break;
                }
            }
        }
        tracing::debug!("navigation session task finished");
    }

    fn handle_fix(&mut self, fix: Coordinate) -> Option<ProgressSnapshot> {
        self.last_fix = Some(fix);
        let snapshot = self.tracker.update(fix)?;
        self.snapshots.send_replace(snapshot.clone());

        if snapshot.off_route && self.pending_reroute.is_none() {
            if let Some(destination) = self.tracker.destination() {
                self.spawn_reroute(fix, destination, None);
            }
        }
        Some(snapshot)
    }

    fn spawn_reroute(&mut self, from: Coordinate, to: Coordinate, reply: Option<RerouteReply>) {
        let generation = self.generation;
        self.pending_reroute = Some(generation);
        tracing::info!("requesting reroute (generation {generation})");

        let coordinator = self.coordinator.clone();
        let prefer_alternates = self.prefer_alternates;
        let sender = self.self_sender.clone();
        tokio::spawn(async move {
            let result = coordinator.request_reroute(from, to, prefer_alternates).await;
            let Some(sender) = sender.upgrade() else {
                tracing::debug!("session gone, dropping reroute result");
                return;
            };
            let finished = SessionCommand::RerouteFinished {
                generation,
                result,
                reply,
            };
            if sender.send(finished).await.is_err() {
                tracing::debug!("session stopped, dropping reroute result");
            }
        });
    }

    fn finish_reroute(
        &mut self,
        generation: u64,
        result: Result<Route, NavigationError>,
        reply: Option<RerouteReply>,
    ) {
        if generation != self.generation {
            tracing::debug!(
                "discarding stale reroute (generation {generation}, current {})",
                self.generation
            );
            if let Some(reply) = reply {
                let _ = reply.send(Err(NavigationError::RerouteSuperseded));
            }
            return;
        }
        self.pending_reroute = None;

        // Only an explicit redirect may restart a finished session
        if reply.is_none() && self.tracker.phase() != NavigationState::Navigating {
            tracing::debug!("navigation no longer active, dropping drift reroute");
            return;
        }

        let outcome = result.and_then(|route| {
            self.apply_route(route.clone())?;
            Ok(route)
        });
        match &outcome {
            Ok(_) => {
                self.snapshots.send_replace(self.tracker.snapshot());
            }
            Err(err) => tracing::warn!("reroute failed, keeping current route: {err}"),
        }
        if let Some(reply) = reply {
            let _ = reply.send(outcome);
        }
    }

    fn apply_route(&mut self, route: Route) -> Result<(), NavigationError> {
        match self.tracker.phase() {
            NavigationState::Navigating => self.tracker.replace_route(route),
            // Arrived, now heading somewhere else (a parking spot)
            NavigationState::Completed => self.tracker.start(route),
            NavigationState::Idle => Err(NavigationError::NotNavigating),
        }
    }
}
