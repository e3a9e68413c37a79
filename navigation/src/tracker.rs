use crate::{
    error::NavigationError,
    geo,
    models::{Coordinate, NavigationState, ProgressSnapshot, Route},
};

/// Distance thresholds driving the tracker's decisions, in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerConfig {
    /// A fix strictly farther than this from the remaining polyline is off-route.
    pub off_route_threshold_m: f64,
    /// A fix strictly closer than this to a step's last point completes the step.
    pub step_completion_threshold_m: f64,
    /// A fix strictly closer than this to the destination fires the approach signal.
    pub destination_threshold_m: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            off_route_threshold_m: 50.0,
            step_completion_threshold_m: 20.0,
            destination_threshold_m: 200.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerState {
    pub active_route: Route,
    pub current_step_index: usize,
    pub remaining_distance_m: f64,
    pub remaining_time_s: f64,
    pub off_route: bool,
    pub has_notified_approaching: bool,
}

impl TrackerState {
    fn fresh(route: Route) -> Self {
        Self {
            current_step_index: 0,
            remaining_distance_m: route.total_distance_m.max(0.0),
            remaining_time_s: route.total_duration_s.max(0.0),
            off_route: false,
            has_notified_approaching: false,
            active_route: route,
        }
    }
}

/// Where a fix landed on the remaining part of the route.
#[derive(Debug, Clone, Copy)]
struct RouteMatch {
    step_index: usize,
    vertex_index: usize,
    distance_m: f64,
}

/// Follows one navigation session: matches position fixes against the
/// active route, advances through its steps, and flags drift.
///
/// The tracker is a plain state machine (`Idle → Navigating → Completed`)
/// and never blocks. Callers serialize `update` and `replace_route` on a
/// single owner; see [`crate::session`] for the actor that does this.
#[derive(Debug, Clone)]
pub struct RouteProgressTracker {
    config: TrackerConfig,
    phase: NavigationState,
    state: Option<TrackerState>,
}

impl Default for RouteProgressTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl RouteProgressTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            phase: NavigationState::Idle,
            state: None,
        }
    }

    pub fn config(&self) -> TrackerConfig {
        self.config
    }

    pub fn phase(&self) -> NavigationState {
        self.phase
    }

    pub fn state(&self) -> Option<&TrackerState> {
        self.state.as_ref()
    }

    pub fn destination(&self) -> Option<Coordinate> {
        self.state
            .as_ref()
            .and_then(|state| state.active_route.destination())
    }

    pub fn start(&mut self, route: Route) -> Result<(), NavigationError> {
        validate(&route)?;
        tracing::info!(
            "navigation started: {} steps, {:.0}m, {:.0}s",
            route.steps.len(),
            route.total_distance_m,
            route.total_duration_s
        );
        self.state = Some(TrackerState::fresh(route));
        self.phase = NavigationState::Navigating;
        Ok(())
    }

    /// Swap in a freshly computed route, typically after a reroute.
    pub fn replace_route(&mut self, route: Route) -> Result<(), NavigationError> {
        if self.phase != NavigationState::Navigating {
            return Err(NavigationError::NotNavigating);
        }
        validate(&route)?;
        tracing::info!(
            "route replaced: {} steps, {:.0}m",
            route.steps.len(),
            route.total_distance_m
        );
        self.state = Some(TrackerState::fresh(route));
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.phase != NavigationState::Idle {
            tracing::info!("navigation stopped");
        }
        self.phase = NavigationState::Idle;
        self.state = None;
    }

    /// Feed one position fix. Returns `None` unless navigating.
    pub fn update(&mut self, position: Coordinate) -> Option<ProgressSnapshot> {
        if self.phase != NavigationState::Navigating {
            return None;
        }
        let config = self.config;
        let state = self.state.as_mut()?;
        let route = &state.active_route;

        let matched = match_position(route, state.current_step_index, position)?;

        // A NaN fix matches nothing and counts as drift
        if matched.distance_m.is_nan() || matched.distance_m > config.off_route_threshold_m {
            if !state.off_route {
                tracing::debug!(
                    "off route: {:.1}m from step {} (threshold {:.1}m)",
                    matched.distance_m,
                    matched.step_index,
                    config.off_route_threshold_m
                );
            }
            state.off_route = true;
            return Some(self.snapshot_with(false));
        }
        state.off_route = false;

        let remaining = remaining_distance_m(route, &matched);
        state.remaining_distance_m = remaining;
        state.remaining_time_s = if route.total_distance_m > 0.0 {
            route.total_duration_s * (remaining / route.total_distance_m)
        } else {
            0.0
        };

        let step_end = route.steps[state.current_step_index]
            .coordinates
            .last()
            .copied()?;
        if geo::distance_m(position, step_end) < config.step_completion_threshold_m {
            state.current_step_index += 1;
            tracing::debug!("step {} completed", state.current_step_index - 1);

            if state.current_step_index >= route.steps.len() {
                state.remaining_distance_m = 0.0;
                state.remaining_time_s = 0.0;
                self.phase = NavigationState::Completed;
                tracing::info!("navigation completed");
            }
        }

        let mut fired = false;
        if let Some(destination) = route.destination() {
            if !state.has_notified_approaching
                && geo::distance_m(position, destination) < config.destination_threshold_m
            {
                state.has_notified_approaching = true;
                fired = true;
                tracing::info!("approaching destination");
            }
        }

        Some(self.snapshot_with(fired))
    }

    /// Current progress without feeding a fix.
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot_with(false)
    }

    fn snapshot_with(&self, approaching_destination_fired: bool) -> ProgressSnapshot {
        let Some(state) = &self.state else {
            return ProgressSnapshot::idle();
        };
        ProgressSnapshot {
            state: self.phase,
            current_step_index: state.current_step_index,
            remaining_distance_m: state.remaining_distance_m,
            remaining_time_s: state.remaining_time_s,
            current_instruction: state
                .active_route
                .steps
                .get(state.current_step_index)
                .map(|step| step.instruction.clone()),
            off_route: state.off_route,
            approaching_destination_fired,
        }
    }
}

fn validate(route: &Route) -> Result<(), NavigationError> {
    if route.steps.is_empty() || route.steps.iter().any(|step| step.coordinates.is_empty()) {
        return Err(NavigationError::InvalidRoute);
    }
    Ok(())
}

/// Closest vertex over every step from `from_step` onward. Ties keep the
/// earliest step so a fix on a shared step boundary stays on the current step.
fn match_position(route: &Route, from_step: usize, position: Coordinate) -> Option<RouteMatch> {
    let mut best: Option<RouteMatch> = None;

    for (step_index, step) in route.steps.iter().enumerate().skip(from_step) {
        let Ok(closest) = geo::closest_point(position, &step.coordinates) else {
            continue;
        };
        if best.map_or(true, |b| closest.distance_m < b.distance_m) {
            best = Some(RouteMatch {
                step_index,
                vertex_index: closest.index,
                distance_m: closest.distance_m,
            });
        }
    }

    best
}

/// Vertex-accumulated distance from the matched vertex to the end of its
/// step, plus the reported length of every later step.
fn remaining_distance_m(route: &Route, matched: &RouteMatch) -> f64 {
    let step = &route.steps[matched.step_index];
    let partial = geo::polyline_length_m(&step.coordinates[matched.vertex_index..]);
    let later: f64 = route.steps[matched.step_index + 1..]
        .iter()
        .map(|step| step.distance_m)
        .sum();
    (partial + later).max(0.0)
}
