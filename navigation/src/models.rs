pub use shared::{
    ApiError, BoundingBox, Coordinate, NavigationState, ParkingSpot, ProgressSnapshot,
    RedirectRequest, Route, RouteStep, SpotQuery, StartSessionRequest, StartSessionResponse,
};
