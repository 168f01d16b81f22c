// SPDX-License-Identifier: GPL-3.0-only
pub mod directions;
pub mod progress;
pub mod session;

use navkit_shared::{RouteOutcome, RouteRequest};

use crate::session::events::Completion;

pub use directions::DirectionsClient;
pub use progress::{GuidanceSettings, ProgressTracker, ProgressUpdate, RouteProjection};
pub use session::{ActiveRoutes, RouteSession};

/// External routing engine.
pub trait RoutingService: Send + Sync {
    /// Start a request. `done` is invoked exactly once unless the request is
    /// dropped by [`RoutingService::cancel_all`] during teardown.
    fn request(&self, request: RouteRequest, done: Completion<RouteOutcome>);

    /// Abort everything in flight.
    fn cancel_all(&self) {}
}
