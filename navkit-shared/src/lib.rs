// SPDX-License-Identifier: GPL-3.0-only
pub mod models;
pub mod validation;

// Re-export commonly used types for convenience
pub use models::*;
pub use models::events::HostEvent;
pub use models::geo::{Coordinate, Position};
pub use models::progress::RouteProgress;
pub use models::route::{
    Maneuver, ManeuverKind, RouteCandidate, RouteLeg, RouteOutcome, RouteRequest, RouterFailure,
    RoutingProfile, VoiceCue,
};
