// SPDX-License-Identifier: GPL-3.0-only
//! Route line and maneuver arrow render data
//!
//! The pipeline turns route changes and progress ticks into
//! [`RenderCommand`]s for the map surface. It holds no drawing state itself:
//! every route change yields exactly one command, every tick at most one
//! arrow.

pub mod headless;

use std::time::Duration;

use log::debug;
use navkit_shared::models::geo::initial_bearing;
use navkit_shared::{Coordinate, RouteCandidate, RouteProgress};
use serde::Serialize;

use crate::camera::CameraFrame;
use crate::error::NavError;
use crate::location::LocationFix;
use crate::route::ActiveRoutes;
use crate::session::events::Completion;

pub use headless::HeadlessSurface;

/// Meters of route drawn before the upcoming maneuver
pub const ARROW_BEFORE_M: f64 = 30.0;
/// Meters of route drawn after the upcoming maneuver
pub const ARROW_AFTER_M: f64 = 20.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteLine {
    pub route_id: String,
    pub coordinates: Vec<Coordinate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManeuverArrow {
    pub route_generation: u64,
    pub maneuver_index: usize,
    pub shaft: Vec<Coordinate>,
    /// Direction the arrow head points to
    pub head_bearing: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum RenderCommand {
    /// Replace the route layers
    DrawRoutes {
        route_generation: u64,
        primary: RouteLine,
        alternatives: Vec<RouteLine>,
    },
    /// Remove route line and arrow layers
    ClearRoutes,
    Arrow(ManeuverArrow),
}

/// The map rendering surface.
pub trait MapSurface: Send + Sync {
    /// Load the map style. `done` reports success or a reason.
    fn load_style(&self, style_uri: &str, done: Completion<Result<(), String>>);
    fn submit(&self, command: RenderCommand);
    fn update_location_indicator(&self, fix: &LocationFix);
    /// Move the camera immediately.
    fn apply_camera(&self, frame: &CameraFrame);
    /// Animate the camera to `frame`; `done` fires when the animation ends.
    fn animate_camera(&self, frame: &CameraFrame, duration: Duration, done: Completion<()>);
    /// Drop every drawing handle. Called once at teardown.
    fn release(&self);
}

fn line(route: &RouteCandidate) -> RouteLine {
    RouteLine {
        route_id: route.id.clone(),
        coordinates: route.geometry.clone(),
    }
}

/// The single submission for a change of the active route.
#[must_use]
pub fn route_change_command(routes: Option<&ActiveRoutes>) -> RenderCommand {
    match routes {
        Some(routes) => RenderCommand::DrawRoutes {
            route_generation: routes.generation,
            primary: line(&routes.primary),
            alternatives: routes.alternatives.iter().map(|route| line(route)).collect(),
        },
        None => RenderCommand::ClearRoutes,
    }
}

/// Arrow for the upcoming maneuver at `progress`.
#[must_use]
pub fn maneuver_arrow(
    route: &RouteCandidate,
    route_generation: u64,
    progress: &RouteProgress,
) -> Option<ManeuverArrow> {
    let maneuver = route
        .maneuvers
        .iter()
        .find(|maneuver| maneuver.index == progress.current_maneuver_index)?;
    let at = maneuver.distance_from_start;
    let shaft = route.slice(at - ARROW_BEFORE_M, at + ARROW_AFTER_M);
    let [.., before_head, head] = shaft.as_slice() else {
        return None;
    };
    Some(ManeuverArrow {
        route_generation,
        maneuver_index: maneuver.index,
        head_bearing: initial_bearing(before_head, head),
        shaft,
    })
}

/// Arrow submission gated on the style being loaded.
///
/// # Errors
/// Returns [`NavError::RenderSurfaceNotReady`] while the style is loading.
/// The caller skips this tick and tries again on the next.
pub fn arrow_command(
    style_loaded: bool,
    route: &RouteCandidate,
    route_generation: u64,
    progress: &RouteProgress,
) -> Result<Option<RenderCommand>, NavError> {
    if !style_loaded {
        return Err(NavError::RenderSurfaceNotReady);
    }
    let arrow = maneuver_arrow(route, route_generation, progress);
    if arrow.is_none() {
        debug!(
            "No arrow for maneuver {} on route {}",
            progress.current_maneuver_index, route.id
        );
    }
    Ok(arrow.map(RenderCommand::Arrow))
}
