// SPDX-License-Identifier: GPL-3.0-only
//! Camera framing for the navigation map
//!
//! The controller keeps the latest inputs (fix, route, progress,
//! orientation) and recomputes a [`CameraFrame`] on every
//! [`ViewportController::evaluate`]. Frames are only handed to the surface
//! while the camera is settled in Following or Overview; transitions and user
//! gestures own the camera in between.

use std::f64::consts::{FRAC_PI_4, PI};
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use navkit_shared::models::geo::BoundingBox;
use navkit_shared::{Coordinate, RouteCandidate, RouteProgress};
use serde::Serialize;

use super::CameraSettings;
use super::padding::{CameraMode, EdgeInsets, Orientation, padding_for};
use crate::location::LocationFix;

/// Map tile size used by the zoom math, in pixels
const TILE_SIZE: f64 = 512.0;
const MAX_MERCATOR_LATITUDE: f64 = 85.051_129;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NavigationCameraState {
    #[default]
    Idle,
    TransitionToFollowing,
    Following,
    TransitionToOverview,
    Overview,
}

impl NavigationCameraState {
    /// The recenter affordance is hidden while the camera follows the user.
    #[must_use]
    pub fn shows_recenter(&self) -> bool {
        !matches!(
            self,
            NavigationCameraState::Following | NavigationCameraState::TransitionToFollowing
        )
    }

    fn is_settled(self) -> bool {
        matches!(
            self,
            NavigationCameraState::Following | NavigationCameraState::Overview
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CameraFrame {
    pub mode: CameraMode,
    pub padding: EdgeInsets,
    pub anchor: Coordinate,
    pub bearing: f64,
    pub zoom: f64,
    pub pitch: f64,
    /// Generation of the route this frame was computed from
    pub route_generation: Option<u64>,
    /// Number of fixes seen when this frame was computed
    pub fix_sequence: u64,
}

/// A transition the surface should animate.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraAnimation {
    pub transition: u64,
    pub frame: CameraFrame,
    pub duration: Duration,
}

#[derive(Debug)]
pub struct ViewportController {
    settings: CameraSettings,
    orientation: Orientation,
    requested: CameraMode,
    state: NavigationCameraState,
    transition: u64,
    origin_hint: Option<Coordinate>,
    fix: Option<LocationFix>,
    fix_sequence: u64,
    route: Option<(Arc<RouteCandidate>, u64)>,
    progress: Option<RouteProgress>,
    last_frame: Option<CameraFrame>,
}

impl ViewportController {
    #[must_use]
    pub fn new(settings: CameraSettings, orientation: Orientation) -> Self {
        Self {
            settings,
            orientation,
            requested: CameraMode::Following,
            state: NavigationCameraState::Idle,
            transition: 0,
            origin_hint: None,
            fix: None,
            fix_sequence: 0,
            route: None,
            progress: None,
            last_frame: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> NavigationCameraState {
        self.state
    }

    #[must_use]
    pub fn last_frame(&self) -> Option<&CameraFrame> {
        self.last_frame.as_ref()
    }

    #[must_use]
    pub fn default_transition(&self) -> Duration {
        self.settings.transition
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
    }

    /// Where to look before the first fix arrives.
    pub fn set_origin_hint(&mut self, origin: Option<Coordinate>) {
        self.origin_hint = origin;
    }

    pub fn on_location(&mut self, fix: &LocationFix) {
        self.fix = Some(fix.clone());
        self.fix_sequence += 1;
    }

    pub fn on_route_changed(&mut self, route: Option<(Arc<RouteCandidate>, u64)>) {
        self.route = route;
        self.progress = None;
    }

    pub fn on_progress(&mut self, progress: RouteProgress) {
        self.progress = Some(progress);
    }

    /// Recompute the frame. Returns it when the surface should be updated.
    pub fn evaluate(&mut self) -> Option<CameraFrame> {
        self.last_frame = self.compute(self.requested);
        if self.state.is_settled() {
            self.last_frame.clone()
        } else {
            None
        }
    }

    pub fn request_following(&mut self, duration: Duration) -> Option<CameraAnimation> {
        self.request(CameraMode::Following, duration)
    }

    pub fn request_overview(&mut self, duration: Duration) -> Option<CameraAnimation> {
        self.request(CameraMode::Overview, duration)
    }

    fn request(&mut self, mode: CameraMode, duration: Duration) -> Option<CameraAnimation> {
        self.requested = mode;
        self.transition += 1;
        let frame = self.compute(mode);
        self.last_frame = frame.clone();

        self.state = match (mode, duration.is_zero() || frame.is_none()) {
            (CameraMode::Following, true) => NavigationCameraState::Following,
            (CameraMode::Overview, true) => NavigationCameraState::Overview,
            (CameraMode::Following, false) => NavigationCameraState::TransitionToFollowing,
            (CameraMode::Overview, false) => NavigationCameraState::TransitionToOverview,
        };
        debug!("Camera -> {:?} over {duration:?}", self.state);

        frame.map(|frame| CameraAnimation {
            transition: self.transition,
            frame,
            duration,
        })
    }

    /// Apply the completion of `transition`. Completions of superseded
    /// transitions are ignored.
    pub fn finish_transition(&mut self, transition: u64) -> bool {
        if transition != self.transition {
            debug!(
                "Ignoring completion of camera transition {transition} (current {})",
                self.transition
            );
            return false;
        }
        self.state = match self.state {
            NavigationCameraState::TransitionToFollowing => NavigationCameraState::Following,
            NavigationCameraState::TransitionToOverview => NavigationCameraState::Overview,
            settled => settled,
        };
        true
    }

    /// The user moved the map.
    pub fn on_gesture(&mut self) {
        self.transition += 1;
        self.state = NavigationCameraState::Idle;
    }

    pub fn reset(&mut self) {
        self.on_gesture();
        self.route = None;
        self.progress = None;
    }

    fn compute(&self, mode: CameraMode) -> Option<CameraFrame> {
        let padding = padding_for(self.orientation, mode, self.settings.pixel_density);
        let (anchor, bearing, zoom, pitch) = match mode {
            CameraMode::Following => {
                let (anchor, bearing) = self.following_anchor()?;
                (
                    anchor,
                    bearing,
                    self.settings.following_zoom,
                    self.settings.following_pitch,
                )
            }
            CameraMode::Overview => {
                let (anchor, zoom) = self.overview_anchor(&padding)?;
                (anchor, 0.0, zoom, 0.0)
            }
        };
        Some(CameraFrame {
            mode,
            padding,
            anchor,
            bearing,
            zoom,
            pitch,
            route_generation: self.route.as_ref().map(|(_, generation)| *generation),
            fix_sequence: self.fix_sequence,
        })
    }

    fn following_anchor(&self) -> Option<(Coordinate, f64)> {
        if let Some(fix) = &self.fix {
            return Some((fix.enhanced.coordinate, fix.enhanced.bearing.unwrap_or(0.0)));
        }
        self.origin_hint
            .or_else(|| {
                self.route
                    .as_ref()
                    .and_then(|(route, _)| route.origin().copied())
            })
            .map(|origin| (origin, 0.0))
    }

    fn overview_anchor(&self, padding: &EdgeInsets) -> Option<(Coordinate, f64)> {
        let position = self.fix.as_ref().map(|fix| fix.enhanced.coordinate);
        let Some((route, _)) = &self.route else {
            return position.map(|anchor| (anchor, self.settings.following_zoom));
        };

        let traveled = self.progress.map_or(0.0, |p| p.distance_traveled);
        let mut remaining = route.slice(traveled, route.geometry_length());
        if remaining.is_empty() {
            remaining.clone_from(&route.geometry);
        }
        let mut bounds = BoundingBox::from_coordinates(&remaining)
            .or_else(|| position.as_ref().map(BoundingBox::around))?;
        if let Some(position) = &position {
            bounds.extend(position);
        }

        let density = self.settings.pixel_density;
        let width = (self.settings.viewport_width * density - padding.horizontal()).max(1.0);
        let height = (self.settings.viewport_height * density - padding.vertical()).max(1.0);
        Some((
            bounds.center(),
            fit_zoom(&bounds, width, height, self.settings.max_overview_zoom),
        ))
    }
}

fn mercator_y(latitude: f64) -> f64 {
    let latitude = latitude
        .clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE)
        .to_radians();
    (FRAC_PI_4 + latitude / 2.0).tan().ln()
}

/// Largest zoom at which `bounds` fits into `width` x `height` pixels.
#[must_use]
pub fn fit_zoom(bounds: &BoundingBox, width: f64, height: f64, max_zoom: f64) -> f64 {
    let x_fraction = bounds.longitude_span() / 360.0;
    let y_fraction = (mercator_y(bounds.north) - mercator_y(bounds.south)).abs() / (2.0 * PI);

    let zoom_for = |pixels: f64, fraction: f64| {
        if fraction > 0.0 {
            (pixels / (TILE_SIZE * fraction)).log2()
        } else {
            max_zoom
        }
    };
    zoom_for(width, x_fraction)
        .min(zoom_for(height, y_fraction))
        .clamp(0.0, max_zoom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::straight_route;
    use navkit_shared::Position;

    fn controller() -> ViewportController {
        ViewportController::new(CameraSettings::default(), Orientation::Portrait)
    }

    fn fix_at(longitude: f64, latitude: f64, bearing: f64) -> LocationFix {
        LocationFix::unmatched(
            Position::new(Coordinate::new(longitude, latitude)).with_bearing(bearing),
        )
    }

    #[test]
    fn test_instant_following_snaps_onto_origin() {
        let mut camera = controller();
        camera.set_origin_hint(Some(Coordinate::new(2.45, 48.57)));

        let animation = camera.request_following(Duration::ZERO).unwrap();
        assert_eq!(camera.state(), NavigationCameraState::Following);
        assert_eq!(animation.frame.anchor, Coordinate::new(2.45, 48.57));
        assert_eq!(animation.frame.mode, CameraMode::Following);
        assert!(animation.duration.is_zero());
    }

    #[test]
    fn test_evaluate_applies_only_when_settled() {
        let mut camera = controller();
        camera.on_location(&fix_at(2.0, 48.0, 90.0));
        // Idle: frame computed but not applied
        assert!(camera.evaluate().is_none());
        assert!(camera.last_frame().is_some());

        let animation = camera.request_following(Duration::from_millis(1500)).unwrap();
        assert_eq!(camera.state(), NavigationCameraState::TransitionToFollowing);
        assert!(camera.evaluate().is_none());

        assert!(camera.finish_transition(animation.transition));
        assert_eq!(camera.state(), NavigationCameraState::Following);
        let frame = camera.evaluate().unwrap();
        assert!((frame.bearing - 90.0).abs() < f64::EPSILON);
        assert_eq!(frame.fix_sequence, 1);
        assert_eq!(frame.padding, EdgeInsets::new(180.0, 40.0, 150.0, 40.0));
    }

    #[test]
    fn test_superseded_transition_completion_ignored() {
        let mut camera = controller();
        camera.on_location(&fix_at(2.0, 48.0, 0.0));
        let first = camera.request_overview(Duration::from_millis(1500)).unwrap();
        let second = camera.request_following(Duration::from_millis(1500)).unwrap();

        assert!(!camera.finish_transition(first.transition));
        assert_eq!(camera.state(), NavigationCameraState::TransitionToFollowing);
        assert!(camera.finish_transition(second.transition));
        assert_eq!(camera.state(), NavigationCameraState::Following);
    }

    #[test]
    fn test_gesture_moves_to_idle_and_invalidates_transition() {
        let mut camera = controller();
        camera.on_location(&fix_at(2.0, 48.0, 0.0));
        let animation = camera.request_overview(Duration::from_millis(1500)).unwrap();
        camera.on_gesture();
        assert_eq!(camera.state(), NavigationCameraState::Idle);
        assert!(!camera.finish_transition(animation.transition));
        assert_eq!(camera.state(), NavigationCameraState::Idle);
    }

    #[test]
    fn test_frames_carry_latest_route_generation() {
        let mut camera = controller();
        camera.on_location(&fix_at(2.0, 48.0, 0.0));
        camera.request_overview(Duration::ZERO);

        camera.on_route_changed(Some((Arc::new(straight_route("a")), 1)));
        assert_eq!(camera.evaluate().unwrap().route_generation, Some(1));
        camera.on_route_changed(Some((Arc::new(straight_route("b")), 4)));
        assert_eq!(camera.evaluate().unwrap().route_generation, Some(4));
        camera.on_route_changed(None);
        assert_eq!(camera.evaluate().unwrap().route_generation, None);
    }

    #[test]
    fn test_overview_frames_remaining_route() {
        let mut camera = controller();
        let route = Arc::new(straight_route("a"));
        camera.on_route_changed(Some((route.clone(), 1)));
        camera.on_location(&fix_at(2.0, 48.0, 0.0));
        camera.request_overview(Duration::ZERO);

        let full = camera.evaluate().unwrap();
        assert!((full.anchor.longitude - 2.015).abs() < 1e-9);
        assert!(full.pitch.abs() < f64::EPSILON);

        // Two thirds along: the remaining route is shorter, so zoom goes up
        camera.on_location(&fix_at(2.02, 48.0, 90.0));
        camera.on_progress(RouteProgress::along(
            route.distance_at_vertex(2),
            route.geometry_length(),
            route.duration,
        ));
        let remaining = camera.evaluate().unwrap();
        assert!((remaining.anchor.longitude - 2.025).abs() < 1e-9);
        assert!(remaining.zoom > full.zoom);
    }

    #[test]
    fn test_overview_without_route_centers_on_fix() {
        let mut camera = controller();
        assert!(camera.request_overview(Duration::ZERO).is_none());
        camera.on_location(&fix_at(2.3, 48.6, 10.0));
        let frame = camera.evaluate().unwrap();
        assert_eq!(frame.anchor, Coordinate::new(2.3, 48.6));
        assert_eq!(frame.mode, CameraMode::Overview);
    }

    #[test]
    fn test_fit_zoom() {
        // A quarter of the world's longitude in 512 px is zoom 2
        let bounds = BoundingBox {
            west: 0.0,
            south: 0.0,
            east: 90.0,
            north: 0.0,
        };
        assert!((fit_zoom(&bounds, 512.0, 512.0, 20.0) - 2.0).abs() < 1e-9);
        let point = BoundingBox::around(&Coordinate::new(2.0, 48.0));
        assert!((fit_zoom(&point, 400.0, 400.0, 16.35) - 16.35).abs() < 1e-9);
    }
}
