// SPDX-License-Identifier: GPL-3.0-only
//! A map surface without a map: logs what a real surface would draw

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, info, warn};

use super::{MapSurface, RenderCommand};
use crate::camera::CameraFrame;
use crate::location::LocationFix;
use crate::session::events::Completion;

/// Simulated style download time
const STYLE_LOAD_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Default)]
pub struct HeadlessSurface {
    released: AtomicBool,
}

impl HeadlessSurface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

impl MapSurface for HeadlessSurface {
    fn load_style(&self, style_uri: &str, done: Completion<Result<(), String>>) {
        info!("Loading map style {style_uri}");
        tokio::spawn(async move {
            tokio::time::sleep(STYLE_LOAD_DELAY).await;
            done.complete(Ok(()));
        });
    }

    fn submit(&self, command: RenderCommand) {
        if self.is_released() {
            warn!("Render submission after release ignored");
            return;
        }
        match &command {
            RenderCommand::DrawRoutes {
                route_generation,
                primary,
                alternatives,
            } => info!(
                "Drawing route {} ({} points, {} alternatives, generation {route_generation})",
                primary.route_id,
                primary.coordinates.len(),
                alternatives.len()
            ),
            RenderCommand::ClearRoutes => info!("Clearing route layers"),
            RenderCommand::Arrow(arrow) => debug!(
                "Maneuver arrow {} ({} points, heading {:.0})",
                arrow.maneuver_index,
                arrow.shaft.len(),
                arrow.head_bearing
            ),
        }
    }

    fn update_location_indicator(&self, fix: &LocationFix) {
        debug!(
            "Location indicator at {} ({} key points)",
            fix.enhanced.coordinate,
            fix.key_points.len()
        );
    }

    fn apply_camera(&self, frame: &CameraFrame) {
        debug!(
            "Camera {} at {} zoom {:.2} bearing {:.0} pitch {:.0}",
            frame.mode, frame.anchor, frame.zoom, frame.bearing, frame.pitch
        );
    }

    fn animate_camera(&self, frame: &CameraFrame, duration: Duration, done: Completion<()>) {
        self.apply_camera(frame);
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            done.complete(());
        });
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            info!("Map surface released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraMode, EdgeInsets};
    use navkit_shared::Coordinate;
    use tokio::sync::oneshot;

    #[tokio::test(start_paused = true)]
    async fn test_animation_completes_after_duration() {
        let surface = HeadlessSurface::new();
        let frame = CameraFrame {
            mode: CameraMode::Overview,
            padding: EdgeInsets::default(),
            anchor: Coordinate::new(2.0, 48.0),
            bearing: 0.0,
            zoom: 12.0,
            pitch: 0.0,
            route_generation: None,
            fix_sequence: 0,
        };
        let (tx, rx) = oneshot::channel();
        surface.animate_camera(
            &frame,
            Duration::from_millis(1500),
            Completion::new(move |()| {
                let _ = tx.send(tokio::time::Instant::now());
            }),
        );
        let start = tokio::time::Instant::now();
        let finished = rx.await.unwrap();
        assert!(finished - start >= Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_style_load_reports_success() {
        let surface = HeadlessSurface::new();
        let (tx, rx) = oneshot::channel();
        surface.load_style(
            "mapbox://styles/mapbox/streets-v12",
            Completion::new(move |result| {
                let _ = tx.send(result);
            }),
        );
        assert_eq!(rx.await.unwrap(), Ok(()));
        surface.release();
        surface.release();
        assert!(surface.is_released());
    }
}
