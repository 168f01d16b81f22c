// SPDX-License-Identifier: GPL-3.0-only
pub mod padding;
pub mod viewport;

use std::time::Duration;

use crate::config::CameraConfig;

pub use padding::{CameraMode, EdgeInsets, Orientation, padding_for};
pub use viewport::{CameraAnimation, CameraFrame, NavigationCameraState, ViewportController};

#[derive(Debug, Clone, PartialEq)]
pub struct CameraSettings {
    pub pixel_density: f64,
    /// Viewport size in density-independent pixels
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub following_zoom: f64,
    pub following_pitch: f64,
    pub max_overview_zoom: f64,
    pub transition: Duration,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            pixel_density: 1.0,
            viewport_width: 400.0,
            viewport_height: 800.0,
            following_zoom: 16.5,
            following_pitch: 45.0,
            max_overview_zoom: 16.35,
            transition: Duration::from_millis(1500),
        }
    }
}

impl From<&CameraConfig> for CameraSettings {
    fn from(config: &CameraConfig) -> Self {
        Self {
            pixel_density: config.pixel_density.max(0.1),
            viewport_width: config.viewport_width,
            viewport_height: config.viewport_height,
            following_zoom: config.following_zoom,
            following_pitch: config.following_pitch,
            max_overview_zoom: config.max_overview_zoom,
            transition: Duration::from_millis(config.transition_ms),
        }
    }
}
