// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString, VariantNames};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumIter,
    EnumString,
    VariantNames,
    Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// What the camera is framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CameraMode {
    #[default]
    Following,
    Overview,
}

/// Screen-space insets in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct EdgeInsets {
    pub top: f64,
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
}

impl EdgeInsets {
    #[must_use]
    pub const fn new(top: f64, left: f64, bottom: f64, right: f64) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
        }
    }

    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(
            self.top * factor,
            self.left * factor,
            self.bottom * factor,
            self.right * factor,
        )
    }

    #[must_use]
    pub fn horizontal(&self) -> f64 {
        self.left + self.right
    }

    #[must_use]
    pub fn vertical(&self) -> f64 {
        self.top + self.bottom
    }
}

// Density-independent pixels, top/left/bottom/right
const PORTRAIT_OVERVIEW: EdgeInsets = EdgeInsets::new(140.0, 40.0, 120.0, 40.0);
const LANDSCAPE_OVERVIEW: EdgeInsets = EdgeInsets::new(30.0, 380.0, 110.0, 20.0);
const PORTRAIT_FOLLOWING: EdgeInsets = EdgeInsets::new(180.0, 40.0, 150.0, 40.0);
const LANDSCAPE_FOLLOWING: EdgeInsets = EdgeInsets::new(30.0, 380.0, 110.0, 40.0);

/// Padding profile for a camera mode, in physical pixels.
#[must_use]
pub fn padding_for(orientation: Orientation, mode: CameraMode, pixel_density: f64) -> EdgeInsets {
    let dp = match (orientation, mode) {
        (Orientation::Portrait, CameraMode::Overview) => PORTRAIT_OVERVIEW,
        (Orientation::Landscape, CameraMode::Overview) => LANDSCAPE_OVERVIEW,
        (Orientation::Portrait, CameraMode::Following) => PORTRAIT_FOLLOWING,
        (Orientation::Landscape, CameraMode::Following) => LANDSCAPE_FOLLOWING,
    };
    dp.scaled(pixel_density)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_scale_with_density() {
        let padding = padding_for(Orientation::Landscape, CameraMode::Overview, 2.0);
        assert_eq!(padding, EdgeInsets::new(60.0, 760.0, 220.0, 40.0));

        let padding = padding_for(Orientation::Portrait, CameraMode::Following, 1.0);
        assert_eq!(padding, EdgeInsets::new(180.0, 40.0, 150.0, 40.0));
        assert!((padding.vertical() - 330.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_following_profiles_differ_by_orientation() {
        let portrait = padding_for(Orientation::Portrait, CameraMode::Following, 3.0);
        let landscape = padding_for(Orientation::Landscape, CameraMode::Following, 3.0);
        assert!(landscape.left > portrait.left);
        assert_eq!(
            "landscape".parse::<Orientation>().unwrap(),
            Orientation::Landscape
        );
    }
}
