// SPDX-License-Identifier: GPL-3.0-only
//! Geographic primitives and the small amount of spherical math the
//! navigation session needs.
//!
//! Conventions:
//! - Longitude/latitude in degrees (WGS-84)
//! - Bearing in degrees clockwise from true north (0-360)
//! - Distances in meters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::validation::{self, ValidationError};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;
const RAD_TO_DEG: f64 = 180.0 / std::f64::consts::PI;

/// A plain longitude/latitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub longitude: f64,
    pub latitude: f64,
}

impl Coordinate {
    #[must_use]
    pub const fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Great-circle distance to `other` in meters.
    #[must_use]
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        haversine_distance(self, other)
    }

    /// Initial bearing towards `other`.
    #[must_use]
    pub fn bearing_to(&self, other: &Coordinate) -> f64 {
        initial_bearing(self, other)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.longitude, self.latitude)
    }
}

/// Parses `"lon,lat"`, the same order the host props use.
impl FromStr for Coordinate {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(',').map(str::trim);
        let (Some(lon), Some(lat), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(ValidationError::MalformedCoordinate {
                input: s.to_string(),
            });
        };
        let parse = |value: &str| {
            value
                .parse::<f64>()
                .map_err(|_| ValidationError::MalformedCoordinate {
                    input: s.to_string(),
                })
        };
        let coordinate = Coordinate::new(parse(lon)?, parse(lat)?);
        validation::validate_coordinate(&coordinate)?;
        Ok(coordinate)
    }
}

/// A single location reading with optional motion data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub coordinate: Coordinate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearing: Option<f64>,
    /// Ground speed in m/s
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Horizontal accuracy in meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl Position {
    #[must_use]
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            bearing: None,
            speed: None,
            accuracy: None,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_bearing(mut self, bearing: f64) -> Self {
        self.bearing = Some(normalize_bearing(bearing));
        self
    }

    #[must_use]
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    #[must_use]
    pub fn longitude(&self) -> f64 {
        self.coordinate.longitude
    }

    #[must_use]
    pub fn latitude(&self) -> f64 {
        self.coordinate.latitude
    }
}

/// Haversine great-circle distance in meters.
#[must_use]
pub fn haversine_distance(from: &Coordinate, to: &Coordinate) -> f64 {
    let lat1 = from.latitude * DEG_TO_RAD;
    let lat2 = to.latitude * DEG_TO_RAD;
    let delta_lat = (to.latitude - from.latitude) * DEG_TO_RAD;
    let delta_lon = (to.longitude - from.longitude) * DEG_TO_RAD;

    let sin_dlat = (delta_lat / 2.0).sin();
    let sin_dlon = (delta_lon / 2.0).sin();
    let a = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Forward azimuth from `from` to `to`, normalized to 0-360.
#[must_use]
pub fn initial_bearing(from: &Coordinate, to: &Coordinate) -> f64 {
    let lat1 = from.latitude * DEG_TO_RAD;
    let lat2 = to.latitude * DEG_TO_RAD;
    let delta_lon = (to.longitude - from.longitude) * DEG_TO_RAD;

    let y = delta_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos();
    normalize_bearing(y.atan2(x) * RAD_TO_DEG)
}

#[must_use]
pub fn normalize_bearing(bearing: f64) -> f64 {
    bearing.rem_euclid(360.0)
}

/// Linear interpolation between two coordinates. Good enough for the short
/// segments of a route polyline.
#[must_use]
pub fn interpolate(from: &Coordinate, to: &Coordinate, fraction: f64) -> Coordinate {
    let t = fraction.clamp(0.0, 1.0);
    Coordinate::new(
        from.longitude + (to.longitude - from.longitude) * t,
        from.latitude + (to.latitude - from.latitude) * t,
    )
}

/// Result of projecting a point onto a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentProjection {
    pub point: Coordinate,
    /// Position of `point` along the segment, 0.0 at start and 1.0 at end
    pub fraction: f64,
    /// Distance in meters between the input point and `point`
    pub distance: f64,
}

/// Project `point` onto the segment `start..end` using a local
/// equirectangular approximation around the segment start.
#[must_use]
pub fn project_on_segment(
    point: &Coordinate,
    start: &Coordinate,
    end: &Coordinate,
) -> SegmentProjection {
    let cos_lat = (start.latitude * DEG_TO_RAD).cos();
    let to_xy = |c: &Coordinate| {
        (
            (c.longitude - start.longitude) * cos_lat,
            c.latitude - start.latitude,
        )
    };
    let (px, py) = to_xy(point);
    let (ex, ey) = to_xy(end);

    let len_sq = ex * ex + ey * ey;
    let fraction = if len_sq <= f64::EPSILON {
        0.0
    } else {
        ((px * ex + py * ey) / len_sq).clamp(0.0, 1.0)
    };
    let projected = interpolate(start, end, fraction);

    SegmentProjection {
        point: projected,
        fraction,
        distance: haversine_distance(point, &projected),
    }
}

/// Axis-aligned bounds in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    #[must_use]
    pub fn around(coordinate: &Coordinate) -> Self {
        Self {
            west: coordinate.longitude,
            south: coordinate.latitude,
            east: coordinate.longitude,
            north: coordinate.latitude,
        }
    }

    /// Bounds covering every coordinate, or `None` for an empty input.
    pub fn from_coordinates<'a>(
        coordinates: impl IntoIterator<Item = &'a Coordinate>,
    ) -> Option<Self> {
        let mut iter = coordinates.into_iter();
        let first = iter.next()?;
        let mut bounds = Self::around(first);
        for coordinate in iter {
            bounds.extend(coordinate);
        }
        Some(bounds)
    }

    pub fn extend(&mut self, coordinate: &Coordinate) {
        self.west = self.west.min(coordinate.longitude);
        self.east = self.east.max(coordinate.longitude);
        self.south = self.south.min(coordinate.latitude);
        self.north = self.north.max(coordinate.latitude);
    }

    #[must_use]
    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.west + self.east) / 2.0,
            (self.south + self.north) / 2.0,
        )
    }

    #[must_use]
    pub fn longitude_span(&self) -> f64 {
        self.east - self.west
    }

    #[must_use]
    pub fn latitude_span(&self) -> f64 {
        self.north - self.south
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_one_degree_latitude() {
        let a = Coordinate::new(139.0, 35.0);
        let b = Coordinate::new(139.0, 36.0);
        let distance = haversine_distance(&a, &b);
        assert!((distance - 111_195.0).abs() < 500.0);
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        let origin = Coordinate::new(139.0, 35.0);
        let north = initial_bearing(&origin, &Coordinate::new(139.0, 36.0));
        let east = initial_bearing(&origin, &Coordinate::new(140.0, 35.0));
        let south = initial_bearing(&origin, &Coordinate::new(139.0, 34.0));
        let west = initial_bearing(&origin, &Coordinate::new(138.0, 35.0));
        assert!(north < 1.0 || north > 359.0);
        assert!((east - 90.0).abs() < 1.0);
        assert!((south - 180.0).abs() < 1.0);
        assert!((west - 270.0).abs() < 1.0);
    }

    #[test]
    fn test_normalize_bearing_negative() {
        assert!((normalize_bearing(-90.0) - 270.0).abs() < 1e-9);
        assert!((normalize_bearing(720.0)).abs() < 1e-9);
    }

    #[test]
    fn test_project_on_segment_midpoint() {
        let start = Coordinate::new(2.0, 48.0);
        let end = Coordinate::new(2.01, 48.0);
        let point = Coordinate::new(2.005, 48.0005);
        let projection = project_on_segment(&point, &start, &end);
        assert!((projection.fraction - 0.5).abs() < 0.01);
        assert!((projection.point.latitude - 48.0).abs() < 1e-9);
        // ~0.0005 degrees of latitude is ~55m
        assert!((projection.distance - 55.6).abs() < 2.0);
    }

    #[test]
    fn test_project_clamps_before_start() {
        let start = Coordinate::new(2.0, 48.0);
        let end = Coordinate::new(2.01, 48.0);
        let point = Coordinate::new(1.99, 48.0);
        let projection = project_on_segment(&point, &start, &end);
        assert!(projection.fraction.abs() < f64::EPSILON);
        assert_eq!(projection.point, start);
    }

    #[test]
    fn test_parse_coordinate() {
        let coordinate: Coordinate = "2.4508048, 48.5691981".parse().unwrap();
        assert!((coordinate.longitude - 2.450_804_8).abs() < 1e-9);
        assert!((coordinate.latitude - 48.569_198_1).abs() < 1e-9);
        assert!("2.45".parse::<Coordinate>().is_err());
        assert!("a,b".parse::<Coordinate>().is_err());
        assert!("200,10".parse::<Coordinate>().is_err());
    }

    #[test]
    fn test_bounding_box() {
        let coordinates = [
            Coordinate::new(2.3, 48.6),
            Coordinate::new(2.45, 48.56),
            Coordinate::new(2.4, 48.58),
        ];
        let bounds = BoundingBox::from_coordinates(coordinates.iter()).unwrap();
        assert!((bounds.west - 2.3).abs() < 1e-9);
        assert!((bounds.east - 2.45).abs() < 1e-9);
        assert!((bounds.south - 48.56).abs() < 1e-9);
        assert!((bounds.north - 48.6).abs() < 1e-9);
        assert!(BoundingBox::from_coordinates(std::iter::empty::<&Coordinate>()).is_none());
    }
}
