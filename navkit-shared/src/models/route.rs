// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString, VariantNames};

use crate::models::geo::{Coordinate, haversine_distance, interpolate};

/// Routing profile passed to the routing collaborator.
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
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RoutingProfile {
    DrivingTraffic,
    #[default]
    Driving,
    Walking,
    Cycling,
}

/// What the coordinator asks the routing collaborator for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteRequest {
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub profile: RoutingProfile,
    pub language: String,
    pub alternatives: bool,
}

/// One diagnostic reason returned by a failed routing request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterFailure {
    pub code: Option<String>,
    pub message: String,
}

impl RouterFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl std::fmt::Display for RouterFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{code}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Terminal outcome of one routing request.
#[derive(Debug, Clone)]
pub enum RouteOutcome {
    Ready(Vec<RouteCandidate>),
    Failure(Vec<RouterFailure>),
    Canceled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ManeuverKind {
    Depart,
    Turn,
    Continue,
    Merge,
    OnRamp,
    OffRamp,
    Fork,
    EndOfRoad,
    NewName,
    Roundabout,
    Rotary,
    RoundaboutTurn,
    Notification,
    Arrive,
    #[strum(default)]
    Other(String),
}

/// A voice instruction attached to a maneuver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceCue {
    pub instruction_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssml: Option<String>,
    /// Maneuver this cue announces
    pub maneuver_index: usize,
    /// Distance in meters before the maneuver at which the cue fires
    pub trigger_distance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Maneuver {
    pub index: usize,
    pub leg_index: usize,
    pub location: Coordinate,
    /// Distance along the route geometry from the route start, in meters
    pub distance_from_start: f64,
    pub kind: ManeuverKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier: Option<String>,
    pub instruction: String,
    #[serde(default)]
    pub voice_cues: Vec<VoiceCue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteLeg {
    pub summary: String,
    pub distance: f64,
    pub duration: f64,
}

/// A route returned by the routing collaborator.
///
/// Geometry is kept together with cumulative vertex distances so progress,
/// arrow and overview computations never re-measure the whole line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteCandidate {
    pub id: String,
    pub geometry: Vec<Coordinate>,
    pub legs: Vec<RouteLeg>,
    pub maneuvers: Vec<Maneuver>,
    /// Meters
    pub distance: f64,
    /// Seconds
    pub duration: f64,
    #[serde(skip)]
    cumulative: Vec<f64>,
}

impl RouteCandidate {
    /// Build a candidate. A non-positive `distance` is replaced by the
    /// measured geometry length.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        geometry: Vec<Coordinate>,
        legs: Vec<RouteLeg>,
        maneuvers: Vec<Maneuver>,
        distance: f64,
        duration: f64,
    ) -> Self {
        let mut cumulative = Vec::with_capacity(geometry.len());
        let mut total = 0.0;
        for (index, coordinate) in geometry.iter().enumerate() {
            if index > 0 {
                total += haversine_distance(&geometry[index - 1], coordinate);
            }
            cumulative.push(total);
        }
        let distance = if distance > 0.0 { distance } else { total };

        Self {
            id: id.into(),
            geometry,
            legs,
            maneuvers,
            distance,
            duration,
            cumulative,
        }
    }

    /// Measured length of the geometry in meters.
    #[must_use]
    pub fn geometry_length(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// Distance from the start to vertex `index`.
    #[must_use]
    pub fn distance_at_vertex(&self, index: usize) -> f64 {
        self.cumulative.get(index).copied().unwrap_or_else(|| self.geometry_length())
    }

    #[must_use]
    pub fn origin(&self) -> Option<&Coordinate> {
        self.geometry.first()
    }

    #[must_use]
    pub fn destination(&self) -> Option<&Coordinate> {
        self.geometry.last()
    }

    /// Average speed in m/s, if the route carries a duration.
    #[must_use]
    pub fn average_speed(&self) -> Option<f64> {
        (self.duration > 0.0).then(|| self.geometry_length() / self.duration)
    }

    /// Index of the segment containing `distance` (segment `i` runs from
    /// vertex `i` to vertex `i + 1`).
    #[must_use]
    pub fn segment_at(&self, distance: f64) -> Option<usize> {
        if self.geometry.len() < 2 {
            return None;
        }
        let last_segment = self.geometry.len() - 2;
        let index = self
            .cumulative
            .partition_point(|&d| d <= distance)
            .saturating_sub(1);
        Some(index.min(last_segment))
    }

    /// Point located `distance` meters along the geometry, clamped to the ends.
    #[must_use]
    pub fn coordinate_at(&self, distance: f64) -> Option<Coordinate> {
        let segment = match self.segment_at(distance) {
            Some(segment) => segment,
            None => return self.geometry.first().copied(),
        };
        let start = self.cumulative[segment];
        let length = self.cumulative[segment + 1] - start;
        let fraction = if length > 0.0 {
            (distance - start) / length
        } else {
            0.0
        };
        Some(interpolate(
            &self.geometry[segment],
            &self.geometry[segment + 1],
            fraction,
        ))
    }

    /// Sub-polyline between two distances along the route, including the
    /// interpolated end points.
    #[must_use]
    pub fn slice(&self, from: f64, to: f64) -> Vec<Coordinate> {
        let length = self.geometry_length();
        let from = from.clamp(0.0, length);
        let to = to.clamp(0.0, length);
        if self.geometry.len() < 2 || to <= from {
            return Vec::new();
        }

        let mut points = Vec::new();
        if let Some(start) = self.coordinate_at(from) {
            points.push(start);
        }
        for (index, coordinate) in self.geometry.iter().enumerate() {
            let d = self.cumulative[index];
            if d > from && d < to {
                points.push(*coordinate);
            }
        }
        if let Some(end) = self.coordinate_at(to) {
            points.push(end);
        }
        points
    }

    /// First maneuver strictly ahead of `traveled`.
    #[must_use]
    pub fn upcoming_maneuver(&self, traveled: f64) -> Option<&Maneuver> {
        self.maneuvers
            .iter()
            .find(|maneuver| maneuver.distance_from_start > traveled)
    }
}
