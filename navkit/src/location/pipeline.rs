// SPDX-License-Identifier: GPL-3.0-only
use log::debug;
use navkit_shared::{Position, RouteCandidate};

use super::LocationFix;
use crate::route::progress::RouteProjection;

/// Provider epochs and map matching of raw readings.
#[derive(Debug)]
pub struct LocationPipeline {
    epoch: u64,
    running: bool,
    snap_threshold_m: f64,
    last_distance_along: Option<f64>,
    last_fix: Option<LocationFix>,
}

impl LocationPipeline {
    #[must_use]
    pub fn new(snap_threshold_m: f64) -> Self {
        Self {
            epoch: 0,
            running: false,
            snap_threshold_m,
            last_distance_along: None,
            last_fix: None,
        }
    }

    /// Open a new provider epoch. Fixes from earlier epochs become stale.
    pub fn begin_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.running = true;
        self.last_distance_along = None;
        self.epoch
    }

    /// Close the current epoch without opening a new one.
    pub fn end_epoch(&mut self) {
        self.epoch += 1;
        self.running = false;
    }

    #[must_use]
    pub fn is_current(&self, epoch: u64) -> bool {
        self.running && epoch == self.epoch
    }

    #[must_use]
    pub fn last_fix(&self) -> Option<&LocationFix> {
        self.last_fix.as_ref()
    }

    /// Forget the previous match, e.g. after the route was replaced.
    pub fn reset_matching(&mut self) {
        self.last_distance_along = None;
    }

    /// Turn a raw reading into a [`LocationFix`], snapping it onto the route
    /// when `matched` is close enough.
    pub fn normalize(
        &mut self,
        raw: Position,
        matched: Option<(&RouteCandidate, &RouteProjection)>,
    ) -> LocationFix {
        let fix = match matched {
            Some((route, projection)) if projection.offset <= self.snap_threshold_m => {
                let enhanced = Position {
                    coordinate: projection.point,
                    bearing: Some(projection.bearing),
                    speed: raw.speed,
                    accuracy: raw.accuracy,
                    timestamp: raw.timestamp,
                };
                let key_points = self.passed_vertices(route, projection.distance_along, &raw);
                self.last_distance_along = Some(projection.distance_along);
                LocationFix {
                    raw,
                    enhanced,
                    key_points,
                }
            }
            Some((_, projection)) => {
                debug!("Fix {:.1} m from route, not snapping", projection.offset);
                self.last_distance_along = None;
                LocationFix::unmatched(raw)
            }
            None => {
                self.last_distance_along = None;
                LocationFix::unmatched(raw)
            }
        };
        self.last_fix = Some(fix.clone());
        fix
    }

    fn passed_vertices(&self, route: &RouteCandidate, along: f64, raw: &Position) -> Vec<Position> {
        let Some(previous) = self.last_distance_along else {
            return Vec::new();
        };
        if along <= previous {
            return Vec::new();
        }
        route
            .geometry
            .iter()
            .enumerate()
            .filter(|(index, _)| {
                let distance = route.distance_at_vertex(*index);
                distance > previous && distance < along
            })
            .map(|(_, coordinate)| Position {
                coordinate: *coordinate,
                bearing: None,
                speed: raw.speed,
                accuracy: None,
                timestamp: raw.timestamp,
            })
            .collect()
    }
}
