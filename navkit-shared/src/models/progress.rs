// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};

/// Progress along the active route, recomputed on every guided fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct RouteProgress {
    /// Meters
    pub distance_traveled: f64,
    /// Meters
    pub distance_remaining: f64,
    /// Seconds
    pub duration_remaining: f64,
    /// 0.0 at the origin, 1.0 at the destination
    pub fraction_traveled: f64,
    /// Index into the route's maneuver list of the next maneuver
    pub current_maneuver_index: usize,
    /// Meters until `current_maneuver_index`
    pub distance_to_maneuver: f64,
}

impl RouteProgress {
    /// Progress for a route of `distance` meters and `duration` seconds
    /// after `traveled` meters. Duration scales with the remaining distance.
    #[must_use]
    pub fn along(traveled: f64, distance: f64, duration: f64) -> Self {
        let traveled = traveled.clamp(0.0, distance.max(0.0));
        let remaining = (distance - traveled).max(0.0);
        let fraction = if distance > 0.0 {
            traveled / distance
        } else {
            1.0
        };
        Self {
            distance_traveled: traveled,
            distance_remaining: remaining,
            duration_remaining: duration.max(0.0) * (1.0 - fraction),
            fraction_traveled: fraction,
            current_maneuver_index: 0,
            distance_to_maneuver: 0.0,
        }
    }
}
