// SPDX-License-Identifier: GPL-3.0-only
//! Progress along the active route
//!
//! The tracker owns the per-route guidance bookkeeping: where on the polyline
//! the last fix matched, which voice cues have been consumed, whether arrival
//! was already announced and how many consecutive fixes were off the route.

use std::sync::Arc;

use navkit_shared::models::geo::{initial_bearing, project_on_segment};
use navkit_shared::{Coordinate, RouteCandidate, RouteProgress, VoiceCue};

use crate::config::GuidanceConfig;

/// Thresholds used while guiding, in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuidanceSettings {
    /// Fixes closer than this to the route are snapped onto it
    pub snap_threshold_m: f64,
    /// Fixes farther than this count towards a reroute
    pub off_route_threshold_m: f64,
    /// Consecutive off-route fixes that trigger a reroute
    pub off_route_fix_count: u32,
    /// Remaining distance at which arrival is announced
    pub arrival_threshold_m: f64,
}

impl Default for GuidanceSettings {
    fn default() -> Self {
        Self {
            snap_threshold_m: 30.0,
            off_route_threshold_m: 50.0,
            off_route_fix_count: 3,
            arrival_threshold_m: 20.0,
        }
    }
}

impl From<&GuidanceConfig> for GuidanceSettings {
    fn from(config: &GuidanceConfig) -> Self {
        Self {
            snap_threshold_m: config.snap_threshold_m,
            off_route_threshold_m: config.off_route_threshold_m,
            off_route_fix_count: config.off_route_fix_count.max(1),
            arrival_threshold_m: config.arrival_threshold_m,
        }
    }
}

/// Where a coordinate lands on the route polyline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteProjection {
    pub point: Coordinate,
    /// Meters from the route start to `point`
    pub distance_along: f64,
    /// Meters between the input coordinate and `point`
    pub offset: f64,
    pub segment: usize,
    /// Bearing of the matched segment
    pub bearing: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub progress: RouteProgress,
    /// The cue to announce for this fix, if one became due
    pub cue: Option<VoiceCue>,
    /// Set on the single fix that reached the destination
    pub arrived: bool,
}

#[derive(Debug, Clone)]
struct PendingCue {
    fires_at: f64,
    cue: VoiceCue,
    consumed: bool,
}

#[derive(Debug)]
pub struct ProgressTracker {
    route: Arc<RouteCandidate>,
    generation: u64,
    settings: GuidanceSettings,
    last_segment: Option<usize>,
    cues: Vec<PendingCue>,
    arrived: bool,
    off_route_fixes: u32,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(route: Arc<RouteCandidate>, generation: u64, settings: GuidanceSettings) -> Self {
        let mut cues: Vec<PendingCue> = route
            .maneuvers
            .iter()
            .flat_map(|maneuver| {
                maneuver.voice_cues.iter().map(|cue| PendingCue {
                    fires_at: (maneuver.distance_from_start - cue.trigger_distance).max(0.0),
                    cue: cue.clone(),
                    consumed: false,
                })
            })
            .collect();
        cues.sort_by(|a, b| a.fires_at.total_cmp(&b.fires_at));

        Self {
            route,
            generation,
            settings,
            last_segment: None,
            cues,
            arrived: false,
            off_route_fixes: 0,
        }
    }

    #[must_use]
    pub fn route(&self) -> &Arc<RouteCandidate> {
        &self.route
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn has_arrived(&self) -> bool {
        self.arrived
    }

    /// Match `coordinate` against the route, searching forward from the last
    /// matched segment and falling back to the whole polyline when the local
    /// match is off the route.
    #[must_use]
    pub fn project(&self, coordinate: &Coordinate) -> Option<RouteProjection> {
        let segments = self.route.geometry.len().checked_sub(1)?;
        if segments == 0 {
            return None;
        }
        let start = self.last_segment.unwrap_or(0).min(segments - 1);
        match self.best_projection(coordinate, start, segments) {
            Some(local) if local.offset <= self.settings.off_route_threshold_m => Some(local),
            local if start == 0 => local,
            _ => self.best_projection(coordinate, 0, segments),
        }
    }

    fn best_projection(
        &self,
        coordinate: &Coordinate,
        from: usize,
        to: usize,
    ) -> Option<RouteProjection> {
        let geometry = &self.route.geometry;
        let mut best: Option<RouteProjection> = None;
        for segment in from..to {
            let start = &geometry[segment];
            let end = &geometry[segment + 1];
            let projection = project_on_segment(coordinate, start, end);
            if best.is_some_and(|b| b.offset <= projection.distance) {
                continue;
            }
            let start_distance = self.route.distance_at_vertex(segment);
            let segment_length = self.route.distance_at_vertex(segment + 1) - start_distance;
            best = Some(RouteProjection {
                point: projection.point,
                distance_along: start_distance + projection.fraction * segment_length,
                offset: projection.distance,
                segment,
                bearing: initial_bearing(start, end),
            });
        }
        best
    }

    /// Advance guidance to `projection`.
    pub fn advance(&mut self, projection: &RouteProjection) -> ProgressUpdate {
        self.last_segment = Some(projection.segment);

        let mut progress = RouteProgress::along(
            projection.distance_along,
            self.route.geometry_length(),
            self.route.duration,
        );
        match self.route.upcoming_maneuver(progress.distance_traveled) {
            Some(maneuver) => {
                progress.current_maneuver_index = maneuver.index;
                progress.distance_to_maneuver =
                    maneuver.distance_from_start - progress.distance_traveled;
            }
            None => {
                progress.current_maneuver_index = self
                    .route
                    .maneuvers
                    .last()
                    .map_or(0, |maneuver| maneuver.index);
                progress.distance_to_maneuver = 0.0;
            }
        }

        let cue = self.take_due_cue(progress.distance_traveled);
        let arrived =
            !self.arrived && progress.distance_remaining <= self.settings.arrival_threshold_m;
        if arrived {
            self.arrived = true;
        }

        ProgressUpdate {
            progress,
            cue,
            arrived,
        }
    }

    /// Consume every cue that is due. Only the latest one is returned, the
    /// older ones are skipped silently.
    fn take_due_cue(&mut self, traveled: f64) -> Option<VoiceCue> {
        let mut latest = None;
        for pending in self
            .cues
            .iter_mut()
            .filter(|pending| !pending.consumed && pending.fires_at <= traveled)
        {
            pending.consumed = true;
            latest = Some(pending.cue.clone());
        }
        latest
    }

    /// Count consecutive off-route fixes. Returns `true` once the configured
    /// count is reached, then starts counting again.
    pub fn observe_offset(&mut self, projection: Option<&RouteProjection>) -> bool {
        let off_route =
            projection.is_none_or(|p| p.offset > self.settings.off_route_threshold_m);
        if !off_route {
            self.off_route_fixes = 0;
            return false;
        }
        self.off_route_fixes += 1;
        if self.off_route_fixes >= self.settings.off_route_fix_count {
            self.off_route_fixes = 0;
            return true;
        }
        false
    }
}
